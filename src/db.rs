use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::{AbsentPolicy, ProjectRecord, ProjectStatus, SENTINEL};

const PROJECT_COLUMNS: &str = "title, image_url, thumbnail_url, purchase_price, old_price, \
     maintenance_price, status, total_kw, progress_percentage, reserved_percentage, \
     reserved_kw, remaining_percentage, remaining_kw";

const PROJECTS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS projects (
        title                TEXT NOT NULL,
        image_url            TEXT NOT NULL,
        thumbnail_url        TEXT NOT NULL,
        purchase_price       REAL,
        old_price            REAL,
        maintenance_price    REAL,
        status               TEXT NOT NULL CHECK(status IN ('AVAILABLE','SOLD_OUT')),
        total_kw             REAL NOT NULL,
        progress_percentage  REAL NOT NULL,
        reserved_percentage  REAL NOT NULL,
        reserved_kw          REAL NOT NULL,
        remaining_percentage REAL NOT NULL,
        remaining_kw         REAL NOT NULL
    );";

const PAGE_SIZE_KEY: &str = "page_size";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(PROJECTS_TABLE)?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS settings (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runs (
            id            INTEGER PRIMARY KEY,
            scraped_at    TEXT NOT NULL,
            records       INTEGER NOT NULL,
            pages_fetched INTEGER NOT NULL,
            pages_skipped INTEGER NOT NULL,
            end_of_data   INTEGER,
            dropped       INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Scrape batches ──

pub struct RunRow {
    pub scraped_at: String,
    pub records: usize,
    pub pages_fetched: usize,
    pub pages_skipped: usize,
    pub end_of_data: Option<u32>,
    pub dropped: usize,
}

/// Persist one run's records and its summary in a single transaction.
/// With `fresh`, the projects table is dropped and recreated first.
pub fn save_run(
    conn: &Connection,
    records: &[ProjectRecord],
    run: &RunRow,
    policy: AbsentPolicy,
    fresh: bool,
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    if fresh {
        tx.execute_batch("DROP TABLE IF EXISTS projects;")?;
        tx.execute_batch(PROJECTS_TABLE)?;
    }

    let mut count = 0;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO projects ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            PROJECT_COLUMNS
        ))?;
        for r in records {
            count += stmt.execute(rusqlite::params![
                r.title,
                r.image_url,
                r.thumbnail_url,
                optional_value(policy, r.purchase_price),
                optional_value(policy, r.old_price),
                optional_value(policy, r.maintenance_price),
                r.status.as_str(),
                r.total_capacity_kw,
                r.progress_percentage,
                r.reserved_percentage,
                r.reserved_kw,
                r.remaining_percentage,
                r.remaining_kw,
            ])?;
        }

        tx.execute(
            "INSERT INTO runs (scraped_at, records, pages_fetched, pages_skipped, end_of_data, dropped)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                run.scraped_at,
                run.records,
                run.pages_fetched,
                run.pages_skipped,
                run.end_of_data,
                run.dropped,
            ],
        )?;
    }
    tx.commit()?;
    Ok(count)
}

fn optional_value(policy: AbsentPolicy, value: Option<f64>) -> Value {
    match policy.numeric(value) {
        Some(v) => Value::Real(v),
        None => Value::Text(SENTINEL.to_string()),
    }
}

// ── Deduplication ──

/// Delete rows equal to an earlier row in every column, keeping the
/// lowest rowid of each group. Returns the number of rows removed.
pub fn delete_duplicates(conn: &Connection) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute(
        &format!(
            "DELETE FROM projects WHERE rowid NOT IN (
                 SELECT MIN(rowid) FROM projects GROUP BY {}
             )",
            PROJECT_COLUMNS
        ),
        [],
    )?;
    tx.commit()?;
    Ok(removed)
}

// ── Listing ──

pub fn count_records(conn: &Connection) -> Result<usize> {
    let n: usize = conn.query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))?;
    Ok(n)
}

/// Every stored record in insertion order.
pub fn fetch_records(conn: &Connection) -> Result<Vec<ProjectRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM projects ORDER BY rowid",
        PROJECT_COLUMNS
    ))?;
    let rows = stmt
        .query_map([], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn record_from_row(row: &Row) -> rusqlite::Result<ProjectRecord> {
    let status: String = row.get(6)?;
    let status: ProjectStatus = status
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))?;

    Ok(ProjectRecord {
        title: row.get(0)?,
        image_url: row.get(1)?,
        thumbnail_url: row.get(2)?,
        purchase_price: optional_price(row, 3)?,
        old_price: optional_price(row, 4)?,
        maintenance_price: optional_price(row, 5)?,
        status,
        total_capacity_kw: row.get(7)?,
        progress_percentage: row.get(8)?,
        reserved_percentage: row.get(9)?,
        reserved_kw: row.get(10)?,
        remaining_percentage: row.get(11)?,
        remaining_kw: row.get(12)?,
    })
}

/// Numbers read back as `Some`; the sentinel text or NULL as `None`.
fn optional_price(row: &Row, idx: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Real(v) => Some(v),
        ValueRef::Integer(v) => Some(v as f64),
        ValueRef::Null | ValueRef::Text(_) | ValueRef::Blob(_) => None,
    })
}

// ── Settings ──

pub fn page_size(conn: &Connection) -> Result<Option<i64>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [PAGE_SIZE_KEY],
            |r| r.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()))
}

pub fn set_page_size(conn: &Connection, size: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![PAGE_SIZE_KEY, size.to_string()],
    )?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub distinct: usize,
    pub available: usize,
    pub sold_out: usize,
    pub runs: usize,
    pub last_run: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total = count_records(conn)?;
    let distinct: usize = conn.query_row(
        &format!("SELECT COUNT(*) FROM (SELECT 1 FROM projects GROUP BY {})", PROJECT_COLUMNS),
        [],
        |r| r.get(0),
    )?;
    let available: usize = conn.query_row(
        "SELECT COUNT(*) FROM projects WHERE status = 'AVAILABLE'",
        [],
        |r| r.get(0),
    )?;
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let last_run: Option<String> = conn
        .query_row(
            "SELECT scraped_at FROM runs ORDER BY id DESC LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(Stats {
        total,
        distinct,
        available,
        sold_out: total - available,
        runs,
        last_run,
    })
}
