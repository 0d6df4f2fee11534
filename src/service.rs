//! Operations behind the command line: trigger a scrape, list a page,
//! delete duplicates, set the page size. Storage failures surface as
//! [`ServiceError::Unavailable`]; nothing partial is committed.

use anyhow::anyhow;
use chrono::{DateTime, Local};
use rusqlite::Connection;
use thiserror::Error;

use crate::db;
use crate::model::ProjectRecord;
use crate::paginate::{self, Page, PageError, Paging};
use crate::scraper::{Harvester, PageSource};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service currently unavailable, try again later.")]
    Unavailable(#[source] anyhow::Error),
    #[error(transparent)]
    InvalidInput(#[from] PageError),
}

#[derive(Debug)]
pub struct RunSummary {
    pub count: usize,
    pub scraped_at: DateTime<Local>,
    pub pages_fetched: Vec<u32>,
    pub pages_skipped: Vec<u32>,
    pub end_of_data: Option<u32>,
    pub fragments_dropped: usize,
}

impl RunSummary {
    pub fn timestamp(&self) -> String {
        self.scraped_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn message(&self) -> String {
        format!("{} projects scraped at {}", self.count, self.timestamp())
    }
}

/// Run the pagination driver and persist its records as one batch.
pub async fn trigger_scrape<S>(
    conn: &Connection,
    harvester: &Harvester<S>,
    settings: &Settings,
    max_pages: u32,
    fresh: bool,
) -> Result<RunSummary, ServiceError>
where
    S: PageSource + Send + Sync + 'static,
{
    let report = harvester.fetch_all(max_pages).await;

    // Nothing reachable: leave stored data alone.
    if max_pages > 0 && report.pages_fetched.is_empty() && report.end_of_data != Some(0) {
        return Err(ServiceError::Unavailable(anyhow!(
            "none of {} listing pages could be fetched",
            report.pages_skipped.len()
        )));
    }

    let summary = RunSummary {
        count: report.records.len(),
        scraped_at: Local::now(),
        pages_fetched: report.pages_fetched,
        pages_skipped: report.pages_skipped,
        end_of_data: report.end_of_data,
        fragments_dropped: report.fragments_dropped,
    };

    let run = db::RunRow {
        scraped_at: summary.timestamp(),
        records: summary.count,
        pages_fetched: summary.pages_fetched.len(),
        pages_skipped: summary.pages_skipped.len(),
        end_of_data: summary.end_of_data,
        dropped: summary.fragments_dropped,
    };
    db::save_run(conn, &report.records, &run, settings.absent_policy, fresh)
        .map_err(ServiceError::Unavailable)?;

    Ok(summary)
}

/// One display page. Without an explicit size the stored page size is
/// used, then the configured default.
pub fn list(
    conn: &Connection,
    settings: &Settings,
    page: i64,
    size: Option<i64>,
) -> Result<Page<ProjectRecord>, ServiceError> {
    let size = match size {
        Some(s) => s,
        None => db::page_size(conn)
            .map_err(ServiceError::Unavailable)?
            .unwrap_or(settings.default_page_size),
    };
    Paging::new(page, size)?;

    let records = db::fetch_records(conn).map_err(ServiceError::Unavailable)?;
    Ok(paginate::page(records, page, size)?)
}

pub fn delete_duplicates(conn: &Connection) -> Result<usize, ServiceError> {
    db::delete_duplicates(conn).map_err(ServiceError::Unavailable)
}

pub fn set_page_size(conn: &Connection, size: i64) -> Result<(), ServiceError> {
    Paging::new(1, size)?;
    db::set_page_size(conn, size).map_err(ServiceError::Unavailable)
}
