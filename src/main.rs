mod db;
mod model;
mod paginate;
mod parser;
mod scraper;
mod service;
mod settings;

use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::error;

use crate::model::{AbsentPolicy, ProjectRecord};
use crate::scraper::{Harvester, HttpSource, RetryPolicy};
use crate::service::ServiceError;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "eparkai_scraper", about = "Solar park project listings scraper for eparkai.lt")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch listing pages and store the projects found
    Scrape {
        /// Max listing pages to fetch (default: from configuration)
        #[arg(short = 'n', long)]
        pages: Option<u32>,
        /// Replace stored projects instead of appending
        #[arg(long)]
        fresh: bool,
    },
    /// Show one page of stored projects
    List {
        /// 1-based page number
        #[arg(short, long, default_value = "1")]
        page: i64,
        /// Rows per page (default: stored page size)
        #[arg(short, long)]
        size: Option<i64>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete rows identical in every column, keeping the first
    Dedup,
    /// Store the default page size used by `list`
    PageSize { size: i64 },
    /// Show storage and run statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Scrape { pages, fresh } => {
            let base = settings.base()?;
            let listing_url = base
                .join(&settings.listing_path)
                .with_context(|| format!("Invalid listing_path {:?}", settings.listing_path))?;
            let max_pages = pages.unwrap_or(settings.max_pages);

            println!("Scraping up to {} pages from {}...", max_pages, listing_url);
            let source = HttpSource::new(listing_url, settings.request_timeout(), &settings.user_agent)?;
            let harvester = Harvester::new(source, base)
                .with_retry(RetryPolicy {
                    attempts: settings.fetch_attempts,
                    base_backoff: settings.backoff(),
                })
                .with_concurrency(settings.concurrency);

            match service::trigger_scrape(&conn, &harvester, &settings, max_pages, fresh).await {
                Ok(summary) => {
                    println!("{}", summary.message());
                    if !summary.pages_skipped.is_empty() {
                        println!("Skipped pages: {:?}", summary.pages_skipped);
                    }
                    if summary.fragments_dropped > 0 {
                        println!("Dropped {} malformed listings.", summary.fragments_dropped);
                    }
                    Ok(())
                }
                Err(e) => Err(report(e)),
            }
        }
        Commands::List { page, size, json } => match service::list(&conn, &settings, page, size) {
            Ok(listing) if json => {
                let rows: Vec<_> = listing
                    .items
                    .iter()
                    .map(|r| record_json(r, settings.absent_policy))
                    .collect();
                let out = json!({
                    "page": listing.number,
                    "page_size": listing.size,
                    "total_items": listing.total_items,
                    "total_pages": listing.total_pages,
                    "records": rows,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                Ok(())
            }
            Ok(listing) => {
                if listing.items.is_empty() {
                    println!(
                        "No projects on page {} ({} stored, {} pages).",
                        listing.number, listing.total_items, listing.total_pages
                    );
                    return Ok(());
                }
                print_table(&listing.items, listing.offset(), settings.absent_policy);
                println!(
                    "\nPage {}/{} | {} projects",
                    listing.number, listing.total_pages, listing.total_items
                );
                Ok(())
            }
            Err(e) => Err(report(e)),
        },
        Commands::Dedup => match service::delete_duplicates(&conn) {
            Ok(removed) => {
                println!("Removed {} duplicate rows.", removed);
                Ok(())
            }
            Err(e) => Err(report(e)),
        },
        Commands::PageSize { size } => match service::set_page_size(&conn, size) {
            Ok(()) => {
                println!("Page size set to {}.", size);
                Ok(())
            }
            Err(e) => Err(report(e)),
        },
        Commands::Stats => {
            let s = db::get_stats(&conn)?;
            println!("Total:      {}", s.total);
            println!("Distinct:   {}", s.distinct);
            println!("Available:  {}", s.available);
            println!("Sold out:   {}", s.sold_out);
            println!("Runs:       {}", s.runs);
            println!("Last run:   {}", s.last_run.as_deref().unwrap_or("-"));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn report(e: ServiceError) -> anyhow::Error {
    println!("{}", e);
    let e = anyhow::Error::from(e);
    error!("{:#}", e);
    e
}

fn print_table(records: &[ProjectRecord], offset: usize, policy: AbsentPolicy) {
    println!(
        "{:>4} | {:<32} | {:<9} | {:>9} | {:>9} | {:>7} | {:>9} | {:>6} | {:>9}",
        "#", "Project", "Status", "Price", "Old", "Maint.", "Total kW", "Res. %", "Free kW"
    );
    println!("{}", "-".repeat(118));

    for (i, r) in records.iter().enumerate() {
        println!(
            "{:>4} | {:<32} | {:<9} | {:>9} | {:>9} | {:>7} | {:>9} | {:>6} | {:>9}",
            offset + i + 1,
            truncate(&r.title, 32),
            r.status.as_str(),
            policy.render(r.purchase_price),
            policy.render(r.old_price),
            policy.render(r.maintenance_price),
            model::format_number(r.total_capacity_kw),
            model::format_number(r.reserved_percentage),
            model::format_number(r.remaining_kw),
        );
    }
}

fn record_json(r: &ProjectRecord, policy: AbsentPolicy) -> serde_json::Value {
    let price = |v: Option<f64>| match policy.numeric(v) {
        Some(n) => json!(n),
        None => json!(model::SENTINEL),
    };
    let mut value = json!(r);
    value["purchase_price"] = price(r.purchase_price);
    value["old_price"] = price(r.old_price);
    value["maintenance_price"] = price(r.maintenance_price);
    value
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
