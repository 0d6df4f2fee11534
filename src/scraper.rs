use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::model::ProjectRecord;
use crate::parser::{self, PageExtraction};
use crate::settings::MAX_CONCURRENCY;

#[derive(Debug, Error)]
pub enum FetchError {
    /// End-of-data signal, not a failure.
    #[error("page {page} not found")]
    NotFound { page: u32 },
    #[error("page {page} returned HTTP {status}")]
    Status { page: u32, status: u16 },
    #[error("transient failure on page {page}: {message}")]
    Transient { page: u32, message: String },
    #[error("request for page {page} failed: {message}")]
    Transport { page: u32, message: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Source of listing-page markup, addressed by 0-based page number.
pub trait PageSource {
    fn fetch_page(&self, page: u32) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Fetches `<listing_url>?page=N` over HTTP.
pub struct HttpSource {
    client: Client,
    listing_url: Url,
}

impl HttpSource {
    pub fn new(listing_url: Url, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            listing_url,
        })
    }

    fn page_url(&self, page: u32) -> Url {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }
}

impl PageSource for HttpSource {
    async fn fetch_page(&self, page: u32) -> Result<String, FetchError> {
        let url = self.page_url(page);
        debug!("Fetching data from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(page, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { page });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
            });
        }

        // A body cut off mid-stream is worth another attempt.
        response.text().await.map_err(|e| FetchError::Transient {
            page,
            message: e.to_string(),
        })
    }
}

/// Timeouts and connection-level failures are worth another attempt; a
/// request that cannot be built or redirected never is.
fn classify(page: u32, e: reqwest::Error) -> FetchError {
    let message = e.to_string();
    let permanent = e.is_builder() || e.is_redirect() || e.is_status() || e.is_decode();
    if !permanent && (e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()) {
        FetchError::Transient { page, message }
    } else {
        FetchError::Transport { page, message }
    }
}

/// Bounded retry with exponential backoff for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first.
    pub attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub enum PageOutcome {
    Fetched(String),
    EndOfData,
    Skipped,
}

pub async fn fetch_with_retry<S: PageSource>(source: &S, page: u32, retry: RetryPolicy) -> PageOutcome {
    let attempts = retry.attempts.max(1);

    for attempt in 0..attempts {
        match source.fetch_page(page).await {
            Ok(html) => return PageOutcome::Fetched(html),
            Err(FetchError::NotFound { .. }) => {
                info!("Page {} not found (404). Stopping.", page);
                return PageOutcome::EndOfData;
            }
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let backoff = retry.backoff(attempt);
                warn!(
                    "{} (attempt {}/{}), backing off {:.1}s",
                    e,
                    attempt + 1,
                    attempts,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                warn!("Skipping page {}: {}", page, e);
                return PageOutcome::Skipped;
            }
        }
    }

    PageOutcome::Skipped
}

/// Result of one run across all pages.
#[derive(Debug, Default)]
pub struct RunReport {
    pub records: Vec<ProjectRecord>,
    pub pages_fetched: Vec<u32>,
    pub pages_skipped: Vec<u32>,
    /// Page number that answered 404, if the run stopped early.
    pub end_of_data: Option<u32>,
    pub fragments_dropped: usize,
}

impl RunReport {
    fn absorb(&mut self, page: u32, extraction: PageExtraction) {
        info!("Found {} projects on page {}.", extraction.records.len(), page);
        self.pages_fetched.push(page);
        self.fragments_dropped += extraction.dropped;
        self.records.extend(extraction.records);
    }
}

/// Pagination driver: walks listing pages until the bound or the first 404.
pub struct Harvester<S> {
    source: Arc<S>,
    base: Url,
    retry: RetryPolicy,
    concurrency: usize,
}

impl<S> Harvester<S>
where
    S: PageSource + Send + Sync + 'static,
{
    pub fn new(source: S, base: Url) -> Self {
        Self {
            source: Arc::new(source),
            base,
            retry: RetryPolicy::default(),
            concurrency: 1,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Fetch pages `0..max_pages`. Every call starts again from page 0.
    pub async fn fetch_all(&self, max_pages: u32) -> RunReport {
        let report = if self.concurrency > 1 {
            self.fetch_concurrent(max_pages).await
        } else {
            self.fetch_sequential(max_pages).await
        };
        info!(
            records = report.records.len(),
            fetched = report.pages_fetched.len(),
            skipped = report.pages_skipped.len(),
            dropped = report.fragments_dropped,
            "Run finished"
        );
        report
    }

    async fn fetch_sequential(&self, max_pages: u32) -> RunReport {
        let pb = progress_bar(max_pages);
        let mut report = RunReport::default();

        for page in 0..max_pages {
            match fetch_with_retry(self.source.as_ref(), page, self.retry).await {
                PageOutcome::Fetched(html) => {
                    report.absorb(page, parser::parse_page(&html, &self.base))
                }
                PageOutcome::EndOfData => {
                    report.end_of_data = Some(page);
                    break;
                }
                PageOutcome::Skipped => report.pages_skipped.push(page),
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        report
    }

    /// Pages fetched in parallel; collation still stops at the first 404 in
    /// page order and discards every later page.
    async fn fetch_concurrent(&self, max_pages: u32) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let pb = progress_bar(max_pages);

        let (tx, mut rx) =
            tokio::sync::mpsc::channel::<(u32, PageOutcome)>(self.concurrency.saturating_mul(2));

        for page in 0..max_pages {
            let source = Arc::clone(&self.source);
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();
            let retry = self.retry;

            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };
                let outcome = fetch_with_retry(source.as_ref(), page, retry).await;
                let _ = tx.send((page, outcome)).await;
            });
        }

        // Drop our copy of tx so rx closes when all spawned tasks finish
        drop(tx);

        let mut outcomes = BTreeMap::new();
        while let Some((page, outcome)) = rx.recv().await {
            outcomes.insert(page, outcome);
            pb.inc(1);
        }
        pb.finish_and_clear();

        let mut report = RunReport::default();
        for (page, outcome) in outcomes {
            match outcome {
                PageOutcome::Fetched(html) => {
                    report.absorb(page, parser::parse_page(&html, &self.base))
                }
                PageOutcome::EndOfData => {
                    report.end_of_data = Some(page);
                    break;
                }
                PageOutcome::Skipped => report.pages_skipped.push(page),
            }
        }
        report
    }
}

fn progress_bar(len: u32) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} page {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}
