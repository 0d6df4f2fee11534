use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::model::AbsentPolicy;

const DEFAULT_BASE_URL: &str = "https://www.eparkai.lt";
const DEFAULT_LISTING_PATH: &str = "/projektai";
const DEFAULT_DB_PATH: &str = "data/eparkai.sqlite";

/// Upper bound on parallel page fetches.
pub const MAX_CONCURRENCY: usize = 64;

/// Runtime settings: built-in defaults, then an optional `eparkai.toml`,
/// then `EPARKAI_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub listing_path: String,
    pub max_pages: u32,
    pub request_timeout_secs: u64,
    pub fetch_attempts: u32,
    pub backoff_ms: u64,
    pub concurrency: usize,
    pub user_agent: String,
    pub db_path: PathBuf,
    pub default_page_size: i64,
    pub absent_policy: AbsentPolicy,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Self::defaults()?
                .add_source(File::with_name("eparkai").required(false))
                .add_source(Environment::with_prefix("EPARKAI").try_parsing(true)),
        )
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("listing_path", DEFAULT_LISTING_PATH)?
            .set_default("max_pages", 4)?
            .set_default("request_timeout_secs", 10)?
            .set_default("fetch_attempts", 3)?
            .set_default("backoff_ms", 500)?
            .set_default("concurrency", 1)?
            .set_default("user_agent", concat!("eparkai_scraper/", env!("CARGO_PKG_VERSION")))?
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("default_page_size", 10)?
            .set_default("absent_policy", "zero")?)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            bail!(
                "concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY,
                self.concurrency
            );
        }
        if self.default_page_size < 1 {
            bail!("default_page_size must be at least 1, got {}", self.default_page_size);
        }
        Ok(())
    }

    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("Invalid base_url {:?}", self.base_url))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
