use std::path::PathBuf;
use std::time::Duration;

use crate::schedule::ScheduleConfig;

/// Crawl and fetch parameters shared by the scheduler daemon and the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperSettings {
    pub start_url: String,
    /// Origin that listing links found on search pages are anchored at.
    pub listing_origin: String,
    /// `0` means no page limit.
    pub max_pages: usize,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub batch_size: usize,
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub phone_lookup_enabled: bool,
    pub phone_lookup_url: String,
    pub skip_known_urls: bool,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub dumps_dir: PathBuf,
    pub scraper: ScraperSettings,
    pub schedule: ScheduleConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("log_level", &self.log_level)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("dumps_dir", &self.dumps_dir)
            .field("scraper", &self.scraper)
            .field("schedule", &self.schedule)
            .finish()
    }
}
