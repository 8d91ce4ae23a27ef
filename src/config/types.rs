use crate::model::SessionDescriptor;
use crate::query::DEFAULT_BASE_URL;
use crate::storage::{CommitMode, PartIdentity};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub session: SessionConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    pub output: OutputConfig,
}

/// Vehicle session issued by the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Vehicle code (`c` on the wire)
    pub car: String,

    /// Opaque session token, copied verbatim from a catalog URL
    pub ssd: String,

    /// Catalog origin
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,
}

impl SessionConfig {
    pub fn descriptor(&self) -> SessionDescriptor {
        SessionDescriptor::new(self.car.clone(), self.ssd.clone())
    }
}

/// Which backend renders pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderBackend {
    /// Headless Chromium over CDP
    #[default]
    Chromium,

    /// Plain HTTP GET without script execution
    Http,
}

/// Page rendering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub backend: RenderBackend,

    /// Wait after navigation before reading the document (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Navigation timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User agent override
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,
}

impl RenderConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: RenderBackend::default(),
            settle_ms: default_settle_ms(),
            headless: true,
            timeout_ms: default_timeout_ms(),
            user_agent: None,
        }
    }
}

/// Crawl pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Default number of groups crawled per run
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: usize,

    /// Minimum time between request starts (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Number of browser sessions rendering in parallel
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Store rendered diagram pages and reuse them on later runs
    #[serde(rename = "use-page-cache", default)]
    pub use_page_cache: bool,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            request_delay_ms: default_request_delay_ms(),
            workers: default_workers(),
            use_page_cache: false,
        }
    }
}

/// Reconciliation behavior
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileConfig {
    #[serde(rename = "part-identity", default)]
    pub part_identity: PartIdentity,

    #[serde(rename = "commit-mode", default)]
    pub commit_mode: CommitMode,

    /// Fail the run on the first rejected identity
    #[serde(default)]
    pub strict: bool,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_settle_ms() -> u64 {
    4_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_page_size() -> usize {
    435
}

fn default_request_delay_ms() -> u64 {
    1_000
}

fn default_workers() -> usize {
    1
}

fn default_true() -> bool {
    true
}
