//! partsouq-harvester: a catalog harvester for browser-rendered parts listings
//!
//! This crate drives a rendered catalog site through its session-bound query
//! protocol, recovers the group hierarchy and diagram/part tables from the
//! rendered markup, and reconciles each scraped batch into a SQLite store.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod output;
pub mod query;
pub mod reconcile;
pub mod render;
pub mod storage;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Reconciliation conflict for {entity} {identity}: {reason}")]
    ReconciliationConflict {
        entity: &'static str,
        identity: String,
        reason: String,
    },

    #[error("Crawl aborted at group {group_id} after {completed} groups were reconciled: {reason}")]
    CrawlAborted {
        group_id: i64,
        completed: usize,
        reason: String,
    },

    #[error("Group not found: {0}")]
    GroupNotFound(i64),

    #[error("No cached page for group {0}")]
    PageNotCached(i64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Query codec errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("endpoint {endpoint} requires parameter '{param}'")]
    MissingParameter {
        endpoint: &'static str,
        param: &'static str,
    },

    #[error("Malformed link '{0}'")]
    Malformed(String),
}

/// Markup extraction errors
///
/// Listing errors are page-scoped; panel and row errors are collected and
/// logged without aborting the rest of the page.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Malformed group listing: {0}")]
    MalformedListing(String),

    #[error("Malformed panel #{index}: {reason}")]
    MalformedPanel { index: usize, reason: String },

    #[error("Malformed row #{row} in panel #{panel}: {reason}")]
    MalformedRow {
        panel: usize,
        row: usize,
        reason: String,
    },

    #[error("Invalid selector '{0}'")]
    Selector(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for query codec operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CatalogScraper, Coordinator, CrawlOutcome};
pub use model::{Diagram, DiagramKey, Group, GroupForest, Part, SessionDescriptor};
pub use query::{Endpoint, QueryCodec, QueryParams};
pub use render::RenderGateway;
