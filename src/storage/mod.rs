//! Storage module for persisting the catalog
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Group, diagram and part persistence with batch upserts
//! - The rendered page cache
//! - Catalog counts for reporting

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{CatalogStore, StorageError, StorageResult};

use crate::HarvestError;
use serde::Deserialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// How the mutations of one upsert call are committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitMode {
    /// All rows in one transaction; a failure leaves storage untouched
    #[default]
    Transaction,

    /// Each row commits on its own. Faster on large batches, but a failure
    /// part-way leaves the earlier rows applied.
    PerRow,
}

/// How parts are matched against stored rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartIdentity {
    /// Every submitted part becomes a new row. Re-running a crawl in this
    /// mode duplicates parts.
    Fresh,

    /// Parts are identified by `(diagram, number)`
    #[default]
    NaturalKey,
}

/// Row window for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Pagination {
    /// Every row
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    /// SQLite `LIMIT` value; -1 means unbounded
    pub(crate) fn sql_limit(&self) -> i64 {
        self.limit.map(|l| l as i64).unwrap_or(-1)
    }

    pub(crate) fn sql_offset(&self) -> i64 {
        self.offset as i64
    }
}

/// Rows written by one upsert call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertCounts {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// A rendered page kept for re-extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub group_id: i64,
    pub url: String,
    pub html: String,

    /// Hex-encoded SHA-256 of `html`
    pub content_hash: String,
    pub fetched_at: String,
}

/// Row counts across the catalog tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogCounts {
    pub groups: usize,
    pub groups_with_diagrams: usize,
    pub diagrams: usize,
    pub parts: usize,
    pub cached_pages: usize,
}
