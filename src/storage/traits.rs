//! Storage traits and error types
//!
//! This module defines the trait interface for catalog storage backends and
//! associated error types.

use crate::model::{Diagram, DiagramKey, Group, Part};
use crate::storage::{CachedPage, CatalogCounts, CommitMode, Pagination, PartIdentity, UpsertCounts};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for catalog storage backends
///
/// Reads are free for anyone; the `upsert_*` and `wipe_*` methods are only
/// called by the reconciliation engine and the explicit wipe command.
pub trait CatalogStore {
    // ===== Groups =====

    /// Lists groups ordered by id
    fn get_groups(&self, page: Pagination) -> StorageResult<Vec<Group>>;

    /// Lists groups that have a diagrams page, ordered by id
    fn get_groups_with_diagrams(&self, page: Pagination) -> StorageResult<Vec<Group>>;

    /// Gets a group by its upstream id
    fn get_group_by_id(&self, id: i64) -> StorageResult<Option<Group>>;

    /// Returns every stored `(id, parent_id)` edge
    fn get_group_edges(&self) -> StorageResult<Vec<(i64, Option<i64>)>>;

    /// Inserts or updates groups by id
    ///
    /// Parents must precede their children in `groups` when `mode` is
    /// [`CommitMode::PerRow`].
    fn upsert_groups(&mut self, groups: &[Group], mode: CommitMode) -> StorageResult<UpsertCounts>;

    /// Deletes all groups, cascading to diagrams and parts
    fn wipe_groups(&mut self) -> StorageResult<usize>;

    // ===== Diagrams =====

    fn get_diagrams(&self, page: Pagination) -> StorageResult<Vec<Diagram>>;

    fn get_diagrams_for_group(&self, group_id: i64) -> StorageResult<Vec<Diagram>>;

    fn get_diagram_by_key(&self, key: DiagramKey) -> StorageResult<Option<Diagram>>;

    /// Inserts or updates diagrams by compound key
    fn upsert_diagrams(
        &mut self,
        diagrams: &[Diagram],
        mode: CommitMode,
    ) -> StorageResult<UpsertCounts>;

    /// Deletes all diagrams, cascading to parts
    fn wipe_diagrams(&mut self) -> StorageResult<usize>;

    // ===== Parts =====

    fn get_parts(&self, page: Pagination) -> StorageResult<Vec<Part>>;

    fn get_parts_for_diagram(&self, key: DiagramKey) -> StorageResult<Vec<Part>>;

    /// Inserts or updates parts
    ///
    /// With [`PartIdentity::NaturalKey`] a part matching an existing row on
    /// `(diagram, number)` updates that row and keeps its id. With
    /// [`PartIdentity::Fresh`] every part is inserted.
    fn upsert_parts(
        &mut self,
        parts: &[Part],
        mode: CommitMode,
        identity: PartIdentity,
    ) -> StorageResult<UpsertCounts>;

    fn wipe_parts(&mut self) -> StorageResult<usize>;

    // ===== Page cache =====

    /// Gets the most recently saved diagrams page for a group
    fn get_cached_page_html(&self, group_id: i64) -> StorageResult<Option<CachedPage>>;

    /// Saves a rendered diagrams page, replacing any previous copy
    fn save_page_html(&mut self, group_id: i64, url: &str, html: &str) -> StorageResult<()>;

    fn wipe_page_cache(&mut self) -> StorageResult<usize>;

    // ===== Statistics =====

    fn counts(&self) -> StorageResult<CatalogCounts>;
}
