//! Crawler module for harvesting the catalog
//!
//! This module contains the core crawling logic, including:
//! - Scraping group listings, diagrams pages and search results
//! - Paced, cancellable scheduling of group pages across workers
//! - Overall harvest coordination and reconciliation into storage

mod coordinator;
mod scheduler;
mod scraper;

pub use coordinator::{Coordinator, HarvestSummary};
pub use scheduler::{CrawlOutcome, CrawlScheduler, GroupFailure, Pacer};
pub use scraper::{CacheMode, CatalogScraper};

use crate::storage::{CatalogStore, StorageError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between the coordinator and the scraper
pub type SharedStore = Arc<Mutex<dyn CatalogStore + Send>>;

/// Locks shared storage, reporting a poisoned lock as a storage error
pub(crate) fn lock_store(
    store: &SharedStore,
) -> Result<MutexGuard<'_, dyn CatalogStore + Send + 'static>, StorageError> {
    store.lock().map_err(|_| StorageError::LockPoisoned)
}
