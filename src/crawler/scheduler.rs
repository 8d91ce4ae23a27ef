//! Scheduler for crawling group diagram pages
//!
//! This module handles:
//! - Pacing request starts across all workers
//! - Fanning groups out over one render gateway per worker
//! - Isolating per-group failures so one bad group never aborts a crawl
//! - Stopping cleanly on cancellation or a systemic failure with the work
//!   completed so far

use crate::crawler::scraper::CatalogScraper;
use crate::extract::DiagramPage;
use crate::model::{Diagram, Group, Part};
use crate::render::RenderError;
use crate::{HarvestError, Result};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Enforces a minimum interval between request starts
///
/// Shared by every worker. The lock is held through the wait, so waiting
/// callers are released one interval apart.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_start: Mutex::new(None),
        }
    }

    /// Waits until the next request may start
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The caller may start its request now
    /// * `Err(HarvestError::Cancelled)` - The token fired first
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        let mut last_start = self.last_start.lock().await;
        if let Some(previous) = *last_start {
            let ready_at = previous + self.delay;
            tokio::select! {
                _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                _ = tokio::time::sleep_until(ready_at) => {}
            }
        }

        *last_start = Some(Instant::now());
        Ok(())
    }
}

/// A group that could not be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFailure {
    pub group_id: i64,
    pub name: String,
    pub reason: String,
}

/// Result of crawling a page of groups
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Diagrams of every successful group
    pub diagrams: Vec<Diagram>,

    /// Parts of every successful group
    pub parts: Vec<Part>,

    /// Ids of groups that were crawled
    pub succeeded: Vec<i64>,

    /// Groups that were skipped, with the reason
    pub failed: Vec<GroupFailure>,

    /// Panels and rows dropped during extraction
    pub malformed: usize,

    /// True if the crawl stopped early on cancellation
    pub cancelled: bool,

    /// The group whose systemic failure stopped the crawl
    pub aborted: Option<GroupFailure>,
}

impl CrawlOutcome {
    fn absorb(&mut self, group_id: i64, page: DiagramPage) {
        self.diagrams.extend(page.diagrams);
        self.parts.extend(page.parts);
        self.malformed += page.malformed.len();
        self.succeeded.push(group_id);
    }
}

/// Drives a scraper over a list of groups
pub struct CrawlScheduler<'a> {
    scraper: &'a CatalogScraper,
}

impl<'a> CrawlScheduler<'a> {
    pub fn new(scraper: &'a CatalogScraper) -> Self {
        Self { scraper }
    }

    /// Crawls every group in order
    ///
    /// Up to one group per worker is in flight at a time; results are
    /// collected in input order.
    ///
    /// A systemic failure (no browser, storage gone) would fail every
    /// remaining group, so scheduling stops there and the failure is
    /// recorded in `aborted`. Groups completed before it are kept.
    pub async fn run(&self, groups: Vec<Group>) -> CrawlOutcome {
        let scraper = self.scraper;
        let cancel = scraper.cancel_token();
        let total = groups.len();
        let mut outcome = CrawlOutcome::default();

        let mut results = stream::iter(groups.into_iter().enumerate())
            .map(|(position, group)| async move {
                let gateway = scraper.gateway(position);
                let result = scraper.scrape_group_diagrams_on(gateway, &group).await;
                (position, group, result)
            })
            .buffered(scraper.workers());

        while let Some((position, group, result)) = results.next().await {
            match result {
                Ok(page) => {
                    tracing::info!(
                        "[{}/{}] Group {} ({}): {} diagrams, {} parts",
                        position + 1,
                        total,
                        group.id,
                        group.name,
                        page.diagrams.len(),
                        page.parts.len()
                    );
                    outcome.absorb(group.id, page);
                }
                Err(HarvestError::Cancelled) => {
                    outcome.cancelled = true;
                    break;
                }
                Err(e) if is_systemic(&e) => {
                    tracing::error!("Aborting crawl at group {}: {}", group.id, e);
                    outcome.aborted = Some(GroupFailure {
                        group_id: group.id,
                        name: group.name,
                        reason: e.to_string(),
                    });
                    break;
                }
                Err(e) => {
                    tracing::warn!("Skipping group {} ({}): {}", group.id, group.name, e);
                    outcome.failed.push(GroupFailure {
                        group_id: group.id,
                        name: group.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            outcome.cancelled = true;
        }

        tracing::info!(
            "Crawl finished: {} succeeded, {} failed{}{}",
            outcome.succeeded.len(),
            outcome.failed.len(),
            if outcome.cancelled { " (cancelled)" } else { "" },
            if outcome.aborted.is_some() { " (aborted)" } else { "" }
        );

        outcome
    }
}

/// Errors that would repeat for every group
fn is_systemic(err: &HarvestError) -> bool {
    matches!(
        err,
        HarvestError::Render(RenderError::Launch(_))
            | HarvestError::Storage(_)
            | HarvestError::Database(_)
    )
}
