//! Harvest coordinator - top-level orchestration
//!
//! This module wires configuration, storage, render gateways, the scraper
//! and the reconciler together, including:
//! - Building one render gateway per configured worker
//! - Harvesting the group tree and crawling diagrams pages
//! - Handing every scraped batch to the reconciler
//! - Reporting catalog statistics and wiping stored data

use crate::config::{Config, RenderBackend, RenderConfig};
use crate::crawler::scheduler::CrawlOutcome;
use crate::crawler::scraper::{CacheMode, CatalogScraper};
use crate::crawler::{lock_store, SharedStore};
use crate::extract::SearchHit;
use crate::query::QueryCodec;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::render::{ChromiumLauncher, HttpLauncher, RenderGateway, SessionLauncher};
use crate::storage::{open_storage, CatalogCounts};
use crate::{HarvestError, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// User agent sent by the HTTP backend when none is configured
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Result of a diagrams harvest
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    /// What the crawl scraped and skipped
    pub outcome: CrawlOutcome,

    /// Reconciliation of the scraped diagrams
    pub diagrams: ReconcileReport,

    /// Reconciliation of the scraped parts
    pub parts: ReconcileReport,
}

/// Main harvest coordinator
pub struct Coordinator {
    config: Arc<Config>,
    store: SharedStore,
    scraper: CatalogScraper,
    reconciler: Reconciler,
}

impl Coordinator {
    /// Creates a coordinator backed by the configured database
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `from_cache` - Extract from cached pages only, never render
    /// * `cancel` - Token that stops in-flight work
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Storage or codec failed to initialize
    pub fn new(config: Config, from_cache: bool, cancel: CancellationToken) -> Result<Self> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let store: SharedStore = Arc::new(Mutex::new(storage));
        let launcher = build_launcher(&config.render);
        Self::with_parts(config, store, launcher, from_cache, cancel)
    }

    /// Creates a coordinator from explicit storage and render backend
    pub fn with_parts(
        config: Config,
        store: SharedStore,
        launcher: Arc<dyn SessionLauncher>,
        from_cache: bool,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let codec = QueryCodec::new(&config.session.base_url)?;

        let gateways = (0..config.crawler.workers.max(1))
            .map(|_| Arc::new(RenderGateway::new(launcher.clone(), config.render.settle())))
            .collect();

        let cache = if from_cache {
            CacheMode::Offline
        } else if config.crawler.use_page_cache {
            CacheMode::ReadWrite
        } else {
            CacheMode::Disabled
        };

        let scraper = CatalogScraper::new(
            codec,
            config.session.descriptor(),
            gateways,
            config.crawler.request_delay(),
            cancel,
        )?
        .with_store(store.clone(), cache);

        let reconciler = Reconciler::new(config.reconcile.commit_mode, config.reconcile.part_identity);

        tracing::info!(
            "Coordinator ready: {} backend, {} worker(s), cache {:?}",
            launcher.name(),
            config.crawler.workers.max(1),
            cache
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            scraper,
            reconciler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scraper(&self) -> &CatalogScraper {
        &self.scraper
    }

    /// Scrapes the group listing and reconciles it into storage
    pub async fn harvest_groups(&self) -> Result<ReconcileReport> {
        let groups = self.scraper.scrape_groups().await?;
        let report = {
            let mut store = lock_store(&self.store)?;
            self.reconciler.reconcile_groups(&mut *store, &groups)?
        };
        self.check_strict(report)
    }

    /// Crawls a page of groups and reconciles their diagrams and parts
    ///
    /// The group tree is harvested first if storage holds none. Records
    /// scraped before a cancellation or a systemic failure are still
    /// reconciled.
    ///
    /// # Arguments
    ///
    /// * `page_size` - Maximum number of groups to crawl
    /// * `offset` - Number of eligible groups to skip
    ///
    /// # Returns
    ///
    /// * `Ok(HarvestSummary)` - The crawl ran to the end or was cancelled
    /// * `Err(HarvestError::CrawlAborted)` - A systemic failure stopped the
    ///   crawl after the completed groups were reconciled
    pub async fn harvest_diagrams(&self, page_size: usize, offset: usize) -> Result<HarvestSummary> {
        let stored_groups = lock_store(&self.store)?.counts()?.groups;
        if stored_groups == 0 && self.scraper.cache_mode() != CacheMode::Offline {
            tracing::info!("No groups stored yet, harvesting the group tree first");
            self.harvest_groups().await?;
        }

        let outcome = self.scraper.crawl_diagrams(page_size, offset).await?;
        let summary = self.reconcile_outcome(outcome)?;

        let Some(abort) = summary.outcome.aborted.clone() else {
            return Ok(summary);
        };

        tracing::error!(
            "Reconciled {} groups before the abort ({}, {})",
            summary.outcome.succeeded.len(),
            summary.diagrams,
            summary.parts
        );
        Err(HarvestError::CrawlAborted {
            group_id: abort.group_id,
            completed: summary.outcome.succeeded.len(),
            reason: abort.reason,
        })
    }

    /// Crawls a single stored group
    ///
    /// # Returns
    ///
    /// * `Ok(HarvestSummary)` - The group's records were reconciled
    /// * `Err(HarvestError::GroupNotFound)` - The id is not in storage
    pub async fn harvest_group(&self, group_id: i64) -> Result<HarvestSummary> {
        let group = lock_store(&self.store)?
            .get_group_by_id(group_id)?
            .ok_or(HarvestError::GroupNotFound(group_id))?;

        let page = self.scraper.scrape_group_diagrams(&group).await?;
        let outcome = CrawlOutcome {
            diagrams: page.diagrams,
            parts: page.parts,
            succeeded: vec![group.id],
            malformed: page.malformed.len(),
            ..CrawlOutcome::default()
        };
        self.reconcile_outcome(outcome)
    }

    /// Searches the catalog for a part number
    pub async fn search(&self, term: &str) -> Result<Vec<SearchHit>> {
        self.scraper.search_parts(term).await
    }

    /// Returns the current catalog counts
    pub fn statistics(&self) -> Result<CatalogCounts> {
        Ok(lock_store(&self.store)?.counts()?)
    }

    /// Deletes every stored part, diagram, group and cached page
    ///
    /// # Returns
    ///
    /// The counts as they were before the wipe
    pub fn wipe(&self) -> Result<CatalogCounts> {
        let mut store = lock_store(&self.store)?;
        let before = store.counts()?;

        store.wipe_parts()?;
        store.wipe_diagrams()?;
        store.wipe_groups()?;
        store.wipe_page_cache()?;

        tracing::info!(
            "Wiped {} groups, {} diagrams, {} parts, {} cached pages",
            before.groups,
            before.diagrams,
            before.parts,
            before.cached_pages
        );
        Ok(before)
    }

    /// Closes every render session
    pub async fn close(&self) -> Result<()> {
        self.scraper.close().await
    }

    fn reconcile_outcome(&self, outcome: CrawlOutcome) -> Result<HarvestSummary> {
        let mut store = lock_store(&self.store)?;
        let diagrams = self
            .reconciler
            .reconcile_diagrams(&mut *store, &outcome.diagrams)?;
        let parts = self.reconciler.reconcile_parts(&mut *store, &outcome.parts)?;

        Ok(HarvestSummary {
            outcome,
            diagrams: self.check_strict(diagrams)?,
            parts: self.check_strict(parts)?,
        })
    }

    /// In strict mode, turns the first rejection into an error
    ///
    /// Records that passed reconciliation are already written.
    fn check_strict(&self, report: ReconcileReport) -> Result<ReconcileReport> {
        if self.config.reconcile.strict {
            report.into_strict()
        } else {
            Ok(report)
        }
    }
}

/// Builds the session launcher for the configured backend
fn build_launcher(render: &RenderConfig) -> Arc<dyn SessionLauncher> {
    match render.backend {
        RenderBackend::Chromium => Arc::new(ChromiumLauncher::new(
            render.headless,
            render.timeout(),
            render.user_agent.clone(),
        )),
        RenderBackend::Http => Arc::new(HttpLauncher::new(
            render
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            render.timeout(),
        )),
    }
}
