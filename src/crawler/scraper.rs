//! Catalog scraper
//!
//! Glues the query codec, the render gateways and the extractors together.
//! The scraper reads from storage and writes the page cache, but never
//! touches the catalog tables; batches it produces are handed to the
//! reconciliation engine by the caller.

use crate::crawler::scheduler::{CrawlOutcome, CrawlScheduler, Pacer};
use crate::crawler::{lock_store, SharedStore};
use crate::extract::{extract_diagrams, extract_groups, extract_search, DiagramPage, SearchHit};
use crate::model::{Group, SessionDescriptor};
use crate::query::{Endpoint, QueryCodec, QueryParams};
use crate::render::{RenderError, RenderGateway};
use crate::storage::Pagination;
use crate::{ConfigError, HarvestError, QueryError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How rendered diagrams pages are cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Always render, never store
    #[default]
    Disabled,

    /// Reuse a cached page when present, store every rendered page
    ReadWrite,

    /// Only read cached pages; groups without one fail
    Offline,
}

/// Scrapes groups, diagrams and search results from the catalog
pub struct CatalogScraper {
    codec: QueryCodec,
    session: SessionDescriptor,
    gateways: Vec<Arc<RenderGateway>>,
    pacer: Arc<Pacer>,
    store: Option<SharedStore>,
    cache: CacheMode,
    cancel: CancellationToken,
}

impl CatalogScraper {
    /// Creates a scraper
    ///
    /// # Arguments
    ///
    /// * `codec` - Query codec bound to the catalog origin
    /// * `session` - Vehicle session used for listing pages
    /// * `gateways` - One gateway per worker; the first serves single fetches
    /// * `request_delay` - Minimum time between request starts
    /// * `cancel` - Token that aborts in-flight work
    ///
    /// # Returns
    ///
    /// * `Ok(CatalogScraper)` - Ready to scrape
    /// * `Err(HarvestError::Config)` - No gateway was supplied
    pub fn new(
        codec: QueryCodec,
        session: SessionDescriptor,
        gateways: Vec<Arc<RenderGateway>>,
        request_delay: Duration,
        cancel: CancellationToken,
    ) -> Result<Self> {
        if gateways.is_empty() {
            return Err(ConfigError::Validation(
                "at least one render gateway is required".to_string(),
            )
            .into());
        }

        Ok(Self {
            codec,
            session,
            gateways,
            pacer: Arc::new(Pacer::new(request_delay)),
            store: None,
            cache: CacheMode::Disabled,
            cancel,
        })
    }

    /// Attaches storage, used for crawl targets and the page cache
    pub fn with_store(mut self, store: SharedStore, cache: CacheMode) -> Self {
        self.store = Some(store);
        self.cache = cache;
        self
    }

    pub fn codec(&self) -> &QueryCodec {
        &self.codec
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.cache
    }

    pub(crate) fn gateway(&self, worker: usize) -> &RenderGateway {
        &self.gateways[worker % self.gateways.len()]
    }

    pub(crate) fn workers(&self) -> usize {
        self.gateways.len()
    }

    /// Renders the group listing and extracts the flat group list
    pub async fn scrape_groups(&self) -> Result<Vec<Group>> {
        let params = QueryParams::for_session(&self.session).with_cid("0");
        let url = self.codec.build(Endpoint::Groups, &params)?;

        tracing::info!("Scraping group listing for {}", self.session.car());
        let html = self.render(self.gateway(0), &url).await?;
        let listing = extract_groups(&html, &self.codec)?;

        tracing::info!(
            "Found {} groups ({} with diagrams, {} rows skipped)",
            listing.groups.len(),
            listing.groups.iter().filter(|g| g.has_diagrams()).count(),
            listing.skipped_rows
        );

        Ok(listing.groups)
    }

    /// Scrapes one group's diagrams and parts
    pub async fn scrape_group_diagrams(&self, group: &Group) -> Result<DiagramPage> {
        self.scrape_group_diagrams_on(self.gateway(0), group).await
    }

    /// Scrapes one group's diagrams and parts through a specific gateway
    pub(crate) async fn scrape_group_diagrams_on(
        &self,
        gateway: &RenderGateway,
        group: &Group,
    ) -> Result<DiagramPage> {
        let html = match self.cached_page(group.id)? {
            Some(html) => {
                tracing::debug!("Group {}: using cached page", group.id);
                html
            }
            None if self.cache == CacheMode::Offline => {
                return Err(HarvestError::PageNotCached(group.id));
            }
            None => {
                let url = self.group_diagrams_url(group)?;
                let html = self.render(gateway, &url).await?;
                self.store_page(group.id, &url, &html);
                html
            }
        };

        Ok(extract_diagrams(&html, group.id, &self.codec)?)
    }

    /// Searches the catalog for a part number
    pub async fn search_parts(&self, term: &str) -> Result<Vec<SearchHit>> {
        let url = self.codec.build(Endpoint::Search, &QueryParams::search(term))?;
        let html = self.render(self.gateway(0), &url).await?;
        Ok(extract_search(&html, &self.codec)?)
    }

    /// Crawls a page of groups that have diagrams
    ///
    /// Targets come from storage; if storage holds no groups, the listing
    /// is scraped and used without being stored.
    ///
    /// # Arguments
    ///
    /// * `page_size` - Maximum number of groups to crawl
    /// * `offset` - Number of eligible groups to skip
    pub async fn crawl_diagrams(&self, page_size: usize, offset: usize) -> Result<CrawlOutcome> {
        let targets = self.crawl_targets(page_size, offset).await?;
        tracing::info!(
            "Crawling {} groups (offset {}, {} workers)",
            targets.len(),
            offset,
            self.workers()
        );
        Ok(CrawlScheduler::new(self).run(targets).await)
    }

    async fn crawl_targets(&self, page_size: usize, offset: usize) -> Result<Vec<Group>> {
        if let Some(store) = &self.store {
            let stored = {
                let guard = lock_store(store)?;
                if guard.counts()?.groups > 0 {
                    Some(guard.get_groups_with_diagrams(Pagination::new(page_size, offset))?)
                } else {
                    None
                }
            };
            if let Some(groups) = stored {
                return Ok(groups);
            }
        }

        if self.cache == CacheMode::Offline {
            tracing::warn!("No stored groups and the listing is not cached; nothing to crawl");
            return Ok(Vec::new());
        }

        Ok(self
            .scrape_groups()
            .await?
            .into_iter()
            .filter(Group::has_diagrams)
            .skip(offset)
            .take(page_size)
            .collect())
    }

    /// Rebuilds the diagrams URL for a group from its listing link
    ///
    /// The link's own session parameters are kept, since the site issues
    /// them per listing; the configured session fills any gap.
    fn group_diagrams_url(&self, group: &Group) -> Result<Url> {
        let link = group
            .diagrams_url
            .as_deref()
            .ok_or(QueryError::MissingParameter {
                endpoint: Endpoint::GroupDiagrams.name(),
                param: "gid",
            })?;

        let decoded = self.codec.decode(link)?;
        let session = decoded.session().unwrap_or_else(|| self.session.clone());
        let mut params = QueryParams::for_session(&session);
        params.gid = decoded.gid;

        Ok(self.codec.build(Endpoint::GroupDiagrams, &params)?)
    }

    fn cached_page(&self, group_id: i64) -> Result<Option<String>> {
        if self.cache == CacheMode::Disabled {
            return Ok(None);
        }
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let page = lock_store(store)?.get_cached_page_html(group_id)?;
        Ok(page.map(|p| p.html))
    }

    fn store_page(&self, group_id: i64, url: &Url, html: &str) {
        if self.cache != CacheMode::ReadWrite {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };
        let saved = lock_store(store).and_then(|mut s| s.save_page_html(group_id, url.as_str(), html));
        if let Err(e) = saved {
            tracing::warn!("Group {}: failed to cache page: {}", group_id, e);
        }
    }

    /// Waits for the pacer, then renders through `gateway`
    async fn render(&self, gateway: &RenderGateway, url: &Url) -> Result<String> {
        self.pacer.wait(&self.cancel).await?;
        tracing::debug!("Rendering {}", url);
        gateway.fetch(url, &self.cancel).await.map_err(|e| match e {
            RenderError::Cancelled => HarvestError::Cancelled,
            other => other.into(),
        })
    }

    /// Closes every gateway
    pub async fn close(&self) -> Result<()> {
        for gateway in &self.gateways {
            gateway.close().await?;
        }
        Ok(())
    }
}
