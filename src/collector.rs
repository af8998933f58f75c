//! Ties the pieces together: admission, extraction, redaction and storage of
//! one page at a time, plus the scheduled walk over a watch list.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;

use crate::config::{MemoryConfig, PluginState, PluginStats, ScrapingConfig};
use crate::crawlers::{ContentScraper, PageLoader, PageSource};
use crate::error::{MemoryError, ScheduleError};
use crate::filter::UrlMatcher;
use crate::host::{HostMessage, HostMessaging, SkipReason};
use crate::memory::{DEFAULT_SEARCH_LIMIT, MemoryAdapter, MemoryAdapterFactory, MemoryStats};
use crate::results::WebPageContent;
use crate::scheduler::ScheduleTrigger;
use crate::sensitive::SensitiveFilter;
use crate::utils;

/// Host setting the running totals are mirrored to
pub const STATS_SETTING: &str = "stats";

/// What happened to a page handed to [`Collector::collect`]
#[derive(Debug, Clone, PartialEq)]
pub enum CollectOutcome {
    Saved(WebPageContent),
    Skipped(SkipReason),
}

/// Components derived from the scraping config, rebuilt together on update
struct Pipeline {
    config: ScrapingConfig,
    matcher: UrlMatcher,
    redactor: SensitiveFilter,
    scraper: ContentScraper,
}

impl Pipeline {
    fn new(config: ScrapingConfig) -> Self {
        Self {
            matcher: UrlMatcher::new(&config.blacklist),
            redactor: SensitiveFilter::from_config(&config.sensitive_filters),
            scraper: ContentScraper::from_scraping_config(&config),
            config,
        }
    }
}

struct WatchList {
    urls: Vec<String>,
    loader: Arc<dyn PageLoader>,
}

pub struct Collector {
    pipeline: RwLock<Pipeline>,
    adapter: RwLock<Box<dyn MemoryAdapter>>,
    stats: Mutex<PluginStats>,
    active: AtomicBool,
    host: Arc<dyn HostMessaging>,
    watch: Option<WatchList>,
}

impl Collector {
    pub fn new(
        state: PluginState,
        adapter: Box<dyn MemoryAdapter>,
        host: Arc<dyn HostMessaging>,
    ) -> Self {
        Self {
            pipeline: RwLock::new(Pipeline::new(state.current_config)),
            adapter: RwLock::new(adapter),
            stats: Mutex::new(state.stats),
            active: AtomicBool::new(state.is_active),
            host,
            watch: None,
        }
    }

    /// Collector whose adapter is built from `state.memory_config`
    pub fn from_state(state: PluginState, host: Arc<dyn HostMessaging>) -> Result<Self, MemoryError> {
        let adapter = MemoryAdapterFactory::create_adapter(&state.memory_config)?;
        Ok(Self::new(state, adapter, host))
    }

    /// URLs visited on every scheduled run, in order
    pub fn with_watch_list(mut self, urls: Vec<String>, loader: Arc<dyn PageLoader>) -> Self {
        self.watch = Some(WatchList { urls, loader });
        self
    }

    pub async fn connect(&self) -> Result<(), MemoryError> {
        self.adapter.write().await.connect().await
    }

    pub async fn disconnect(&self) -> Result<(), MemoryError> {
        self.adapter.write().await.disconnect().await
    }

    pub async fn test_connection(&self) -> bool {
        self.adapter.read().await.test_connection().await
    }

    pub async fn memory_stats(&self) -> Result<MemoryStats, MemoryError> {
        self.adapter.read().await.get_stats().await
    }

    /// Look up stored pages, `DEFAULT_SEARCH_LIMIT` of them unless told otherwise
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<WebPageContent>, MemoryError> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        self.adapter.read().await.search(query, limit).await
    }

    /// Scheduled runs only collect while active; `collect` is always available
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> PluginStats {
        self.stats.lock().await.clone()
    }

    /// Snapshot of the whole state, suitable for persisting
    pub async fn state(&self) -> PluginState {
        PluginState {
            is_active: self.is_active(),
            current_config: self.pipeline.read().await.config.clone(),
            memory_config: self.adapter.read().await.config().clone(),
            stats: self.stats().await,
        }
    }

    pub async fn scraping_config(&self) -> ScrapingConfig {
        self.pipeline.read().await.config.clone()
    }

    /// Replace the scraping config. The latest call wins; an invalid schedule
    /// leaves the current config in place.
    pub async fn update_scraping_config(&self, config: ScrapingConfig) -> Result<(), ScheduleError> {
        config.schedule.validate()?;
        *self.pipeline.write().await = Pipeline::new(config);
        ::log::info!("Scraping configuration updated");
        Ok(())
    }

    /// Point storage at a new backend and connect to it
    pub async fn update_memory_config(&self, config: MemoryConfig) -> Result<(), MemoryError> {
        let report = MemoryAdapterFactory::validate_config(&config);
        if !report.valid {
            return Err(MemoryError::InvalidConfig(report.errors));
        }

        let mut adapter = self.adapter.write().await;
        if config.provider_kind()? == adapter.provider() {
            adapter.update_config(config)?;
        } else {
            if let Err(e) = adapter.disconnect().await {
                ::log::warn!("Failed to disconnect {} adapter: {}", adapter.provider(), e);
            }
            *adapter = MemoryAdapterFactory::create_adapter(&config)?;
        }
        adapter.connect().await
    }

    /// Reason `url` must not be collected right now, if any
    pub async fn admission(&self, url: &str) -> Option<SkipReason> {
        let pipeline = self.pipeline.read().await;
        if !pipeline.config.enabled {
            return Some(SkipReason::Disabled);
        }
        pipeline
            .matcher
            .matching_pattern(url)
            .map(|pattern| SkipReason::Blacklisted {
                pattern: pattern.to_string(),
            })
    }

    /// Run one page through admission, extraction, redaction and storage.
    ///
    /// Only storage failures are returned as errors; everything else ends in
    /// [`CollectOutcome::Skipped`].
    pub async fn collect(&self, page: &dyn PageSource) -> Result<CollectOutcome, MemoryError> {
        let url = match page.url().await {
            Ok(url) => url,
            Err(e) => {
                self.stats.lock().await.errors += 1;
                return Ok(self.skip(
                    "",
                    SkipReason::Unreadable {
                        message: e.to_string(),
                    },
                ));
            }
        };

        if let Some(reason) = self.admission(&url).await {
            return Ok(self.skip(&url, reason));
        }

        let (scraper, redactor) = {
            let pipeline = self.pipeline.read().await;
            (pipeline.scraper.clone(), pipeline.redactor.clone())
        };

        let Some(mut record) = scraper.scrape_page(page).await else {
            return Ok(self.skip(&url, SkipReason::NothingExtracted));
        };
        record.title = redactor.filter(&record.title);
        record.content = redactor.filter(&record.content);

        let saved = self.adapter.read().await.save(&record).await;
        if let Err(e) = saved {
            ::log::error!("Failed to store {}: {}", record.url, e);
            self.stats.lock().await.errors += 1;
            self.host.send_message(HostMessage::Error {
                url: Some(record.url.clone()),
                message: e.to_string(),
            });
            self.persist_stats().await;
            return Err(e);
        }

        {
            let mut stats = self.stats.lock().await;
            stats.total_pages_scraped += 1;
            stats.last_scraped_at = Some(utils::now_millis());
        }
        ::log::info!("Stored {} ({} chars)", record.url, record.content.chars().count());
        self.host.send_message(HostMessage::PageSaved {
            url: record.url.clone(),
            title: record.title.clone(),
            timestamp: record.timestamp,
        });
        self.persist_stats().await;

        Ok(CollectOutcome::Saved(record))
    }

    /// Visit the watch list once. Returns how many pages were stored.
    pub async fn run_watch_list(&self) -> usize {
        if !self.is_active() {
            ::log::debug!("Collector is inactive, skipping watch list run");
            return 0;
        }
        let Some(watch) = &self.watch else {
            ::log::debug!("No watch list configured");
            return 0;
        };

        let delay = self.pipeline.read().await.scraper.delay_between_pages();
        let mut saved = 0;

        for (i, url) in watch.urls.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                sleep(delay).await;
            }

            if let Some(reason) = self.admission(url).await {
                self.skip(url, reason);
                continue;
            }

            let page = match watch.loader.load(url).await {
                Ok(page) => page,
                Err(e) => {
                    ::log::error!("Failed to load {}: {}", url, e);
                    self.stats.lock().await.errors += 1;
                    self.host.send_message(HostMessage::Error {
                        url: Some(url.clone()),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            match self.collect(page.as_ref()).await {
                Ok(CollectOutcome::Saved(_)) => saved += 1,
                Ok(CollectOutcome::Skipped(_)) => {}
                Err(e) => ::log::warn!("Giving up on {} for this run: {}", url, e),
            }
        }

        ::log::info!("Watch list run stored {}/{} pages", saved, watch.urls.len());
        saved
    }

    fn skip(&self, url: &str, reason: SkipReason) -> CollectOutcome {
        ::log::debug!("Skipping {}: {:?}", url, reason);
        self.host.send_message(HostMessage::PageSkipped {
            url: url.to_string(),
            reason: reason.clone(),
        });
        CollectOutcome::Skipped(reason)
    }

    async fn persist_stats(&self) {
        let stats = self.stats().await;
        match serde_json::to_value(&stats) {
            Ok(value) => self.host.set_setting(STATS_SETTING, value).await,
            Err(e) => ::log::warn!("Could not serialize stats: {}", e),
        }
    }
}

#[async_trait]
impl ScheduleTrigger for Collector {
    async fn on_schedule(&self) {
        self.run_watch_list().await;
    }
}
