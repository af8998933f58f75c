use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

use crate::config::ScrapingConfig;
use crate::crawlers::PageSource;
use crate::parsers::ParsedPage;
use crate::parsers::html;
use crate::results::{PageMetadata, WebPageContent};
use crate::utils;

/// Settings for a [`ContentScraper`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Maximum number of characters kept from a page's content
    pub max_content_length: usize,

    /// Pause between consecutive pages, in milliseconds
    pub delay_between_pages: u64,

    /// How long to wait for the page-ready signal before scraping anyway
    pub ready_timeout: Duration,

    /// How often the page-ready signal is polled
    pub ready_poll_interval: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        let scraping = ScrapingConfig::default();
        Self {
            max_content_length: scraping.max_content_length,
            delay_between_pages: scraping.delay_between_pages,
            ready_timeout: Duration::from_secs(10),
            ready_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Turns a loaded page into a [`WebPageContent`] record
#[derive(Debug, Clone, Default)]
pub struct ContentScraper {
    config: ScraperConfig,
}

impl ContentScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    /// Take the content length and delay from a scraping config
    pub fn from_scraping_config(scraping: &ScrapingConfig) -> Self {
        Self::new(ScraperConfig {
            max_content_length: scraping.max_content_length,
            delay_between_pages: scraping.delay_between_pages,
            ..ScraperConfig::default()
        })
    }

    pub fn set_max_content_length(&mut self, max_content_length: usize) {
        self.config.max_content_length = max_content_length;
    }

    pub fn set_delay_between_pages(&mut self, delay_ms: u64) {
        self.config.delay_between_pages = delay_ms;
    }

    pub fn set_ready_timeout(&mut self, ready_timeout: Duration) {
        self.config.ready_timeout = ready_timeout;
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn delay_between_pages(&self) -> Duration {
        Duration::from_millis(self.config.delay_between_pages)
    }

    /// Poll the page until it reports ready. Returns false if the timeout elapsed first.
    pub async fn wait_until_ready(&self, page: &dyn PageSource) -> bool {
        let started = Instant::now();
        let poll = self.config.ready_poll_interval;

        let waited = timeout(self.config.ready_timeout, async {
            while !page.is_ready().await {
                sleep(poll).await;
            }
        })
        .await;

        match waited {
            Ok(()) => {
                ::log::trace!("Page ready after {:?}", started.elapsed());
                true
            }
            Err(_) => {
                ::log::warn!(
                    "Page not ready after {:?}, scraping anyway",
                    self.config.ready_timeout
                );
                false
            }
        }
    }

    /// Scrape the page. Returns `None` when nothing could be extracted.
    pub async fn scrape_page(&self, page: &dyn PageSource) -> Option<WebPageContent> {
        self.wait_until_ready(page).await;

        let url = match page.url().await {
            Ok(url) => url,
            Err(e) => {
                ::log::error!("Failed to read page URL: {}", e);
                return None;
            }
        };

        let html = match page.html().await {
            Ok(html) => html,
            Err(e) => {
                ::log::error!("Failed to read page source for {}: {}", url, e);
                return None;
            }
        };

        self.build_record(url, &html)
    }

    /// Build a record from HTML that is already at hand
    pub fn build_record(&self, url: String, html: &str) -> Option<WebPageContent> {
        let parsed = ParsedPage::parse(html);

        if parsed.content.is_empty() {
            ::log::info!("No extractable content on {}", url);
            return None;
        }

        let content = utils::truncate_chars(&parsed.content, self.config.max_content_length);
        if content.len() < parsed.content.len() {
            ::log::debug!(
                "Truncated content of {} to {} characters",
                url,
                self.config.max_content_length
            );
        }

        Some(WebPageContent::new(
            url,
            parsed.title,
            content,
            parsed.metadata,
        ))
    }

    /// Main content text of an HTML document, never failing
    pub fn extract_main_content(source: &str) -> String {
        html::extract_main_content(&scraper::Html::parse_document(source))
    }

    pub fn extract_metadata(source: &str) -> PageMetadata {
        html::extract_metadata(&scraper::Html::parse_document(source))
    }
}
