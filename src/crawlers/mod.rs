pub mod content;
pub mod web;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub use content::{ContentScraper, ScraperConfig};

/// Errors raised while reading from a page source
#[derive(Debug, Error)]
pub enum PageError {
    #[error("webdriver error: {0}")]
    WebDriver(String),

    #[error("page unavailable: {0}")]
    Unavailable(String),
}

/// A loaded document the scraper can read from.
///
/// Implemented by [`web::WebDriverPage`] for live browser pages and by
/// [`StaticPage`] for HTML that is already in memory.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Whether the page has finished loading
    async fn is_ready(&self) -> bool;

    /// Address of the current document
    async fn url(&self) -> Result<String, PageError>;

    /// Full HTML of the current document
    async fn html(&self) -> Result<String, PageError>;
}

/// An in-memory document
#[derive(Debug, Clone)]
pub struct StaticPage {
    url: String,
    html: String,
    ready: bool,
}

impl StaticPage {
    /// A page that is ready immediately
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            ready: true,
        }
    }

    /// A page whose ready signal never fires
    pub fn never_ready(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            ready: false,
            ..Self::new(url, html)
        }
    }
}

#[async_trait]
impl PageSource for StaticPage {
    async fn is_ready(&self) -> bool {
        self.ready
    }

    async fn url(&self) -> Result<String, PageError> {
        Ok(self.url.clone())
    }

    async fn html(&self) -> Result<String, PageError> {
        Ok(self.html.clone())
    }
}

/// Opens pages by URL
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Box<dyn PageSource>, PageError>;
}

/// Serves [`StaticPage`]s from a fixed set of documents
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    pages: HashMap<String, String>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

#[async_trait]
impl PageLoader for StaticLoader {
    async fn load(&self, url: &str) -> Result<Box<dyn PageSource>, PageError> {
        self.pages
            .get(url)
            .map(|html| Box::new(StaticPage::new(url, html.clone())) as Box<dyn PageSource>)
            .ok_or_else(|| PageError::Unavailable(format!("no document for {}", url)))
    }
}
