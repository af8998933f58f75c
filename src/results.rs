use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils;

/// Represents a scraped page ready to be handed to a memory adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPageContent {
    /// URL of the page
    pub url: String,

    /// Title of the page (empty if none was found)
    #[serde(default)]
    pub title: String,

    /// Cleaned main content, bounded by the scraper's max content length
    #[serde(default)]
    pub content: String,

    /// Scrape time in milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,

    /// Host name derived from `url`
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub metadata: PageMetadata,
}

impl WebPageContent {
    /// Create a record stamped with the current time, deriving the domain from the URL
    pub fn new(url: String, title: String, content: String, metadata: PageMetadata) -> Self {
        let domain = utils::domain_of(&url);
        Self {
            url,
            title,
            content,
            timestamp: utils::now_millis(),
            domain,
            metadata,
        }
    }
}

/// Page metadata. The well-known keys are typed; anything else lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageMetadata {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.keywords.is_none()
            && self.author.is_none()
            && self.published_date.is_none()
            && self.language.is_none()
            && self.extra.is_empty()
    }
}
