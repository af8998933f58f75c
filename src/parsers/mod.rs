pub mod html;
pub mod text;


use scraper::Html;

use crate::results::PageMetadata;

/// Everything pulled out of one HTML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub title: String,
    /// Cleaned main content, not yet truncated
    pub content: String,
    pub metadata: PageMetadata,
}

impl ParsedPage {
    /// Parse a full HTML document.
    ///
    /// `scraper::Html` is not `Send`, so callers in async code should parse
    /// only after every await on the page source has completed.
    pub fn parse(html: &str) -> Self {
        let doc = Html::parse_document(html);

        Self {
            title: html::extract_title(&doc),
            content: html::extract_main_content(&doc),
            metadata: html::extract_metadata(&doc),
        }
    }
}
