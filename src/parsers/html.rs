use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::parsers::text;
use crate::results::PageMetadata;

/// Candidate containers for the main content, in priority order
pub const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "[role=\"main\"]",
    "main",
    "article",
    "#content",
    "#main",
    ".main-content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".article-body",
    ".post",
];

/// A candidate container must yield more characters than this to be accepted
pub const MIN_CONTENT_LENGTH: usize = 100;

/// Subtrees that never contribute text
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "object", "embed", "svg", "template", "canvas",
];

/// Elements that start a new line in the extracted text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Parse a CSS selector, logging instead of failing
fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            ::log::warn!("Skipping invalid selector '{}': {:?}", css, e);
            None
        }
    }
}

/// Cleaned text of an element, without script, style and embedded-object subtrees
pub fn element_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    text::clean_text(&raw)
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }
            let is_block = BLOCK_ELEMENTS.contains(&name);
            if is_block {
                out.push('\n');
            }
            collect_text(child_element, out);
            if is_block {
                out.push('\n');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(&**text);
        }
    }
}

/// Text of the first main-content candidate that is long enough, falling
/// back to the whole body
pub fn extract_main_content(doc: &Html) -> String {
    for css in MAIN_CONTENT_SELECTORS {
        let Some(sel) = selector(css) else {
            continue;
        };

        for candidate in doc.select(&sel) {
            let content = element_text(candidate);
            if text::char_len(&content) > MIN_CONTENT_LENGTH {
                ::log::debug!("Main content found with selector '{}'", css);
                return content;
            }
        }
    }

    ::log::debug!("No main content container qualified, falling back to body");
    extract_body_text(doc)
}

/// Cleaned text of the whole body, or an empty string if there is no body
pub fn extract_body_text(doc: &Html) -> String {
    selector("body")
        .and_then(|sel| doc.select(&sel).next())
        .map(element_text)
        .unwrap_or_default()
}

/// Document title from `<title>`, then `og:title`, then the first `<h1>`
pub fn extract_title(doc: &Html) -> String {
    let from_title = first_text(doc, "title");
    if !from_title.is_empty() {
        return from_title;
    }

    if let Some(og_title) = meta_content(doc, "meta[property=\"og:title\"]") {
        return og_title;
    }

    first_text(doc, "h1")
}

fn first_text(doc: &Html, css: &str) -> String {
    selector(css)
        .and_then(|sel| doc.select(&sel).next())
        .map(|el| text::collapse_inline_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

/// Trimmed, non-empty attribute of the first element matching `css`
fn first_attr(doc: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn meta_content(doc: &Html, css: &str) -> Option<String> {
    first_attr(doc, css, "content")
}

/// Best-effort page metadata. Every field is optional and missing tags are skipped.
pub fn extract_metadata(doc: &Html) -> PageMetadata {
    let mut metadata = PageMetadata {
        description: meta_content(doc, "meta[name=\"description\"]")
            .or_else(|| meta_content(doc, "meta[property=\"og:description\"]")),
        keywords: meta_content(doc, "meta[name=\"keywords\"]")
            .map(|raw| split_keywords(&raw))
            .filter(|keywords| !keywords.is_empty()),
        author: extract_author(doc),
        published_date: meta_content(doc, "meta[property=\"article:published_time\"]")
            .or_else(|| meta_content(doc, "meta[name=\"date\"]"))
            .or_else(|| first_attr(doc, "time[datetime]", "datetime")),
        language: first_attr(doc, "html[lang]", "lang")
            .or_else(|| meta_content(doc, "meta[http-equiv=\"content-language\"]")),
        ..PageMetadata::default()
    };

    if let Some(site_name) = meta_content(doc, "meta[property=\"og:site_name\"]") {
        metadata
            .extra
            .insert("siteName".to_string(), Value::from(site_name));
    }
    if let Some(canonical) = first_attr(doc, "link[rel=\"canonical\"]", "href") {
        metadata
            .extra
            .insert("canonicalUrl".to_string(), Value::from(canonical));
    }

    metadata
}

fn extract_author(doc: &Html) -> Option<String> {
    if let Some(author) = meta_content(doc, "meta[name=\"author\"]") {
        return Some(author);
    }

    let sel = selector("[rel=\"author\"]")?;
    doc.select(&sel)
        .map(|el| text::collapse_inline_whitespace(&el.text().collect::<String>()))
        .find(|name| !name.is_empty())
}

/// Split a comma separated keyword list, dropping blanks
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
