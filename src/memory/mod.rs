//! Storage adapters for the supported memory backends.
//!
//! Every backend implements [`MemoryAdapter`]; [`factory::MemoryAdapterFactory`]
//! picks the implementation from a [`MemoryConfig`]. Network failures surface
//! as [`MemoryError::Operation`] (`"<operation> failed: <message>"`), while
//! unexpected response shapes degrade to empty search results or zeroed stats.

pub mod embedding;
pub mod factory;
pub mod http;
pub mod letta;
pub mod mem0;
pub mod vector_db;
pub mod zep;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::{MemoryConfig, MemoryProvider};
use crate::error::MemoryError;
use crate::memory::http::{HttpError, MemoryHttpClient};
use crate::results::{PageMetadata, WebPageContent};
use crate::utils;

pub use embedding::{Embedder, HashEmbedder};
pub use factory::{MemoryAdapterFactory, ValidationReport};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Totals reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total: u64,
    /// Milliseconds since the Unix epoch
    pub last_updated: Option<i64>,
}

/// Uniform contract implemented by every memory backend
#[async_trait]
pub trait MemoryAdapter: Send + Sync {
    fn provider(&self) -> MemoryProvider;

    /// Check reachability and prepare any server-side resources
    async fn connect(&mut self) -> Result<(), MemoryError>;

    async fn disconnect(&mut self) -> Result<(), MemoryError>;

    async fn save(&self, content: &WebPageContent) -> Result<(), MemoryError>;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebPageContent>, MemoryError>;

    /// Remove everything stored for `url`
    async fn delete(&self, url: &str) -> Result<(), MemoryError>;

    async fn clear(&self) -> Result<(), MemoryError>;

    async fn get_stats(&self) -> Result<MemoryStats, MemoryError>;

    /// Never fails; an unreachable backend reports `false`
    async fn test_connection(&self) -> bool;

    fn is_connected(&self) -> bool;

    fn config(&self) -> &MemoryConfig;

    /// Replace the whole configuration. The adapter must be connected again afterwards.
    fn update_config(&mut self, config: MemoryConfig) -> Result<(), MemoryError>;

    fn validate_config(&self) -> bool {
        MemoryAdapterFactory::validate_config(self.config()).valid
    }
}

/// State every adapter carries: its config, an HTTP client and the connection flag
#[derive(Debug, Clone)]
pub(crate) struct AdapterCore {
    pub config: MemoryConfig,
    pub client: MemoryHttpClient,
    pub connected: bool,
}

impl AdapterCore {
    pub fn new(config: MemoryConfig) -> Result<Self, MemoryError> {
        let client = MemoryHttpClient::new(&config)
            .map_err(|e| MemoryError::InvalidConfig(vec![e.to_string()]))?;
        Ok(Self {
            config,
            client,
            connected: false,
        })
    }

    /// Swap in a new config for the same provider
    pub fn replace_config(
        &mut self,
        provider: MemoryProvider,
        config: MemoryConfig,
    ) -> Result<(), MemoryError> {
        let report = MemoryAdapterFactory::validate_config(&config);
        if !report.valid {
            return Err(MemoryError::InvalidConfig(report.errors));
        }
        if config.provider_kind()? != provider {
            return Err(MemoryError::InvalidConfig(vec![format!(
                "cannot change provider from {} to {}",
                provider, config.provider
            )]));
        }

        *self = Self::new(config)?;
        Ok(())
    }

    pub fn ensure_connected(&self, operation: &'static str) -> Result<(), MemoryError> {
        if self.connected {
            Ok(())
        } else {
            Err(MemoryError::operation(operation, "adapter is not connected"))
        }
    }
}

/// Wrap a transport error with the failing operation
pub(crate) fn op_error(operation: &'static str) -> impl Fn(HttpError) -> MemoryError {
    move |e| MemoryError::operation(operation, e)
}

/// Stable identifier for the record of a URL
pub fn record_id(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

/// Metadata stored alongside a record so it can be rebuilt from search results
pub(crate) fn record_metadata(content: &WebPageContent) -> Value {
    json!({
        "url": content.url,
        "title": content.title,
        "domain": content.domain,
        "timestamp": content.timestamp,
        "pageMetadata": content.metadata,
    })
}

/// Rebuild a record from stored text and metadata. Items without a URL are skipped.
pub(crate) fn page_from_parts(text: Option<&str>, metadata: &Value) -> Option<WebPageContent> {
    let url = metadata.get("url").and_then(Value::as_str)?.trim();
    if url.is_empty() {
        return None;
    }

    let text = text
        .or_else(|| metadata.get("content").and_then(Value::as_str))
        .unwrap_or_default();

    let page_metadata = metadata
        .get("pageMetadata")
        .cloned()
        .and_then(|value| serde_json::from_value::<PageMetadata>(value).ok())
        .unwrap_or_default();

    Some(WebPageContent {
        url: url.to_string(),
        title: str_field(metadata, "title"),
        content: text.to_string(),
        timestamp: metadata
            .get("timestamp")
            .and_then(Value::as_i64)
            .unwrap_or_default(),
        domain: metadata
            .get("domain")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| utils::domain_of(url)),
        metadata: page_metadata,
    })
}

/// Array under `key`, or nothing if the response has another shape
pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub(crate) fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Stats from the first matching numeric keys, zero when absent
pub(crate) fn stats_from_value(value: &Value, total_keys: &[&str], updated_keys: &[&str]) -> MemoryStats {
    let total = total_keys
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_u64))
        .unwrap_or_default();
    let last_updated = updated_keys
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_i64));

    if total == 0 && !value.is_object() {
        ::log::warn!("Unexpected stats response shape, reporting zero");
    }

    MemoryStats {
        total,
        last_updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WebPageContent {
        WebPageContent {
            url: "https://example.com/a".to_string(),
            title: "A".to_string(),
            content: "Body".to_string(),
            timestamp: 1_700_000_000_000,
            domain: "example.com".to_string(),
            metadata: PageMetadata {
                author: Some("Ann".to_string()),
                ..PageMetadata::default()
            },
        }
    }

    #[test]
    fn test_record_id_is_stable_and_distinct() {
        assert_eq!(record_id("https://example.com/a"), record_id("https://example.com/a"));
        assert_ne!(record_id("https://example.com/a"), record_id("https://example.com/b"));
        assert!(
            record_id("https://example.com/a?x=1&y=2")
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_metadata_rebuilds_record() {
        let page = sample();
        let metadata = record_metadata(&page);
        let rebuilt = page_from_parts(Some("Body"), &metadata).unwrap();
        assert_eq!(rebuilt, page);
    }

    #[test]
    fn test_page_from_parts_tolerates_partial_metadata() {
        let rebuilt = page_from_parts(None, &json!({"url": "https://x.org/p", "content": "c"})).unwrap();
        assert_eq!(rebuilt.domain, "x.org");
        assert_eq!(rebuilt.content, "c");
        assert_eq!(rebuilt.title, "");
        assert_eq!(rebuilt.timestamp, 0);

        assert!(page_from_parts(Some("x"), &json!({"title": "no url"})).is_none());
        assert!(page_from_parts(Some("x"), &json!("string")).is_none());
    }

    #[test]
    fn test_stats_from_value() {
        let stats = stats_from_value(&json!({"count": 7, "updated": 5}), &["total", "count"], &["updated"]);
        assert_eq!(stats, MemoryStats { total: 7, last_updated: Some(5) });
        assert_eq!(stats_from_value(&Value::Null, &["total"], &[]), MemoryStats::default());
    }

    #[test]
    fn test_array_field() {
        let value = json!({"items": [1, 2], "other": "x"});
        assert_eq!(array_field(&value, "items").len(), 2);
        assert!(array_field(&value, "other").is_empty());
        assert!(array_field(&Value::Null, "items").is_empty());
    }
}
