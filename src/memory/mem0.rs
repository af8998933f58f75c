use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::{MemoryConfig, MemoryProvider};
use crate::error::MemoryError;
use crate::memory::{
    AdapterCore, MemoryAdapter, MemoryStats, array_field, op_error, page_from_parts, record_id,
    record_metadata, stats_from_value,
};
use crate::results::WebPageContent;

/// Adapter for mem0-style memory stores: records are memories keyed by an id
/// derived from the page URL
pub struct Mem0Adapter {
    core: AdapterCore,
}

impl Mem0Adapter {
    pub fn new(config: MemoryConfig) -> Result<Self, MemoryError> {
        Ok(Self {
            core: AdapterCore::new(config)?,
        })
    }

    fn memory_body(&self, content: &WebPageContent) -> Value {
        let mut metadata = record_metadata(content);
        metadata["collection"] = Value::from(self.core.config.collection());

        json!({
            "memories": [{
                "id": record_id(&content.url),
                "content": content.content,
                "metadata": metadata,
            }]
        })
    }
}

#[async_trait]
impl MemoryAdapter for Mem0Adapter {
    fn provider(&self) -> MemoryProvider {
        MemoryProvider::Mem0
    }

    async fn connect(&mut self) -> Result<(), MemoryError> {
        self.core
            .client
            .get("v1/health", &[])
            .await
            .map_err(op_error("connect"))?;
        self.core.connected = true;
        ::log::info!("Connected to mem0 at {}", self.core.client.endpoint());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MemoryError> {
        self.core.connected = false;
        Ok(())
    }

    async fn save(&self, content: &WebPageContent) -> Result<(), MemoryError> {
        self.core.ensure_connected("save")?;
        self.core
            .client
            .post("v1/memories", &self.memory_body(content))
            .await
            .map_err(op_error("save"))?;
        ::log::debug!("Saved {} to mem0", content.url);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebPageContent>, MemoryError> {
        self.core.ensure_connected("search")?;
        let response = self
            .core
            .client
            .get(
                "v1/memories/search",
                &[("query", query.to_string()), ("limit", limit.to_string())],
            )
            .await
            .map_err(op_error("search"))?;

        Ok(array_field(&response, "memories")
            .iter()
            .filter_map(|memory| {
                let metadata = memory.get("metadata").unwrap_or(&Value::Null);
                page_from_parts(memory.get("content").and_then(Value::as_str), metadata)
            })
            .take(limit)
            .collect())
    }

    async fn delete(&self, url: &str) -> Result<(), MemoryError> {
        self.core.ensure_connected("delete")?;
        self.core
            .client
            .delete(&format!("v1/memories/{}", record_id(url)), &[])
            .await
            .map_err(op_error("delete"))?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.core.ensure_connected("clear")?;
        self.core
            .client
            .delete("v1/memories", &[])
            .await
            .map_err(op_error("clear"))?;
        Ok(())
    }

    async fn get_stats(&self) -> Result<MemoryStats, MemoryError> {
        self.core.ensure_connected("getStats")?;
        let response = self
            .core
            .client
            .get("v1/stats", &[])
            .await
            .map_err(op_error("getStats"))?;
        Ok(stats_from_value(
            &response,
            &["total", "total_memories"],
            &["last_updated", "lastUpdated"],
        ))
    }

    async fn test_connection(&self) -> bool {
        match self.core.client.get("v1/health", &[]).await {
            Ok(_) => true,
            Err(e) => {
                ::log::warn!("mem0 connection test failed: {}", e);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.core.connected
    }

    fn config(&self) -> &MemoryConfig {
        &self.core.config
    }

    fn update_config(&mut self, config: MemoryConfig) -> Result<(), MemoryError> {
        self.core.replace_config(MemoryProvider::Mem0, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::PageMetadata;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page() -> WebPageContent {
        WebPageContent {
            url: "https://example.com/post".to_string(),
            title: "Post".to_string(),
            content: "Some content".to_string(),
            timestamp: 42,
            domain: "example.com".to_string(),
            metadata: PageMetadata::default(),
        }
    }

    async fn connected_adapter(server: &MockServer) -> Mem0Adapter {
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;

        let config = MemoryConfig {
            endpoint: server.uri(),
            ..MemoryConfig::default()
        };
        let mut adapter = Mem0Adapter::new(config).unwrap();
        adapter.connect().await.unwrap();
        adapter
    }

    #[tokio::test]
    async fn test_save_posts_wrapped_memory() {
        let server = MockServer::start().await;
        let adapter = connected_adapter(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/memories"))
            .and(body_partial_json(json!({
                "memories": [{
                    "id": record_id("https://example.com/post"),
                    "content": "Some content",
                    "metadata": { "url": "https://example.com/post", "collection": "browser-context" }
                }]
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        adapter.save(&page()).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_maps_memories() {
        let server = MockServer::start().await;
        let adapter = connected_adapter(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/memories/search"))
            .and(query_param("query", "rust"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "memories": [
                    { "id": "1", "content": "Rust text", "metadata": { "url": "https://rust-lang.org/", "title": "Rust" } },
                    { "id": "2", "content": "orphan" }
                ]
            })))
            .mount(&server)
            .await;

        let results = adapter.search("rust", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Rust");
        assert_eq!(results[0].content, "Rust text");
        assert_eq!(results[0].domain, "rust-lang.org");
    }

    #[tokio::test]
    async fn test_unexpected_shapes_degrade() {
        let server = MockServer::start().await;
        let adapter = connected_adapter(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/memories/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": "nope"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["odd"])))
            .mount(&server)
            .await;

        assert!(adapter.search("x", 10).await.unwrap().is_empty());
        assert_eq!(adapter.get_stats().await.unwrap(), MemoryStats::default());
    }

    #[tokio::test]
    async fn test_errors_are_operation_qualified() {
        let server = MockServer::start().await;
        let adapter = connected_adapter(&server).await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = adapter.delete("https://example.com/post").await.unwrap_err();
        assert!(err.to_string().starts_with("delete failed: "), "{}", err);
        assert!(err.to_string().contains("boom"));

        let err = adapter.clear().await.unwrap_err();
        assert!(err.to_string().starts_with("clear failed: "));
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let adapter = Mem0Adapter::new(MemoryConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            ..MemoryConfig::default()
        })
        .unwrap();

        assert!(!adapter.is_connected());
        let err = adapter.save(&page()).await.unwrap_err();
        assert_eq!(err.to_string(), "save failed: adapter is not connected");
    }

    #[tokio::test]
    async fn test_connect_failure_is_qualified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut adapter = Mem0Adapter::new(MemoryConfig {
            endpoint: server.uri(),
            ..MemoryConfig::default()
        })
        .unwrap();
        assert!(!adapter.test_connection().await);
        let err = adapter.connect().await.unwrap_err();
        assert!(err.to_string().starts_with("connect failed: "));
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn test_update_config_requires_reconnect() {
        let server = MockServer::start().await;
        let mut adapter = connected_adapter(&server).await;
        assert!(adapter.validate_config());

        let bad = MemoryConfig {
            endpoint: String::new(),
            ..MemoryConfig::default()
        };
        assert!(adapter.update_config(bad).is_err());
        assert!(adapter.is_connected());

        let other_provider = MemoryConfig {
            provider: "zep".to_string(),
            endpoint: server.uri(),
            ..MemoryConfig::default()
        };
        assert!(adapter.update_config(other_provider).is_err());

        let moved = MemoryConfig {
            endpoint: "http://localhost:1".to_string(),
            ..MemoryConfig::default()
        };
        adapter.update_config(moved).unwrap();
        assert!(!adapter.is_connected());
        assert_eq!(adapter.config().endpoint, "http://localhost:1");
    }
}
