use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::{MemoryConfig, MemoryProvider};
use crate::error::MemoryError;
use crate::memory::{
    AdapterCore, MemoryAdapter, MemoryStats, array_field, op_error, page_from_parts, record_id,
    record_metadata, stats_from_value,
};
use crate::results::WebPageContent;

/// Adapter for Letta-style document archives. Documents are upserted by id
/// and scoped to the configured collection through a `source` field.
pub struct LettaAdapter {
    core: AdapterCore,
}

impl LettaAdapter {
    pub fn new(config: MemoryConfig) -> Result<Self, MemoryError> {
        Ok(Self {
            core: AdapterCore::new(config)?,
        })
    }

    fn source(&self) -> String {
        self.core.config.collection().to_string()
    }
}

#[async_trait]
impl MemoryAdapter for LettaAdapter {
    fn provider(&self) -> MemoryProvider {
        MemoryProvider::Letta
    }

    async fn connect(&mut self) -> Result<(), MemoryError> {
        self.core
            .client
            .get("v1/health", &[])
            .await
            .map_err(op_error("connect"))?;
        self.core.connected = true;
        ::log::info!("Connected to Letta at {}", self.core.client.endpoint());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MemoryError> {
        self.core.connected = false;
        Ok(())
    }

    async fn save(&self, content: &WebPageContent) -> Result<(), MemoryError> {
        self.core.ensure_connected("save")?;
        let id = record_id(&content.url);
        let body = json!({
            "id": id,
            "text": content.content,
            "source": self.source(),
            "metadata": record_metadata(content),
        });

        self.core
            .client
            .put(&format!("v1/documents/{}", id), &body)
            .await
            .map_err(op_error("save"))?;
        ::log::debug!("Saved {} to Letta source {}", content.url, self.source());
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebPageContent>, MemoryError> {
        self.core.ensure_connected("search")?;
        let body = json!({
            "query": query,
            "limit": limit,
            "source": self.source(),
        });
        let response = self
            .core
            .client
            .post("v1/documents/search", &body)
            .await
            .map_err(op_error("search"))?;

        Ok(array_field(&response, "documents")
            .iter()
            .filter_map(|doc| {
                let metadata = doc.get("metadata").unwrap_or(&Value::Null);
                page_from_parts(doc.get("text").and_then(Value::as_str), metadata)
            })
            .take(limit)
            .collect())
    }

    async fn delete(&self, url: &str) -> Result<(), MemoryError> {
        self.core.ensure_connected("delete")?;
        match self
            .core
            .client
            .delete(&format!("v1/documents/{}", record_id(url)), &[])
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                ::log::debug!("No Letta document stored for {}", url);
                Ok(())
            }
            Err(e) => Err(op_error("delete")(e)),
        }
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.core.ensure_connected("clear")?;
        self.core
            .client
            .delete("v1/documents", &[("source", self.source())])
            .await
            .map_err(op_error("clear"))?;
        Ok(())
    }

    async fn get_stats(&self) -> Result<MemoryStats, MemoryError> {
        self.core.ensure_connected("getStats")?;
        let response = self
            .core
            .client
            .get("v1/documents/stats", &[("source", self.source())])
            .await
            .map_err(op_error("getStats"))?;
        Ok(stats_from_value(
            &response,
            &["total", "document_count", "count"],
            &["last_updated", "updated_at"],
        ))
    }

    async fn test_connection(&self) -> bool {
        match self.core.client.get("v1/health", &[]).await {
            Ok(_) => true,
            Err(e) => {
                ::log::warn!("Letta connection test failed: {}", e);
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
        self.core.replace_config(MemoryProvider::Letta, config)
    }
}
