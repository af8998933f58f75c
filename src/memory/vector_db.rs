use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::config::{MemoryConfig, MemoryProvider};
use crate::error::MemoryError;
use crate::memory::embedding::{Embedder, HashEmbedder};
use crate::memory::http::HttpError;
use crate::memory::{
    AdapterCore, MemoryAdapter, MemoryStats, array_field, op_error, page_from_parts, record_id,
    record_metadata,
};
use crate::results::WebPageContent;

pub const DEFAULT_DIMENSION: usize = 1536;
pub const DEFAULT_DISTANCE_METRIC: &str = "cosine";

/// Adapter for vector stores. Each page is one point whose metadata carries
/// the text, since the store keeps no separate document body.
pub struct VectorDbAdapter {
    core: AdapterCore,
    embedder: Arc<dyn Embedder>,
    /// The embedder is the built-in placeholder, sized from the config
    default_embedder: bool,
}

impl VectorDbAdapter {
    /// Adapter using the placeholder [`HashEmbedder`]
    pub fn new(config: MemoryConfig) -> Result<Self, MemoryError> {
        let embedder = Arc::new(HashEmbedder::new(dimension_of(&config)));
        Ok(Self {
            core: AdapterCore::new(config)?,
            embedder,
            default_embedder: true,
        })
    }

    pub fn with_embedder(config: MemoryConfig, embedder: Arc<dyn Embedder>) -> Result<Self, MemoryError> {
        Ok(Self {
            core: AdapterCore::new(config)?,
            embedder,
            default_embedder: false,
        })
    }

    fn collection_path(&self, suffix: &str) -> String {
        let collection = self.core.config.collection();
        if suffix.is_empty() {
            format!("collections/{}", collection)
        } else {
            format!("collections/{}/{}", collection, suffix)
        }
    }

    fn metric(&self) -> &str {
        self.core
            .config
            .option_str("distanceMetric")
            .unwrap_or(DEFAULT_DISTANCE_METRIC)
    }

    async fn create_collection(&self) -> Result<(), HttpError> {
        let body = json!({
            "name": self.core.config.collection(),
            "dimension": self.embedder.dimension(),
            "metric": self.metric(),
            "backend": self.core.config.option_str("provider"),
        });
        self.core.client.post("collections", &body).await?;
        ::log::info!(
            "Created vector collection {} ({} dims, {})",
            self.core.config.collection(),
            self.embedder.dimension(),
            self.metric()
        );
        Ok(())
    }

    async fn ensure_collection(&self) -> Result<(), HttpError> {
        match self.core.client.get(&self.collection_path(""), &[]).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => self.create_collection().await,
            Err(e) => Err(e),
        }
    }
}

fn dimension_of(config: &MemoryConfig) -> usize {
    config
        .option_u64("dimension")
        .and_then(|d| usize::try_from(d).ok())
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_DIMENSION)
}

#[async_trait]
impl MemoryAdapter for VectorDbAdapter {
    fn provider(&self) -> MemoryProvider {
        MemoryProvider::VectorDb
    }

    async fn connect(&mut self) -> Result<(), MemoryError> {
        self.ensure_collection().await.map_err(op_error("connect"))?;
        self.core.connected = true;
        ::log::info!(
            "Connected to vector store at {} (collection {})",
            self.core.client.endpoint(),
            self.core.config.collection()
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MemoryError> {
        self.core.connected = false;
        Ok(())
    }

    async fn save(&self, content: &WebPageContent) -> Result<(), MemoryError> {
        self.core.ensure_connected("save")?;
        let vector = self
            .embedder
            .embed(&content.content)
            .await
            .map_err(|e| MemoryError::operation("save", e))?;

        let mut metadata = record_metadata(content);
        metadata["content"] = Value::from(content.content.as_str());

        let body = json!({
            "points": [{
                "id": record_id(&content.url),
                "vector": vector,
                "metadata": metadata,
            }]
        });
        self.core
            .client
            .post(&self.collection_path("upsert"), &body)
            .await
            .map_err(op_error("save"))?;
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebPageContent>, MemoryError> {
        self.core.ensure_connected("search")?;
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| MemoryError::operation("search", e))?;

        let body = json!({
            "vector": vector,
            "top_k": limit,
            "include_metadata": true,
        });
        let response = self
            .core
            .client
            .post(&self.collection_path("query"), &body)
            .await
            .map_err(op_error("search"))?;

        Ok(array_field(&response, "matches")
            .iter()
            .filter_map(|m| page_from_parts(None, m.get("metadata").unwrap_or(&Value::Null)))
            .take(limit)
            .collect())
    }

    async fn delete(&self, url: &str) -> Result<(), MemoryError> {
        self.core.ensure_connected("delete")?;
        self.core
            .client
            .post(&self.collection_path("delete"), &json!({ "ids": [record_id(url)] }))
            .await
            .map_err(op_error("delete"))?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.core.ensure_connected("clear")?;
        match self.core.client.delete(&self.collection_path(""), &[]).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(op_error("clear")(e)),
        }
        self.create_collection().await.map_err(op_error("clear"))
    }

    async fn get_stats(&self) -> Result<MemoryStats, MemoryError> {
        self.core.ensure_connected("getStats")?;
        let response = self
            .core
            .client
            .get(&self.collection_path(""), &[])
            .await
            .map_err(op_error("getStats"))?;

        let total = response
            .get("vector_count")
            .or_else(|| response.get("vectorCount"))
            .and_then(Value::as_u64)
            .unwrap_or_default();
        Ok(MemoryStats {
            total,
            last_updated: response.get("updated_at").and_then(Value::as_i64),
        })
    }

    /// A missing collection still means the store answered
    async fn test_connection(&self) -> bool {
        match self.core.client.get(&self.collection_path(""), &[]).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => true,
            Err(e) => {
                ::log::warn!("Vector store connection test failed: {}", e);
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
        self.core.replace_config(MemoryProvider::VectorDb, config)?;
        if self.default_embedder {
            self.embedder = Arc::new(HashEmbedder::new(dimension_of(&self.core.config)));
        }
        Ok(())
    }
}
