use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::{DEFAULT_COLLECTION, MemoryConfig, MemoryProvider};
use crate::error::MemoryError;
use crate::memory::embedding::Embedder;
use crate::memory::letta::LettaAdapter;
use crate::memory::mem0::Mem0Adapter;
use crate::memory::vector_db::{DEFAULT_DIMENSION, DEFAULT_DISTANCE_METRIC, VectorDbAdapter};
use crate::memory::zep::ZepAdapter;
use crate::memory::MemoryAdapter;

/// Outcome of [`MemoryAdapterFactory::validate_config`]: every violated rule, not just the first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

pub struct MemoryAdapterFactory;

impl MemoryAdapterFactory {
    /// Build the adapter for `config.provider`. The adapter is not connected yet.
    pub fn create_adapter(config: &MemoryConfig) -> Result<Box<dyn MemoryAdapter>, MemoryError> {
        let adapter: Box<dyn MemoryAdapter> = match config.provider_kind()? {
            MemoryProvider::Mem0 => Box::new(Mem0Adapter::new(config.clone())?),
            MemoryProvider::Zep => Box::new(ZepAdapter::new(config.clone())?),
            MemoryProvider::Letta => Box::new(LettaAdapter::new(config.clone())?),
            MemoryProvider::VectorDb => Box::new(VectorDbAdapter::new(config.clone())?),
        };
        ::log::debug!("Created {} adapter for {}", adapter.provider(), config.endpoint);
        Ok(adapter)
    }

    /// Vector store adapter with a caller-supplied embedding capability
    pub fn create_vector_adapter_with_embedder(
        config: &MemoryConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Box<dyn MemoryAdapter>, MemoryError> {
        match config.provider_kind()? {
            MemoryProvider::VectorDb => Ok(Box::new(VectorDbAdapter::with_embedder(
                config.clone(),
                embedder,
            )?)),
            other => Err(MemoryError::InvalidConfig(vec![format!(
                "an embedder only applies to vector_db, not {}",
                other
            )])),
        }
    }

    pub fn validate_config(config: &MemoryConfig) -> ValidationReport {
        let mut errors = Vec::new();

        let provider = match config.provider_kind() {
            Ok(provider) => Some(provider),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };

        if config.endpoint.trim().is_empty() {
            errors.push("endpoint is required".to_string());
        }

        if provider == Some(MemoryProvider::VectorDb) && config.option_str("provider").is_none() {
            errors.push("options.provider is required for vector_db".to_string());
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Config skeleton for a provider, endpoint left empty
    pub fn default_config(provider: MemoryProvider) -> MemoryConfig {
        let mut options = Map::new();
        options.insert("collection".to_string(), Value::from(DEFAULT_COLLECTION));
        if provider == MemoryProvider::VectorDb {
            options.insert("dimension".to_string(), Value::from(DEFAULT_DIMENSION));
            options.insert(
                "distanceMetric".to_string(),
                Value::from(DEFAULT_DISTANCE_METRIC),
            );
        }

        MemoryConfig {
            provider: provider.as_str().to_string(),
            endpoint: String::new(),
            api_key: None,
            options,
        }
    }
}
