use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{MemoryError, ScheduleError};
use crate::scheduler::TimeWindow;
use crate::sensitive::SensitiveFilter;

/// Collection name used when a memory config does not set `options.collection`
pub const DEFAULT_COLLECTION: &str = "browser-context";

/// Errors raised while loading a configuration document
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Days and time-of-day window during which scraping is allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Window start as `HH:MM`
    pub start_time: String,

    /// Window end as `HH:MM`; earlier than `start_time` means the window crosses midnight
    pub end_time: String,

    /// Weekdays, 0 = Sunday through 6 = Saturday
    #[serde(default)]
    pub days: Vec<u8>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start_time: "09:00".to_string(),
            end_time: "18:00".to_string(),
            days: vec![1, 2, 3, 4, 5],
        }
    }
}

impl ScheduleConfig {
    pub fn new(start_time: &str, end_time: &str, days: impl IntoIterator<Item = u8>) -> Self {
        Self {
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            days: days.into_iter().collect(),
        }
    }

    /// Check the times and days without building a scheduler
    pub fn validate(&self) -> Result<(), ScheduleError> {
        TimeWindow::from_config(self).map(|_| ())
    }
}

/// Settings for sensitive information redaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveFilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Regular expressions, compiled case-insensitively
    #[serde(default, deserialize_with = "lenient_patterns")]
    pub patterns: Vec<String>,

    #[serde(default = "default_replacement")]
    pub replacement: String,
}

impl Default for SensitiveFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: SensitiveFilter::default_patterns(),
            replacement: default_replacement(),
        }
    }
}

/// Everything the collector needs to decide what to scrape and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// URL patterns that must never be scraped
    #[serde(default, deserialize_with = "lenient_patterns")]
    pub blacklist: Vec<String>,

    #[serde(default)]
    pub sensitive_filters: SensitiveFilterConfig,

    /// Maximum number of characters kept from a page's content
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Pause between two consecutive pages, in milliseconds
    #[serde(default = "default_delay_between_pages")]
    pub delay_between_pages: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: ScheduleConfig::default(),
            blacklist: Vec::new(),
            sensitive_filters: SensitiveFilterConfig::default(),
            max_content_length: default_max_content_length(),
            delay_between_pages: default_delay_between_pages(),
        }
    }
}

/// Supported memory backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryProvider {
    Mem0,
    Zep,
    Letta,
    VectorDb,
}

impl MemoryProvider {
    pub const ALL: [MemoryProvider; 4] = [
        MemoryProvider::Mem0,
        MemoryProvider::Zep,
        MemoryProvider::Letta,
        MemoryProvider::VectorDb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryProvider::Mem0 => "mem0",
            MemoryProvider::Zep => "zep",
            MemoryProvider::Letta => "letta",
            MemoryProvider::VectorDb => "vector_db",
        }
    }
}

impl fmt::Display for MemoryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryProvider {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemoryProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| MemoryError::UnsupportedProvider(s.to_string()))
    }
}

/// Connection settings for a memory backend.
///
/// `provider` is kept as the raw string so an unknown name can be reported
/// back verbatim by the factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    pub provider: String,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider specific options (`collection`, and for vector_db
    /// `provider`, `dimension`, `distanceMetric`)
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        let mut options = Map::new();
        options.insert("collection".to_string(), Value::from(DEFAULT_COLLECTION));
        Self {
            provider: MemoryProvider::Mem0.as_str().to_string(),
            endpoint: String::new(),
            api_key: None,
            options,
        }
    }
}

impl MemoryConfig {
    pub fn provider_kind(&self) -> Result<MemoryProvider, MemoryError> {
        self.provider.parse()
    }

    /// String option, ignoring blank values
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn option_u64(&self, key: &str) -> Option<u64> {
        self.options.get(key).and_then(Value::as_u64)
    }

    pub fn collection(&self) -> &str {
        self.option_str("collection").unwrap_or(DEFAULT_COLLECTION)
    }

    /// API key, ignoring blank values
    pub fn bearer_token(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Running totals kept by the collector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStats {
    #[serde(default)]
    pub total_pages_scraped: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scraped_at: Option<i64>,

    #[serde(default)]
    pub errors: u64,
}

/// Full state owned by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginState {
    #[serde(default)]
    pub is_active: bool,

    #[serde(default)]
    pub current_config: ScrapingConfig,

    #[serde(default)]
    pub memory_config: MemoryConfig,

    #[serde(default)]
    pub stats: PluginStats,
}

impl Default for PluginState {
    fn default() -> Self {
        Self {
            is_active: false,
            current_config: ScrapingConfig::default(),
            memory_config: MemoryConfig::default(),
            stats: PluginStats::default(),
        }
    }
}

impl PluginState {
    /// Load state from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load state from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Deserialize a pattern list, dropping non-string and blank entries
fn lenient_patterns<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            other => {
                ::log::warn!("Ignoring invalid pattern entry: {}", other);
                None
            }
        })
        .collect())
}

fn default_true() -> bool {
    true
}

fn default_replacement() -> String {
    "[FILTERED]".to_string()
}

fn default_max_content_length() -> usize {
    50_000
}

fn default_delay_between_pages() -> u64 {
    1_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_scraping_config_defaults_from_empty_object() {
        let config: ScrapingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ScrapingConfig::default());
        assert!(config.sensitive_filters.enabled);
        assert_eq!(config.sensitive_filters.replacement, "[FILTERED]");
        assert!(!config.sensitive_filters.patterns.is_empty());
    }

    #[test]
    fn test_pattern_lists_drop_invalid_entries() {
        let json = r#"{
            "blacklist": ["*.bank.com", 42, "", "   ", null, "/admin"],
            "sensitiveFilters": { "patterns": ["\\d+", false] }
        }"#;
        let config: ScrapingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.blacklist, vec!["*.bank.com", "/admin"]);
        assert_eq!(config.sensitive_filters.patterns, vec![r"\d+"]);
    }

    #[test]
    fn test_schedule_config_camel_case() {
        let json = r#"{"startTime": "22:00", "endTime": "06:00", "days": [1, 2]}"#;
        let schedule: ScheduleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(schedule, ScheduleConfig::new("22:00", "06:00", [1, 2]));
        assert!(schedule.validate().is_ok());
        assert!(ScheduleConfig::new("25:00", "06:00", [1]).validate().is_err());
    }

    #[test]
    fn test_memory_provider_parsing() {
        assert_eq!("vector_db".parse::<MemoryProvider>(), Ok(MemoryProvider::VectorDb));
        assert_eq!(
            "pinecone".parse::<MemoryProvider>(),
            Err(MemoryError::UnsupportedProvider("pinecone".to_string()))
        );
        for provider in MemoryProvider::ALL {
            assert_eq!(provider.as_str().parse::<MemoryProvider>(), Ok(provider));
        }
    }

    #[test]
    fn test_memory_config_options() {
        let json = r#"{
            "provider": "vector_db",
            "endpoint": "http://localhost:6333",
            "apiKey": "  ",
            "options": { "provider": "qdrant", "dimension": 768 }
        }"#;
        let config: MemoryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.option_str("provider"), Some("qdrant"));
        assert_eq!(config.option_u64("dimension"), Some(768));
        assert_eq!(config.collection(), DEFAULT_COLLECTION);
        assert_eq!(config.bearer_token(), None);
    }

    #[test]
    fn test_plugin_state_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "isActive": true,
                "currentConfig": {{ "maxContentLength": 100, "blacklist": [".internal"] }},
                "memoryConfig": {{ "provider": "zep", "endpoint": "http://zep:8000" }},
                "stats": {{ "totalPagesScraped": 3, "errors": 1 }}
            }}"#
        )
        .unwrap();

        let state = PluginState::from_file(file.path()).unwrap();
        assert!(state.is_active);
        assert_eq!(state.current_config.max_content_length, 100);
        assert_eq!(state.current_config.blacklist, vec![".internal"]);
        assert_eq!(state.memory_config.provider, "zep");
        assert_eq!(state.stats.total_pages_scraped, 3);
        assert_eq!(state.stats.last_scraped_at, None);
    }

    #[test]
    fn test_plugin_state_from_missing_file() {
        let err = PluginState::from_file("/nonexistent/page-recall.json").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Io(_)));
    }
}
