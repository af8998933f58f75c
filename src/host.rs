//! Messaging and settings capability provided by whatever hosts the collector
//! (a browser extension, the command line, a test).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{RwLock, broadcast};

/// Buffered messages per subscriber before the oldest are dropped
const CHANNEL_CAPACITY: usize = 64;

/// Why a page was not stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SkipReason {
    /// Scraping is switched off in the configuration
    Disabled,
    Blacklisted { pattern: String },
    /// The page produced no usable text
    NothingExtracted,
    Unreadable { message: String },
}

/// Notifications published by the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    #[serde(rename_all = "camelCase")]
    PageSaved {
        url: String,
        title: String,
        timestamp: i64,
    },
    PageSkipped { url: String, reason: SkipReason },
    Error { url: Option<String>, message: String },
}

#[async_trait]
pub trait HostMessaging: Send + Sync {
    /// Publish a message. Never fails, even without listeners.
    fn send_message(&self, message: HostMessage);

    /// Subscribe to messages sent from now on
    fn on_message(&self) -> broadcast::Receiver<HostMessage>;

    async fn get_setting(&self, key: &str) -> Option<Value>;

    async fn set_setting(&self, key: &str, value: Value);
}

/// In-process host: a broadcast channel and an in-memory settings map
pub struct LocalHost {
    sender: broadcast::Sender<HostMessage>,
    settings: RwLock<Map<String, Value>>,
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHost {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            settings: RwLock::new(Map::new()),
        }
    }

    /// Copy of every stored setting
    pub async fn settings(&self) -> Map<String, Value> {
        self.settings.read().await.clone()
    }
}

#[async_trait]
impl HostMessaging for LocalHost {
    fn send_message(&self, message: HostMessage) {
        ::log::trace!("Host message: {:?}", message);
        // An error only means nobody is subscribed
        let _ = self.sender.send(message);
    }

    fn on_message(&self) -> broadcast::Receiver<HostMessage> {
        self.sender.subscribe()
    }

    async fn get_setting(&self, key: &str) -> Option<Value> {
        self.settings.read().await.get(key).cloned()
    }

    async fn set_setting(&self, key: &str, value: Value) {
        self.settings.write().await.insert(key.to_string(), value);
    }
}
