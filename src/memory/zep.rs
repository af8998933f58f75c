use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::config::{MemoryConfig, MemoryProvider};
use crate::error::MemoryError;
use crate::memory::http::HttpError;
use crate::memory::{
    AdapterCore, MemoryAdapter, MemoryStats, array_field, op_error, page_from_parts,
    record_metadata, str_field,
};
use crate::results::WebPageContent;
use crate::utils;

const SESSION_PREFIX: &str = "browser-";

/// Session id holding the pages of one domain
pub fn session_id(domain: &str) -> String {
    let slug: String = domain
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    if slug.is_empty() {
        format!("{}unknown", SESSION_PREFIX)
    } else {
        format!("{}{}", SESSION_PREFIX, slug)
    }
}

/// Adapter for Zep-style session stores: each page becomes a message in the
/// session of its domain, sessions are created on first use
pub struct ZepAdapter {
    core: AdapterCore,
    known_sessions: Mutex<HashSet<String>>,
}

impl ZepAdapter {
    pub fn new(config: MemoryConfig) -> Result<Self, MemoryError> {
        Ok(Self {
            core: AdapterCore::new(config)?,
            known_sessions: Mutex::new(HashSet::new()),
        })
    }

    /// Make sure the session exists, creating it when the probe returns 404.
    /// The cache lock is not held across requests, so saves to other domains
    /// never wait on a slow probe. A concurrent create shows up as 409.
    async fn ensure_session(&self, session: &str, domain: &str) -> Result<(), HttpError> {
        if self.known_sessions.lock().await.contains(session) {
            return Ok(());
        }

        let probe = self
            .core
            .client
            .get(&format!("api/v1/sessions/{}", session), &[])
            .await;

        match probe {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                ::log::debug!("Creating Zep session {}", session);
                let created = self
                    .core
                    .client
                    .post(
                        "api/v1/sessions",
                        &json!({
                            "session_id": session,
                            "metadata": {
                                "domain": domain,
                                "collection": self.core.config.collection(),
                            }
                        }),
                    )
                    .await;
                match created {
                    Ok(_) => {}
                    Err(e) if e.is_conflict() => {
                        ::log::debug!("Zep session {} already exists", session);
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }

        self.known_sessions.lock().await.insert(session.to_string());
        Ok(())
    }

    /// Our sessions, from a response that is either a bare array or `{"sessions": [...]}`
    async fn list_sessions(&self) -> Result<Vec<Value>, HttpError> {
        let response = self.core.client.get("api/v1/sessions", &[]).await?;
        let sessions = match &response {
            Value::Array(items) => items.as_slice(),
            other => array_field(other, "sessions"),
        };

        Ok(sessions
            .iter()
            .filter(|s| str_field(s, "session_id").starts_with(SESSION_PREFIX))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MemoryAdapter for ZepAdapter {
    fn provider(&self) -> MemoryProvider {
        MemoryProvider::Zep
    }

    async fn connect(&mut self) -> Result<(), MemoryError> {
        self.core
            .client
            .get("healthz", &[])
            .await
            .map_err(op_error("connect"))?;
        self.core.connected = true;
        ::log::info!("Connected to Zep at {}", self.core.client.endpoint());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MemoryError> {
        self.core.connected = false;
        self.known_sessions.lock().await.clear();
        Ok(())
    }

    async fn save(&self, content: &WebPageContent) -> Result<(), MemoryError> {
        self.core.ensure_connected("save")?;
        let session = session_id(&content.domain);
        self.ensure_session(&session, &content.domain)
            .await
            .map_err(op_error("save"))?;

        let body = json!({
            "messages": [{
                "role": "user",
                "role_type": "user",
                "content": content.content,
                "metadata": record_metadata(content),
            }]
        });
        self.core
            .client
            .post(&format!("api/v1/sessions/{}/memory", session), &body)
            .await
            .map_err(op_error("save"))?;
        ::log::debug!("Saved {} to Zep session {}", content.url, session);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebPageContent>, MemoryError> {
        self.core.ensure_connected("search")?;
        let response = self
            .core
            .client
            .post_with_query(
                "api/v1/sessions/search",
                &[("limit", limit.to_string())],
                &json!({ "text": query }),
            )
            .await
            .map_err(op_error("search"))?;

        Ok(array_field(&response, "results")
            .iter()
            .filter_map(|result| {
                let message = result.get("message")?;
                let metadata = message.get("metadata").unwrap_or(&Value::Null);
                page_from_parts(message.get("content").and_then(Value::as_str), metadata)
            })
            .take(limit)
            .collect())
    }

    async fn delete(&self, url: &str) -> Result<(), MemoryError> {
        self.core.ensure_connected("delete")?;
        let session = session_id(&utils::domain_of(url));

        let response = match self
            .core
            .client
            .get(&format!("api/v1/sessions/{}/messages", session), &[])
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(op_error("delete")(e)),
        };

        let matching: Vec<String> = array_field(&response, "messages")
            .iter()
            .filter(|m| {
                m.get("metadata")
                    .and_then(|meta| meta.get("url"))
                    .and_then(Value::as_str)
                    == Some(url)
            })
            .map(|m| str_field(m, "uuid"))
            .filter(|uuid| !uuid.is_empty())
            .collect();

        for uuid in &matching {
            self.core
                .client
                .delete(&format!("api/v1/sessions/{}/messages/{}", session, uuid), &[])
                .await
                .map_err(op_error("delete"))?;
        }
        ::log::debug!("Deleted {} Zep messages for {}", matching.len(), url);
        Ok(())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.core.ensure_connected("clear")?;
        let sessions = self.list_sessions().await.map_err(op_error("clear"))?;

        for session in &sessions {
            let id = str_field(session, "session_id");
            self.core
                .client
                .delete(&format!("api/v1/sessions/{}", id), &[])
                .await
                .map_err(op_error("clear"))?;
        }
        self.known_sessions.lock().await.clear();
        Ok(())
    }

    async fn get_stats(&self) -> Result<MemoryStats, MemoryError> {
        self.core.ensure_connected("getStats")?;
        let sessions = self.list_sessions().await.map_err(op_error("getStats"))?;

        let total = sessions
            .iter()
            .map(|s| match s.get("message_count").and_then(Value::as_u64) {
                Some(count) => count,
                None => {
                    ::log::warn!(
                        "Zep session {} reports no message_count, counting 0",
                        s.get("session_id").and_then(Value::as_str).unwrap_or("?")
                    );
                    0
                }
            })
            .sum();
        let last_updated = sessions
            .iter()
            .filter_map(|s| s.get("updated_at").and_then(Value::as_str))
            .filter_map(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.timestamp_millis())
            .max();

        Ok(MemoryStats {
            total,
            last_updated,
        })
    }

    async fn test_connection(&self) -> bool {
        match self.core.client.get("healthz", &[]).await {
            Ok(_) => true,
            Err(e) => {
                ::log::warn!("Zep connection test failed: {}", e);
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
        self.core.replace_config(MemoryProvider::Zep, config)?;
        self.known_sessions.get_mut().clear();
        Ok(())
    }
}
