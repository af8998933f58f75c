//! JSON-over-HTTP client shared by the memory adapters.
//!
//! Every request carries `Authorization: Bearer <key>` when an API key is
//! configured and is bounded by a fixed 30 second timeout. Requests are never
//! retried; retry policy belongs to the caller.

use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::MemoryConfig;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body excerpt kept in error messages
const BODY_SNIPPET_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, HttpError::Status { status, .. } if *status == StatusCode::CONFLICT)
    }
}

/// Client bound to one endpoint and API key
#[derive(Debug, Clone)]
pub struct MemoryHttpClient {
    inner: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl MemoryHttpClient {
    pub fn new(config: &MemoryConfig) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self {
            inner,
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.bearer_token().map(str::to_string),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Join the endpoint and a relative path
    pub fn url(&self, path: &str) -> Result<Url, HttpError> {
        if self.endpoint.is_empty() {
            return Err(HttpError::Url("endpoint is not configured".to_string()));
        }
        let joined = format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| HttpError::Url(format!("{}: {}", joined, e)))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, HttpError> {
        self.request::<()>(Method::GET, path, query, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, HttpError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn post_with_query<B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<Value, HttpError> {
        self.request(Method::POST, path, query, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, HttpError> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<Value, HttpError> {
        self.request::<()>(Method::DELETE, path, query, None).await
    }

    /// Send a request and decode the JSON body. Empty or non-JSON bodies of
    /// successful responses decode to `Value::Null`.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Value, HttpError> {
        let url = self.url(path)?;
        ::log::debug!("{} {}", method, url);

        let mut rb = self.inner.request(method.clone(), url.clone());
        if !query.is_empty() {
            rb = rb.query(query);
        }
        if let Some(key) = &self.api_key {
            rb = rb.bearer_auth(key);
        }
        if let Some(body) = body {
            rb = rb.json(body);
        }

        let response = rb.send().await.map_err(|e| {
            let kind = if e.is_timeout() { "timed out" } else { "failed" };
            HttpError::Network(format!("{} {} {}: {}", method, url.path(), kind, e))
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        if !status.is_success() {
            ::log::debug!("{} {} returned {}", method, url.path(), status);
            return Err(HttpError::Status {
                status,
                message: snippet(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                ::log::warn!(
                    "{} {} returned a non-JSON body ({}): {}",
                    method,
                    url.path(),
                    e,
                    snippet(&text)
                );
                Ok(Value::Null)
            }
        }
    }
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "empty response".to_string();
    }
    crate::utils::truncate_chars(trimmed, BODY_SNIPPET_LEN)
}
