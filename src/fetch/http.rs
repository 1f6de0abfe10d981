//! HTTP fetcher for JSON catalog endpoints

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{FetchError, Fetcher};
use crate::item::ItemId;

const ID_PLACEHOLDER: &str = "{id}";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: "fetchledger/0.1.0".to_string(),
        }
    }
}

/// Fetches `url_template` with `{id}` replaced by the item id
///
/// Does exactly one request per call; retrying is the orchestrator's job.
pub struct HttpFetcher {
    client: Client,
    provider: String,
    url_template: String,
    headers: Vec<(String, String)>,
}

impl HttpFetcher {
    pub fn new(
        provider: impl Into<String>,
        url_template: impl Into<String>,
        config: HttpConfig,
    ) -> Result<Self, FetchError> {
        let url_template = url_template.into();
        if !url_template.contains(ID_PLACEHOLDER) {
            return Err(FetchError::MalformedRequest(format!(
                "URL template has no {} placeholder: {}",
                ID_PLACEHOLDER, url_template
            )));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::MalformedRequest(e.to_string()))?;

        Ok(Self {
            client,
            provider: provider.into(),
            url_template,
            headers: Vec::new(),
        })
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url_for(&self, id: &ItemId) -> String {
        self.url_template.replace(ID_PLACEHOLDER, id.as_str())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    type Payload = Bytes;

    fn provider(&self) -> &str {
        &self.provider
    }

    async fn fetch(&self, id: &ItemId) -> Result<Bytes, FetchError> {
        let url = self.url_for(id);
        debug!(item_id = %id, url, "Fetching");

        let mut request = self.client.get(&url);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else if e.is_builder() {
                FetchError::MalformedRequest(e.to_string())
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        if let Some(err) = error_for_status(response.status(), response.headers()) {
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(format!("Failed to read body: {}", e))
            }
        })?;

        debug!(item_id = %id, size = bytes.len(), "Fetch completed");
        Ok(bytes)
    }
}

/// Map a non-success status to a fetch error
pub fn error_for_status(status: StatusCode, headers: &HeaderMap) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Some(FetchError::RateLimited { retry_after });
    }

    Some(FetchError::Http {
        status: status.as_u16(),
        message: status.canonical_reason().unwrap_or("Unknown").to_string(),
    })
}
