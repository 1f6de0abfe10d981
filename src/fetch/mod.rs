//! Boundary to the outside world: fetching one item and storing its payload
//!
//! The orchestrator only knows these traits. Provider clients and payload
//! storage are plugged in per use case ("game detail", "review counts",
//! "prices"); [`HttpFetcher`] and [`DirectorySink`] are the built-in ones
//! used by the binary.

pub mod http;
pub mod sink;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::item::ItemId;

pub use http::{HttpConfig, HttpFetcher};
pub use sink::DirectorySink;

/// Failure of a single fetch attempt
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Provider asked to try again: {0}")]
    TryAgain(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Payload sink failed: {0}")]
    Sink(String),
}

impl FetchError {
    /// Cooldown requested by the provider, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether the provider signalled that we are calling too fast
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::Http { status: 429, .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rejected payload: {0}")]
    Rejected(String),
}

impl From<SinkError> for FetchError {
    fn from(value: SinkError) -> Self {
        FetchError::Sink(value.to_string())
    }
}

/// Fetches one item from an external provider
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Payload: Send + 'static;

    /// Rate-limit key of the provider behind this fetcher
    fn provider(&self) -> &str;

    async fn fetch(&self, id: &ItemId) -> Result<Self::Payload, FetchError>;
}

/// Stores a fetched payload. A failure here counts as a transient
/// failure of the item.
#[async_trait]
pub trait PayloadSink<P: Send + 'static>: Send + Sync {
    async fn store(&self, id: &ItemId, payload: P) -> Result<(), SinkError>;
}
