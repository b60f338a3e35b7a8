//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{EnrichmentRequest, FeedPage};

/// Error type for post source operations
#[derive(Debug, Error)]
pub enum PostSourceError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<std::time::Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
}

/// Port for reading an account's feed one page at a time
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch one page of the account's posts, newest first
    async fn fetch_page(
        &self,
        account: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<FeedPage, PostSourceError>;
}

/// Error type for language-model operations
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
}

/// Port for a text completion service
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one enrichment request and return the raw completion text
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String, ModelError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
