use crate::types::{Embedding, EmbeddingBatch};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Authentication failed")]
    Authentication,

    #[error("Embedding count mismatch: requested {requested}, received {received}")]
    CountMismatch { requested: usize, received: usize },

    #[error("Empty response from embedding service")]
    EmptyResponse,

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl EmbeddingError {
    /// Whether a request that failed with this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::RateLimit | EmbeddingError::ServiceUnavailable { .. }
        )
    }
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Common interface over hosted text embedding services.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> EmbeddingResult<Embedding>;

    /// Embed a batch of documents. The returned batch contains exactly one
    /// vector per input text, in input order.
    async fn embed_documents(&self, texts: &[String]) -> EmbeddingResult<EmbeddingBatch>;

    /// Verify the service is reachable and credentials are accepted.
    async fn health_check(&self) -> EmbeddingResult<()>;

    /// Human-readable provider name for logs and diagnostics.
    fn provider_name(&self) -> &'static str;
}
