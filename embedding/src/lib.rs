pub mod azure;
pub mod config;
pub mod gemini;
pub mod provider;
pub mod types;

pub use azure::AzureOpenAiProvider;
pub use config::{AzureOpenAiConfig, GeminiConfig, RetryConfig};
pub use gemini::GeminiProvider;
pub use provider::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
pub use types::{Embedding, EmbeddingBatch, EmbeddingUsage, TaskType};

pub mod prelude {
    pub use crate::azure::*;
    pub use crate::config::*;
    pub use crate::gemini::*;
    pub use crate::provider::*;
    pub use crate::types::*;
}
