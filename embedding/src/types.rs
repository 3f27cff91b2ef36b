use serde::{Deserialize, Serialize};

/// A single embedding vector as returned by a provider.
pub type Embedding = Vec<f32>;

/// Retrieval role of the text being embedded. Providers that distinguish
/// query and document embeddings receive this on the wire; providers that
/// do not simply ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::RetrievalQuery => write!(f, "RETRIEVAL_QUERY"),
            TaskType::RetrievalDocument => write!(f, "RETRIEVAL_DOCUMENT"),
        }
    }
}

/// Token accounting for an embedding request, when the provider reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

/// Result of embedding a batch of texts. Vectors are in the same order as
/// the input texts, one per text.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Embedding>,
    pub usage: Option<EmbeddingUsage>,
}

impl EmbeddingBatch {
    pub fn new(vectors: Vec<Embedding>) -> Self {
        Self {
            vectors,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: EmbeddingUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Dimension of the vectors in this batch, taken from the first one.
    pub fn vector_size(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }
}
