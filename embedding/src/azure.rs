use crate::config::AzureOpenAiConfig;
use crate::provider::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::types::{Embedding, EmbeddingBatch, EmbeddingUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Client for the embeddings endpoint of an Azure OpenAI deployment.
pub struct AzureOpenAiProvider {
    client: reqwest::Client,
    config: AzureOpenAiConfig,
}

#[derive(Debug, Serialize)]
struct AzureEmbeddingRequest {
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AzureEmbeddingResponse {
    data: Vec<AzureEmbeddingData>,
    #[serde(default)]
    usage: Option<AzureUsage>,
}

#[derive(Debug, Deserialize)]
struct AzureEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct AzureUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

impl AzureOpenAiProvider {
    pub fn new(config: AzureOpenAiConfig) -> EmbeddingResult<Self> {
        config
            .validate()
            .map_err(|message| EmbeddingError::InvalidConfig { message })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }

    async fn embed(&self, input: Vec<String>) -> EmbeddingResult<EmbeddingBatch> {
        let requested = input.len();
        let url = self.embeddings_url();
        debug!(
            "Requesting {} embedding(s) from Azure deployment '{}'",
            requested, self.config.deployment
        );

        let request = AzureEmbeddingRequest { input };
        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if !response.status().is_success() {
            return Err(self.handle_error_status(response).await);
        }

        let parsed: AzureEmbeddingResponse = response.json().await?;
        if parsed.data.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        if parsed.data.len() != requested {
            return Err(EmbeddingError::CountMismatch {
                requested,
                received: parsed.data.len(),
            });
        }

        // The service may return entries in any order; `index` ties each
        // vector back to its input position.
        let mut data = parsed.data;
        data.sort_by_key(|entry| entry.index);
        let vectors: Vec<Embedding> = data.into_iter().map(|entry| entry.embedding).collect();

        let mut batch = EmbeddingBatch::new(vectors);
        if let Some(usage) = parsed.usage {
            debug!(
                "Azure embedding usage: {} prompt tokens",
                usage.prompt_tokens
            );
            batch = batch.with_usage(EmbeddingUsage {
                prompt_tokens: usage.prompt_tokens,
                total_tokens: usage.total_tokens,
            });
        }
        Ok(batch)
    }

    fn handle_request_error(&self, error: reqwest::Error) -> EmbeddingError {
        if error.is_timeout() {
            EmbeddingError::ServiceUnavailable {
                message: format!("Request to Azure OpenAI timed out: {error}"),
            }
        } else if error.is_connect() {
            EmbeddingError::ServiceUnavailable {
                message: format!("Cannot connect to Azure OpenAI: {error}"),
            }
        } else {
            EmbeddingError::Network(error)
        }
    }

    async fn handle_error_status(&self, response: reqwest::Response) -> EmbeddingError {
        let status = response.status();
        match status.as_u16() {
            401 | 403 => EmbeddingError::Authentication,
            429 => EmbeddingError::RateLimit,
            404 => EmbeddingError::ModelNotFound {
                model: self.config.deployment.clone(),
            },
            _ => {
                let body = response.text().await.unwrap_or_default();
                EmbeddingError::Unknown {
                    message: format!("HTTP {status}: {body}"),
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for AzureOpenAiProvider {
    async fn embed_query(&self, text: &str) -> EmbeddingResult<Embedding> {
        let batch = self.embed(vec![text.to_string()]).await?;
        batch
            .vectors
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResponse)
    }

    async fn embed_documents(&self, texts: &[String]) -> EmbeddingResult<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::new(Vec::new()));
        }
        self.embed(texts.to_vec()).await
    }

    /// Azure exposes no unauthenticated liveness route for deployments, so
    /// this issues a minimal one-word embedding request.
    async fn health_check(&self) -> EmbeddingResult<()> {
        self.embed_query("ping").await.map(|_| ())
    }

    fn provider_name(&self) -> &'static str {
        "azure-openai"
    }
}
