use crate::config::GeminiConfig;
use crate::provider::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::types::{Embedding, EmbeddingBatch, TaskType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Client for the Gemini `embedContent` family of endpoints.
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
    #[serde(rename = "taskType")]
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct GeminiBatchRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiEmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    embeddings: Vec<GeminiEmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbeddingValues {
    values: Vec<f32>,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> EmbeddingResult<Self> {
        config
            .validate()
            .map_err(|message| EmbeddingError::InvalidConfig { message })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn embed_url(&self) -> String {
        format!(
            "{}/v1beta/{}:embedContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn batch_embed_url(&self) -> String {
        format!(
            "{}/v1beta/{}:batchEmbedContents",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn models_url(&self) -> String {
        format!(
            "{}/v1beta/models",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn embed_request(&self, text: &str, task_type: TaskType) -> GeminiEmbedRequest {
        GeminiEmbedRequest {
            model: self.config.model.clone(),
            content: GeminiContent {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            },
            task_type,
        }
    }

    async fn send(&self, url: &str, body: impl Serialize) -> EmbeddingResult<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if !response.status().is_success() {
            return Err(self.handle_error_status(response).await);
        }
        Ok(response)
    }

    fn handle_request_error(&self, error: reqwest::Error) -> EmbeddingError {
        if error.is_timeout() {
            EmbeddingError::ServiceUnavailable {
                message: format!("Request to Gemini timed out: {error}"),
            }
        } else if error.is_connect() {
            EmbeddingError::ServiceUnavailable {
                message: format!("Cannot connect to Gemini: {error}"),
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
                model: self.config.model.clone(),
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
impl EmbeddingProvider for GeminiProvider {
    async fn embed_query(&self, text: &str) -> EmbeddingResult<Embedding> {
        debug!("Embedding query with Gemini model '{}'", self.config.model);
        let request = self.embed_request(text, TaskType::RetrievalQuery);
        let response = self.send(&self.embed_url(), request).await?;
        let parsed: GeminiEmbedResponse = response.json().await?;
        if parsed.embedding.values.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        Ok(parsed.embedding.values)
    }

    async fn embed_documents(&self, texts: &[String]) -> EmbeddingResult<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::new(Vec::new()));
        }

        debug!(
            "Embedding {} document(s) with Gemini model '{}'",
            texts.len(),
            self.config.model
        );
        let batch = GeminiBatchRequest {
            requests: texts
                .iter()
                .map(|text| self.embed_request(text, TaskType::RetrievalDocument))
                .collect(),
        };
        let response = self.send(&self.batch_embed_url(), batch).await?;
        let parsed: GeminiBatchResponse = response.json().await?;

        if parsed.embeddings.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                requested: texts.len(),
                received: parsed.embeddings.len(),
            });
        }

        Ok(EmbeddingBatch::new(
            parsed.embeddings.into_iter().map(|e| e.values).collect(),
        ))
    }

    /// Lists models, which verifies both reachability and the API key
    /// without spending embedding quota.
    async fn health_check(&self) -> EmbeddingResult<()> {
        let response = self
            .client
            .get(self.models_url())
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if !response.status().is_success() {
            return Err(self.handle_error_status(response).await);
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}
