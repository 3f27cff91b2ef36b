use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum QdrantError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Authentication failed")]
    Authentication,

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

pub type QdrantResult<T> = Result<T, QdrantError>;

/// Connection settings for a Qdrant instance, reachable over its REST API.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("URL must start with http:// or https://".to_string());
        }
        if self.timeout.is_zero() {
            return Err("Timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Distance metric used when a collection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

/// Summary of a collection, as reported by Qdrant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub status: String,
    pub points_count: u64,
}

/// A vector with its payload, ready to be written into a collection.
#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// One search hit: the stored point's id and payload plus its similarity
/// score against the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
struct CollectionInfoEnvelope {
    result: CollectionInfoWire,
}

#[derive(Debug, Deserialize)]
struct CollectionInfoWire {
    status: String,
    // Nullable in the Qdrant API.
    #[serde(default)]
    points_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: u64,
    distance: Distance,
}

#[derive(Debug, Serialize)]
struct CreateCollectionBody {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct UpsertBody {
    points: Vec<Point>,
}

#[derive(Debug, Serialize)]
struct SearchBody {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    result: Vec<ScoredPointWire>,
}

#[derive(Debug, Deserialize)]
struct ScoredPointWire {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

impl ScoredPointWire {
    fn into_scored_point(self) -> ScoredPoint {
        let id = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        ScoredPoint {
            id,
            score: self.score,
            payload: self.payload.unwrap_or(Value::Null),
        }
    }
}

/// Minimal client for the Qdrant REST API, covering the collection and
/// point operations the search and migration paths need.
pub struct QdrantClient {
    client: reqwest::Client,
    config: QdrantConfig,
}

impl QdrantClient {
    pub fn new(config: QdrantConfig) -> QdrantResult<Self> {
        config
            .validate()
            .map_err(|message| QdrantError::InvalidConfig { message })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url(), collection)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("api-key", api_key);
        }
        builder
    }

    fn handle_request_error(&self, error: reqwest::Error) -> QdrantError {
        if error.is_timeout() {
            QdrantError::ServiceUnavailable {
                message: format!("Request to Qdrant timed out: {error}"),
            }
        } else if error.is_connect() {
            QdrantError::ServiceUnavailable {
                message: format!("Cannot connect to Qdrant: {error}"),
            }
        } else {
            QdrantError::Network(error)
        }
    }

    async fn handle_error_status(
        &self,
        response: reqwest::Response,
        collection: Option<&str>,
    ) -> QdrantError {
        let status = response.status();
        match status.as_u16() {
            401 | 403 => QdrantError::Authentication,
            404 => match collection {
                Some(name) => QdrantError::CollectionNotFound {
                    collection: name.to_string(),
                },
                None => QdrantError::Unknown {
                    message: format!("HTTP {status}"),
                },
            },
            502 | 503 | 504 => QdrantError::ServiceUnavailable {
                message: format!("Qdrant returned HTTP {status}"),
            },
            _ => {
                let body = response.text().await.unwrap_or_default();
                QdrantError::Unknown {
                    message: format!("HTTP {status}: {body}"),
                }
            }
        }
    }

    pub async fn collection_info(&self, collection: &str) -> QdrantResult<CollectionInfo> {
        let response = self
            .request(reqwest::Method::GET, self.collection_url(collection))
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if !response.status().is_success() {
            return Err(self.handle_error_status(response, Some(collection)).await);
        }

        let envelope: CollectionInfoEnvelope = response.json().await?;
        Ok(CollectionInfo {
            status: envelope.result.status,
            points_count: envelope.result.points_count.unwrap_or(0),
        })
    }

    /// Delete a collection. Returns `false` when it did not exist.
    pub async fn delete_collection(&self, collection: &str) -> QdrantResult<bool> {
        let response = self
            .request(reqwest::Method::DELETE, self.collection_url(collection))
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(self.handle_error_status(response, None).await);
        }
        Ok(true)
    }

    pub async fn create_collection(
        &self,
        collection: &str,
        vector_size: u64,
        distance: Distance,
    ) -> QdrantResult<()> {
        let body = CreateCollectionBody {
            vectors: VectorParams {
                size: vector_size,
                distance,
            },
        };
        let response = self
            .request(reqwest::Method::PUT, self.collection_url(collection))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if !response.status().is_success() {
            return Err(self.handle_error_status(response, None).await);
        }
        Ok(())
    }

    /// Drop and re-create a collection with cosine distance, leaving it
    /// empty and sized for the given vectors.
    pub async fn recreate_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> QdrantResult<()> {
        let existed = self.delete_collection(collection).await?;
        if existed {
            info!("Deleted existing collection '{collection}'");
        }
        self.create_collection(collection, vector_size, Distance::Cosine)
            .await?;
        info!("Created collection '{collection}' ({vector_size} dimensions, cosine distance)");
        Ok(())
    }

    pub async fn upsert_points(
        &self,
        collection: &str,
        points: Vec<Point>,
        wait: bool,
    ) -> QdrantResult<()> {
        debug!(
            "Upserting {} point(s) into collection '{collection}'",
            points.len()
        );
        let url = format!("{}/points?wait={}", self.collection_url(collection), wait);
        let body = UpsertBody { points };
        let response = self
            .request(reqwest::Method::PUT, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if !response.status().is_success() {
            return Err(self.handle_error_status(response, Some(collection)).await);
        }
        Ok(())
    }

    /// Nearest-neighbour search over a collection, returning up to `limit`
    /// hits with their payloads, best score first.
    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        let url = format!("{}/points/search", self.collection_url(collection));
        let body = SearchBody {
            vector,
            limit,
            with_payload: true,
        };
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if !response.status().is_success() {
            return Err(self.handle_error_status(response, Some(collection)).await);
        }

        let envelope: SearchEnvelope = response.json().await?;
        Ok(envelope
            .result
            .into_iter()
            .map(ScoredPointWire::into_scored_point)
            .collect())
    }

    pub async fn health_check(&self) -> QdrantResult<()> {
        let url = format!("{}/readyz", self.base_url());
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| self.handle_request_error(e))?;

        if !response.status().is_success() {
            return Err(self.handle_error_status(response, None).await);
        }
        Ok(())
    }
}
