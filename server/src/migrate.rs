use crate::config::Settings;
use crate::menu::{MenuSource, MenuSourceError};
use crate::qdrant::{Point, QdrantClient, QdrantError};
use chrono::{DateTime, Utc};
use embedding::{EmbeddingBatch, EmbeddingError, EmbeddingProvider, EmbeddingResult, RetryConfig};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Menu source error: {0}")]
    Menu(#[from] MenuSourceError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Qdrant error: {0}")]
    Qdrant(#[from] QdrantError),

    #[error("Not configured: {message}")]
    NotConfigured { message: String },
}

pub type MigrateResult<T> = Result<T, MigrateError>;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Summary of one migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub source: String,
    pub collection: String,
    pub items_found: usize,
    pub items_migrated: usize,
    pub vector_size: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Rebuilds the vector collection from a menu source: reads the distinct
/// item names, embeds them as documents, and replaces the collection's
/// contents with one point per name.
pub struct Migrator {
    embedder: Arc<dyn EmbeddingProvider>,
    store: QdrantClient,
    collection: String,
    batch_size: usize,
    retry: RetryConfig,
}

impl Migrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: QdrantClient,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Unlike the web service, migration cannot run degraded: it fails
    /// outright when either client is missing.
    pub fn from_settings(settings: &Settings) -> MigrateResult<Self> {
        let embedder =
            settings
                .embedding_provider()
                .ok_or_else(|| MigrateError::NotConfigured {
                    message: format!(
                        "embedding provider '{}' is not fully configured",
                        settings.provider_kind
                    ),
                })?;
        let store = settings
            .qdrant_client()
            .ok_or_else(|| MigrateError::NotConfigured {
                message: "QDRANT_URL is not set".to_string(),
            })?;
        Ok(Self::new(embedder, store, settings.collection_name.clone()))
    }

    pub async fn run(&self, source: &dyn MenuSource) -> MigrateResult<MigrationReport> {
        let started_at = Utc::now();
        info!(
            "Reading distinct menu item names from the {} source",
            source.source_name()
        );
        let names = source.distinct_item_names()?;
        info!("Found {} distinct menu item name(s)", names.len());

        if names.is_empty() {
            warn!("The menu source holds no item names, nothing to migrate");
            return Ok(MigrationReport {
                source: source.source_name().to_string(),
                collection: self.collection.clone(),
                items_found: 0,
                items_migrated: 0,
                vector_size: None,
                started_at,
                finished_at: Utc::now(),
            });
        }

        info!(
            "Embedding {} name(s) with '{}' in batches of {}",
            names.len(),
            self.embedder.provider_name(),
            self.batch_size
        );
        let mut vectors = Vec::with_capacity(names.len());
        for chunk in names.chunks(self.batch_size) {
            let batch = self.embed_batch_with_retry(chunk).await?;
            vectors.extend(batch.vectors);
        }
        if vectors.len() != names.len() {
            return Err(MigrateError::Embedding(EmbeddingError::CountMismatch {
                requested: names.len(),
                received: vectors.len(),
            }));
        }

        // The collection is sized from the first vector rather than a
        // hard-coded dimension, so switching models only needs a re-run.
        let vector_size = vectors[0].len() as u64;
        info!("Detected vector size: {vector_size}");
        self.store
            .recreate_collection(&self.collection, vector_size)
            .await?;

        let points: Vec<Point> = names
            .iter()
            .zip(vectors)
            .map(|(name, vector)| Point {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: serde_json::json!({ "item_name": name }),
            })
            .collect();

        let mut uploaded = 0;
        for chunk in points.chunks(self.batch_size) {
            self.store
                .upsert_points(&self.collection, chunk.to_vec(), true)
                .await?;
            uploaded += chunk.len();
            info!("Uploaded {uploaded}/{} point(s)", points.len());
        }

        info!(
            "Migration complete: {} item(s) now in collection '{}'",
            uploaded, self.collection
        );
        Ok(MigrationReport {
            source: source.source_name().to_string(),
            collection: self.collection.clone(),
            items_found: names.len(),
            items_migrated: uploaded,
            vector_size: Some(vector_size),
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn embed_batch_with_retry(&self, chunk: &[String]) -> EmbeddingResult<EmbeddingBatch> {
        let mut attempt = 0;
        loop {
            match self.embedder.embed_documents(chunk).await {
                Ok(batch) => return Ok(batch),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.calculate_retry_delay(attempt);
                    warn!(
                        "Embedding batch failed (attempt {}), retrying in {:?}: {e}",
                        attempt + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
