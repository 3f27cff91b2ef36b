use crate::config::Settings;
use crate::qdrant::{QdrantClient, ScoredPoint};
use embedding::EmbeddingProvider;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// A menu item that passed the similarity threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuHit {
    pub name: String,
    pub score: f32,
}

/// What a search produced: either the surviving hits (possibly none) or a
/// short user-facing error. Neither case aborts the service.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Results(Vec<MenuHit>),
    Error(String),
}

/// Step-by-step record of one search, rendered on the results page so a
/// reader can see why a query did or did not match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchLog {
    entries: Vec<String>,
}

impl SearchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_text(&self) -> String {
        self.entries.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub outcome: SearchOutcome,
    pub log: SearchLog,
}

/// Embeds queries and matches them against the menu collection. Both
/// clients are optional: when either is missing the service still answers,
/// reporting the missing piece instead of results.
pub struct SearchService {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<QdrantClient>,
    collection: String,
    score_threshold: f32,
    limit: usize,
}

impl SearchService {
    pub fn new(
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        store: Option<QdrantClient>,
        collection: impl Into<String>,
        score_threshold: f32,
        limit: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            score_threshold,
            limit,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.embedding_provider(),
            settings.qdrant_client(),
            settings.collection_name.clone(),
            settings.score_threshold,
            settings.search_limit,
        )
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn search(&self, query: &str) -> SearchResponse {
        let mut log = SearchLog::new();
        log.push(format!("User query: \"{query}\""));

        let Some(embedder) = &self.embedder else {
            log.push("Client initialization failed.");
            return SearchResponse {
                outcome: SearchOutcome::Error(
                    "Error: the embedding client is not initialized.".to_string(),
                ),
                log,
            };
        };
        let Some(store) = &self.store else {
            log.push("Client initialization failed.");
            return SearchResponse {
                outcome: SearchOutcome::Error(
                    "Error: the Qdrant client is not initialized.".to_string(),
                ),
                log,
            };
        };

        debug!(
            "Searching collection '{}' with provider '{}'",
            self.collection,
            embedder.provider_name()
        );

        match store.collection_info(&self.collection).await {
            Ok(info) => {
                log.push(format!(
                    "Qdrant status check passed: collection '{}' holds {} point(s).",
                    self.collection, info.points_count
                ));
                if info.points_count == 0 {
                    return SearchResponse {
                        outcome: SearchOutcome::Error(
                            "Error: the vector collection is empty, run the migration first."
                                .to_string(),
                        ),
                        log,
                    };
                }
            }
            Err(e) => {
                error!("Qdrant status check failed: {e}");
                log.push(format!(
                    "Qdrant status check failed: cannot read collection '{}'.",
                    self.collection
                ));
                log.push(format!("Error detail: {e}"));
                return SearchResponse {
                    outcome: SearchOutcome::Error(
                        "Error: cannot reach the vector collection.".to_string(),
                    ),
                    log,
                };
            }
        }

        let query_vector = match embedder.embed_query(query).await {
            Ok(vector) => {
                log.push("Query vector generated.");
                vector
            }
            Err(e) => {
                error!("Query embedding failed: {e}");
                log.push(format!("Error detail: {e}"));
                return SearchResponse {
                    outcome: SearchOutcome::Error(
                        "Error: could not generate the query embedding.".to_string(),
                    ),
                    log,
                };
            }
        };

        let raw_hits = match store.search(&self.collection, query_vector, self.limit).await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Vector search failed: {e}");
                log.push(format!("Error detail: {e}"));
                return SearchResponse {
                    outcome: SearchOutcome::Error("Error: the vector search failed.".to_string()),
                    log,
                };
            }
        };

        log.push("--- Raw search results (no score threshold) ---");
        log.push(format!("{raw_hits:?}"));
        log.push("-----------------------------------------------");

        let found = Self::apply_threshold(&raw_hits, self.score_threshold, &mut log);

        if found.is_empty() {
            if let Some(best) = raw_hits.first() {
                log.push(format!(
                    "Note: similar items were found, but the best score ({:.4}) is below the threshold ({}).",
                    best.score, self.score_threshold
                ));
            }
        }
        log.push(format!(
            "After applying the threshold ({}), {} result(s) remain.",
            self.score_threshold,
            found.len()
        ));

        SearchResponse {
            outcome: SearchOutcome::Results(found),
            log,
        }
    }

    /// Keep hits whose score meets the threshold (inclusive), logging the
    /// decision for each one.
    fn apply_threshold(hits: &[ScoredPoint], threshold: f32, log: &mut SearchLog) -> Vec<MenuHit> {
        let mut found = Vec::new();
        for hit in hits {
            let Some(name) = hit.payload.get("item_name").and_then(Value::as_str) else {
                log.push(format!("Skipped point {} without an item_name payload.", hit.id));
                continue;
            };
            let meets = hit.score >= threshold;
            log.push(format!(
                "Checked '{}': score {:.4}, meets threshold ({})? -> {}",
                name, hit.score, threshold, meets
            ));
            if meets {
                found.push(MenuHit {
                    name: name.to_string(),
                    score: hit.score,
                });
            }
        }
        found
    }
}
