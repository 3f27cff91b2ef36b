//! HTTP-level tests: the router served on an ephemeral port, exercised
//! with a real client.

use async_trait::async_trait;
use embedding::{Embedding, EmbeddingBatch, EmbeddingProvider, EmbeddingResult};
use serde_json::json;
use server::qdrant::{QdrantClient, QdrantConfig};
use server::search::SearchService;
use server::web::{self, AppState};
use std::sync::Arc;
use std::time::Duration;

struct FixedEmbedder;

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed_query(&self, _text: &str) -> EmbeddingResult<Embedding> {
        Ok(vec![0.5, 0.5, 0.5])
    }

    async fn embed_documents(&self, texts: &[String]) -> EmbeddingResult<EmbeddingBatch> {
        Ok(EmbeddingBatch::new(
            texts.iter().map(|_| vec![0.5, 0.5, 0.5]).collect(),
        ))
    }

    async fn health_check(&self) -> EmbeddingResult<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

/// Embedder that never finishes in time, for exercising the request timeout.
struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    async fn embed_query(&self, _text: &str) -> EmbeddingResult<Embedding> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec![0.5])
    }

    async fn embed_documents(&self, _texts: &[String]) -> EmbeddingResult<EmbeddingBatch> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(EmbeddingBatch::new(vec![]))
    }

    async fn health_check(&self) -> EmbeddingResult<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "stalled"
    }
}

async fn spawn_app(service: SearchService, request_timeout: Option<Duration>) -> String {
    let state = Arc::new(AppState {
        service,
        request_timeout,
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, web::router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn degraded_service() -> SearchService {
    SearchService::new(None, None, "taiwan_food_menu_azure", 0.65, 1)
}

#[tokio::test]
async fn test_index_serves_the_search_form() {
    let base = spawn_app(degraded_service(), None).await;

    let response = reqwest::get(&base).await.unwrap();
    assert_eq!(response.status(), 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"), "got: {content_type}");

    let body = response.text().await.unwrap();
    assert!(body.contains("<h1>Menu Search</h1>"));
    assert!(body.contains("<form method=\"post\""));
    assert!(body.contains("name=\"query\""));
    assert!(!body.contains("Search log"));
}

#[tokio::test]
async fn test_healthz_reports_ok() {
    let base = spawn_app(degraded_service(), None).await;

    let response = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["service"], "menu-search");
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_blank_query_returns_the_empty_form() {
    let base = spawn_app(degraded_service(), None).await;

    let client = reqwest::Client::new();
    let response = client
        .post(&base)
        .form(&[("query", "   ")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert!(body.contains("<form method=\"post\""));
    assert!(!body.contains("<h2>Results</h2>"));
    assert!(!body.contains("Search log"));
}

#[tokio::test]
async fn test_degraded_service_answers_with_error_and_log() {
    let base = spawn_app(degraded_service(), None).await;

    let client = reqwest::Client::new();
    let response = client
        .post(&base)
        .form(&[("query", "beef noodle")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200, "degraded service still answers");

    let body = response.text().await.unwrap();
    assert!(body.contains("Error: the embedding client is not initialized."));
    assert!(body.contains("<h2>Search log</h2>"));
    assert!(body.contains("Client initialization failed."));
    assert!(body.contains("User query: &quot;beef noodle&quot;"));
}

#[tokio::test]
async fn test_search_renders_results_through_the_page() {
    let mut qdrant = mockito::Server::new_async().await;
    let _info = qdrant
        .mock("GET", "/collections/menu_test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"result": {"status": "green", "points_count": 2}}).to_string(),
        )
        .create_async()
        .await;
    let _search = qdrant
        .mock("POST", "/collections/menu_test/points/search")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "result": [
                    {"id": "a", "score": 0.82, "payload": {"item_name": "beef noodle soup"}}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let store = QdrantClient::new(QdrantConfig::new(qdrant.url())).unwrap();
    let service = SearchService::new(Some(Arc::new(FixedEmbedder)), Some(store), "menu_test", 0.65, 1);
    let base = spawn_app(service, None).await;

    let client = reqwest::Client::new();
    let response = client
        .post(&base)
        .form(&[("query", "beef noodle")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert!(body.contains("<h2>Results</h2>"));
    assert!(body.contains("<td>beef noodle soup</td><td>0.8200</td>"));
    assert!(body.contains("Raw search results"));
}

#[tokio::test]
async fn test_slow_search_hits_the_request_timeout() {
    let mut qdrant = mockito::Server::new_async().await;
    let _info = qdrant
        .mock("GET", "/collections/menu_test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"result": {"status": "green", "points_count": 2}}).to_string(),
        )
        .create_async()
        .await;

    let store = QdrantClient::new(QdrantConfig::new(qdrant.url())).unwrap();
    let service = SearchService::new(
        Some(Arc::new(StalledEmbedder)),
        Some(store),
        "menu_test",
        0.65,
        1,
    );
    let base = spawn_app(service, Some(Duration::from_millis(50))).await;

    let client = reqwest::Client::new();
    let response = client
        .post(&base)
        .form(&[("query", "beef noodle")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    assert_eq!(response.text().await.unwrap(), "The search request timed out.");
}
