//! Integration tests against the real embedding services.
//!
//! These are ignored by default because they need live credentials:
//!
//! ```bash
//! AZURE_OPENAI_ENDPOINT=... AZURE_OPENAI_API_KEY=... \
//! AZURE_OPENAI_EMBEDDING_DEPLOYMENT=... \
//!   cargo test --test live_provider_integration -- --ignored
//! ```

use embedding::prelude::*;

fn azure_provider_from_env() -> AzureOpenAiProvider {
    let endpoint =
        std::env::var("AZURE_OPENAI_ENDPOINT").expect("AZURE_OPENAI_ENDPOINT must be set");
    let api_key = std::env::var("AZURE_OPENAI_API_KEY").expect("AZURE_OPENAI_API_KEY must be set");
    let deployment = std::env::var("AZURE_OPENAI_EMBEDDING_DEPLOYMENT")
        .expect("AZURE_OPENAI_EMBEDDING_DEPLOYMENT must be set");

    let config = AzureOpenAiConfig::new(endpoint, api_key, deployment);
    AzureOpenAiProvider::new(config).expect("provider construction should succeed")
}

fn gemini_provider_from_env() -> GeminiProvider {
    let api_key = std::env::var("GOOGLE_API_KEY").expect("GOOGLE_API_KEY must be set");
    let config = GeminiConfig::new(api_key);
    GeminiProvider::new(config).expect("provider construction should succeed")
}

#[tokio::test]
#[ignore]
async fn test_azure_embed_query_returns_nonempty_vector() {
    let provider = azure_provider_from_env();
    let vector = provider
        .embed_query("beef noodle soup")
        .await
        .expect("embedding request should succeed");
    assert!(!vector.is_empty(), "expected a non-empty embedding vector");
}

#[tokio::test]
#[ignore]
async fn test_azure_batch_preserves_order_and_length() {
    let provider = azure_provider_from_env();
    let texts = vec![
        "braised pork rice".to_string(),
        "oyster omelette".to_string(),
        "bubble tea".to_string(),
    ];
    let batch = provider
        .embed_documents(&texts)
        .await
        .expect("batch embedding should succeed");
    assert_eq!(batch.len(), texts.len());

    let size = batch.vector_size().expect("batch should not be empty");
    for vector in &batch.vectors {
        assert_eq!(vector.len(), size, "all vectors should share one dimension");
    }
}

#[tokio::test]
#[ignore]
async fn test_gemini_embed_query_returns_nonempty_vector() {
    let provider = gemini_provider_from_env();
    let vector = provider
        .embed_query("mango shaved ice")
        .await
        .expect("embedding request should succeed");
    assert!(!vector.is_empty(), "expected a non-empty embedding vector");
}

#[tokio::test]
#[ignore]
async fn test_gemini_health_check_passes() {
    let provider = gemini_provider_from_env();
    provider
        .health_check()
        .await
        .expect("health check should pass with valid credentials");
}
