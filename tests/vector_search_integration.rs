/// Vector and hybrid search against a mocked embedding service
use anyhow::Result;
use knowledge_search::config::{Config, EmbeddingConfig};
use knowledge_search::embedding::{EmbeddingProvider, RemoteEmbeddingClient};
use knowledge_search::error::{EmbeddingError, SearchError};
use knowledge_search::search::vector::write_vector_index;
use knowledge_search::search::{SearchProvider, VectorSearchProvider};
use knowledge_search::{Item, KnowledgeClient, KnowledgeIndex, ProviderKind};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn items() -> Vec<Item> {
    vec![
        Item::new("geo.North", 1).with_docstring("Points up"),
        Item::new("geo.East", 0).with_docstring("Points right"),
    ]
}

fn embedding_config(server: &MockServer, vector_dir: &Path) -> EmbeddingConfig {
    EmbeddingConfig {
        api_key: Some("sk-test".to_string()),
        base_url: format!("{}/v1", server.uri()),
        vector_index_dir: vector_dir.to_path_buf(),
        timeout_secs: 5,
        ..Default::default()
    }
}

fn write_vectors(dir: &Path) -> Result<()> {
    let items: Vec<Arc<Item>> = items().into_iter().map(Arc::new).collect();
    write_vector_index(dir, &items, &[vec![0.0, 1.0], vec![1.0, 0.0]])?;
    Ok(())
}

async fn mock_embedding(server: &MockServer, input: &str, embedding: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({ "input": [input] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": embedding }],
            "model": "text-embedding-3-small"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_vector_search_through_remote_embeddings() -> Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    write_vectors(dir.path())?;
    mock_embedding(&server, "upwards", serde_json::json!([0.1, 0.9])).await;

    let mut provider = VectorSearchProvider::new(&embedding_config(&server, dir.path()))?;
    let built: Vec<Arc<Item>> = items().into_iter().map(Arc::new).collect();
    provider.build_index(&built);

    let hits = provider.search("upwards", 1, 10).await?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].item.id, "geo.North");
    assert!(hits[0].score > hits[1].score);

    Ok(())
}

#[tokio::test]
async fn test_service_error_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    write_vectors(dir.path())?;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let mut provider = VectorSearchProvider::new(&embedding_config(&server, dir.path()))?;
    provider.build_index(&[]);

    let err = provider.search("anything", 1, 10).await.unwrap_err();
    match err {
        SearchError::Embedding(EmbeddingError::Api { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {other}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_batch_results_follow_input_order() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "index": 1, "embedding": [2.0] },
                { "index": 0, "embedding": [1.0] }
            ]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new()?;
    let client = RemoteEmbeddingClient::from_config(&embedding_config(&server, dir.path()))?;
    let vectors = client
        .embed_batch(vec!["first".to_string(), "second".to_string()])
        .await?;
    assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);

    Ok(())
}

#[tokio::test]
async fn test_short_response_is_an_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
        .mount(&server)
        .await;

    let dir = TempDir::new()?;
    let client = RemoteEmbeddingClient::from_config(&embedding_config(&server, dir.path()))?;
    assert!(client.embed("lonely").await.is_err());

    Ok(())
}

fn hybrid_vector_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.index.path = dir.join("index.json");
    config.search.provider = ProviderKind::Hybrid;
    config.search.hybrid_primary = ProviderKind::Vector;
    config.embedding = embedding_config(server, &dir.join("vectors"));
    config
}

#[tokio::test]
async fn test_hybrid_recovers_from_vector_failure() -> Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    write_vectors(&dir.path().join("vectors"))?;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = KnowledgeClient::with_index(
        hybrid_vector_config(&server, dir.path()),
        KnowledgeIndex::new(items())?,
    )
    .await?;

    let hits = client.search("north", 1, None).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].item.id, "geo.North");
    // Keyword scoring: trailing component match
    assert_eq!(hits[0].score, 30.0);

    Ok(())
}

#[tokio::test]
async fn test_hybrid_prefers_vector_results() -> Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    write_vectors(&dir.path().join("vectors"))?;
    mock_embedding(&server, "sideways", serde_json::json!([1.0, 0.0])).await;

    let client = KnowledgeClient::with_index(
        hybrid_vector_config(&server, dir.path()),
        KnowledgeIndex::new(items())?,
    )
    .await?;

    let hits = client.search("sideways", 1, Some(1)).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].item.id, "geo.East");
    assert!((hits[0].score - 1.0).abs() < 1e-6);

    Ok(())
}

#[tokio::test]
async fn test_missing_key_fails_fast_for_vector_primary() -> Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let mut config = hybrid_vector_config(&server, dir.path());
    config.embedding.api_key = None;
    config.embedding.api_key_env = "KNOWLEDGE_SEARCH_TEST_NEVER_SET".to_string();

    let result = KnowledgeClient::with_index(config, KnowledgeIndex::new(items())?).await;
    assert!(matches!(
        result,
        Err(SearchError::Embedding(EmbeddingError::MissingApiKey(_)))
    ));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());

    Ok(())
}
