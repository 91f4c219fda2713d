use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EmbeddingConfig {
    let address = server.address();
    EmbeddingConfig {
        host: address.ip().to_string(),
        port: address.port(),
        model: "test-model".to_string(),
        batch_size: 16,
        timeout_seconds: 5,
        ..EmbeddingConfig::default()
    }
}

#[tokio::test]
async fn batch_request_returns_vectors_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]]
        })))
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&config_for(&server)).expect("can build embedder");
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    let vectors = embedder.embed(&texts).await.expect("embed should succeed");

    assert_eq!(
        vectors,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test]
async fn single_text_uses_prompt_request_shape() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "prompt": "only one" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.25, 0.75]
        })))
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&config_for(&server)).expect("can build embedder");
    let texts = vec!["only one".to_string()];

    let vectors = embedder.embed(&texts).await.expect("embed should succeed");

    assert_eq!(vectors, vec![vec![0.25, 0.75]]);
}

#[tokio::test]
async fn empty_batch_skips_the_backend() {
    let server = MockServer::start().await;
    // No mock mounted: any request would 404 and fail the call.

    let embedder = OllamaEmbedder::new(&config_for(&server)).expect("can build embedder");
    let vectors = embedder.embed(&[]).await.expect("embed should succeed");

    assert!(vectors.is_empty());
}

#[tokio::test]
async fn server_errors_surface_as_backend_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&config_for(&server))
        .expect("can build embedder")
        .with_retry_attempts(1);

    let err = embedder
        .embed(&["text".to_string()])
        .await
        .expect_err("embed should fail");

    assert!(matches!(err, RagError::EmbeddingBackend(_)));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&config_for(&server))
        .expect("can build embedder")
        .with_retry_attempts(3);

    let err = embedder
        .embed(&["text".to_string()])
        .await
        .expect_err("embed should fail");

    assert!(matches!(err, RagError::EmbeddingBackend(_)));
}

#[tokio::test]
async fn retries_recover_from_transient_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [1.0]
        })))
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&config_for(&server))
        .expect("can build embedder")
        .with_retry_attempts(2);

    let vectors = embedder
        .embed(&["text".to_string()])
        .await
        .expect("embed should recover");

    assert_eq!(vectors, vec![vec![1.0]]);
}

#[tokio::test]
async fn response_count_mismatch_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&config_for(&server)).expect("can build embedder");
    let texts = vec!["a".to_string(), "b".to_string()];

    let err = embedder.embed(&texts).await.expect_err("embed should fail");

    assert!(matches!(err, RagError::EmbeddingBackend(_)));
}

#[tokio::test]
async fn malformed_response_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&config_for(&server)).expect("can build embedder");

    let err = embedder
        .embed(&["text".to_string()])
        .await
        .expect_err("embed should fail");

    assert!(matches!(err, RagError::EmbeddingBackend(_)));
}
