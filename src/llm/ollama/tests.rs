use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(url: String) -> LlmConfig {
    LlmConfig {
        ollama_url: url,
        embedding_model: "nomic-embed-text".to_string(),
        generation_model: "llama3.1".to_string(),
        ..LlmConfig::default()
    }
}

#[test]
fn client_configuration() {
    let client = OllamaClient::new(&test_config("http://test-host:1234".to_string()))
        .expect("Failed to create client");

    assert_eq!(client.embedding_model, "nomic-embed-text");
    assert_eq!(client.generation_model, "llama3.1");
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&LlmConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[test]
fn invalid_url_is_rejected() {
    let config = test_config("not a url".to_string());
    assert!(OllamaClient::new(&config).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(json!({
            "model": "nomic-embed-text",
            "prompt": "coolant level low"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.1, 0.2, 0.3]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&test_config(server.uri())).expect("Failed to create client");
    let embedding = tokio::task::spawn_blocking(move || client.embed("coolant level low"))
        .await
        .expect("task completes")
        .expect("embed succeeds");

    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn complete_prepends_system_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({
            "model": "llama3.1",
            "prompt": "You are a mechanic.\n\nWhy is the engine overheating?",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Check the thermostat."
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&test_config(server.uri())).expect("Failed to create client");
    let completion = tokio::task::spawn_blocking(move || {
        client.complete("Why is the engine overheating?", Some("You are a mechanic."))
    })
    .await
    .expect("task completes")
    .expect("complete succeeds");

    assert_eq!(completion, "Check the thermostat.");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_completion_is_valid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "" })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&test_config(server.uri())).expect("Failed to create client");
    let completion = tokio::task::spawn_blocking(move || client.complete("prompt", None))
        .await
        .expect("task completes")
        .expect("complete succeeds");

    assert_eq!(completion, "");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_surfaces_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&test_config(server.uri()))
        .expect("Failed to create client")
        .with_retry_attempts(1);
    let result = tokio::task::spawn_blocking(move || client.embed("text"))
        .await
        .expect("task completes");

    assert!(result.is_err());
}
