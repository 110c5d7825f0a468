//! HTTP-level tests for the remote clients against a mock server.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use llm::{ClaudeClient, CompletionProvider, CompletionRequest, LlmError, OpenAiClient, ProviderConfig};

#[tokio::test]
async fn claude_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "hi there"}],
            "model": "claude-3-5-sonnet-latest",
            "usage": {"input_tokens": 3, "output_tokens": 2}
        })))
        .mount(&server)
        .await;

    let client = ClaudeClient::with_config(ProviderConfig::new(
        "test-key",
        server.uri(),
        "claude-3-5-sonnet-latest",
    ));

    let response = client
        .complete(CompletionRequest::new("hello").with_max_tokens(64))
        .await
        .unwrap();

    assert_eq!(response.text, "hi there");
    assert_eq!(response.input_tokens, 3);
    assert_eq!(response.output_tokens, 2);
}

#[tokio::test]
async fn claude_401_maps_to_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = ClaudeClient::with_config(ProviderConfig::new(
        "wrong-key",
        server.uri(),
        "claude-3-5-sonnet-latest",
    ));

    let err = client
        .complete(CompletionRequest::new("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::Authentication(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn openai_5xx_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = OpenAiClient::with_config(ProviderConfig::new("test-key", server.uri(), "gpt-4o"));

    let err = client
        .complete(CompletionRequest::new("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::ServiceUnavailable(_)));
    assert!(err.is_retryable());
}
