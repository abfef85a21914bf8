use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use snipkit_sanitize::{
    ChatMessage, CompletionClient, CompletionConfig, CompletionError, HttpCompletionClient,
    SanitizationService, SanitizeError,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> CompletionConfig {
    CompletionConfig {
        base_url: format!("{}/v1", server.uri()),
        model: "test/model".to_string(),
        timeout_secs: 5,
        ..CompletionConfig::default()
    }
}

fn choice(content: &str) -> serde_json::Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

#[tokio::test]
async fn sends_model_messages_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test/model",
            "messages": [{ "role": "user", "content": "hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(choice("world")))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        HttpCompletionClient::with_api_key(&config(&server), Some("sk-test".to_string())).unwrap();
    let reply = client.complete(vec![ChatMessage::user("hello")]).await.unwrap();
    assert_eq!(reply.as_deref(), Some("world"));
}

#[tokio::test]
async fn empty_choices_yield_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = HttpCompletionClient::with_api_key(&config(&server), None).unwrap();
    assert_eq!(client.complete(vec![ChatMessage::user("x")]).await, Ok(None));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = HttpCompletionClient::with_api_key(&config(&server), None).unwrap();
    let err = client.complete(vec![ChatMessage::user("x")]).await.unwrap_err();
    assert_eq!(
        err,
        CompletionError::Status {
            status: 429,
            body: "rate limited".to_string()
        }
    );
}

#[tokio::test]
async fn undecodable_body_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = HttpCompletionClient::with_api_key(&config(&server), None).unwrap();
    let err = client.complete(vec![ChatMessage::user("x")]).await.unwrap_err();
    assert!(matches!(err, CompletionError::Decode(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let config = CompletionConfig {
        base_url: "http://127.0.0.1:9/v1".to_string(),
        timeout_secs: 2,
        ..CompletionConfig::default()
    };
    let client = HttpCompletionClient::with_api_key(&config, None).unwrap();
    let err = client.complete(vec![ChatMessage::user("x")]).await.unwrap_err();
    assert!(matches!(err, CompletionError::Transport(_)));
}

#[tokio::test]
async fn sanitization_service_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{ "role": "user", "content": "What language is this code written in? Reply with only the language name. No explanation.\n\n<b>hi</b>" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(choice("HTML")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(choice("exports.default = () => <b className=\"font-bold\">hi</b>;")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCompletionClient::with_api_key(&config(&server), None).unwrap();
    let service = SanitizationService::new(Arc::new(client));

    let result = service.sanitize("<b>hi</b>").await.unwrap();
    assert_eq!(result.language, "HTML");
    assert_eq!(
        result.code,
        "exports.default = () => <b className=\"font-bold\">hi</b>;"
    );
}

#[tokio::test]
async fn sanitization_surfaces_upstream_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCompletionClient::with_api_key(&config(&server), None).unwrap();
    let service = SanitizationService::new(Arc::new(client));

    let err = service.sanitize("<b>hi</b>").await.unwrap_err();
    assert!(matches!(
        err,
        SanitizeError::SanitizationFailed(CompletionError::Status { status: 500, .. })
    ));
}
