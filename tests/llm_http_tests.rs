use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use callsift::config::Settings;
use callsift::llm::{complete_with_retry, GeminiClient, GroqClient, LlmProvider, RetryPolicy};
use callsift::EnrichError;

fn settings_for(server: &MockServer, provider: &str) -> Settings {
    let mut settings = Settings::default();
    settings.llm.provider = provider.to_string();
    settings.llm.api_key = "test-key".to_string();
    settings.llm.endpoint = server.uri();
    settings.llm.timeout_secs = 5;
    settings
}

fn groq_reply(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[tokio::test]
async fn groq_returns_message_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(groq_reply("  {\"summary\": \"ok\"}  ")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GroqClient::from_settings(&settings_for(&server, "groq")).expect("client");
    let reply = client.complete("prompt").await.expect("completion");
    assert_eq!(reply, "{\"summary\": \"ok\"}");

    let received = server
        .received_requests()
        .await
        .expect("should capture requests");
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).expect("json body");
    assert_eq!(body["messages"][0]["content"], "prompt");
    assert_eq!(body["temperature"], 0.0);
}

#[tokio::test]
async fn groq_maps_401_to_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = GroqClient::from_settings(&settings_for(&server, "groq")).expect("client");
    let err = client.complete("prompt").await.unwrap_err();
    assert!(matches!(err, EnrichError::Auth(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn groq_429_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
        .mount(&server)
        .await;

    let client = GroqClient::from_settings(&settings_for(&server, "groq")).expect("client");
    match client.complete("prompt").await {
        Err(EnrichError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(std::time::Duration::from_secs(3)));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_then_succeed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(groq_reply("{}")))
        .mount(&server)
        .await;

    let client = GroqClient::from_settings(&settings_for(&server, "groq")).expect("client");
    let reply = complete_with_retry(&client, "prompt", &RetryPolicy::immediate(2))
        .await
        .expect("retry should recover");
    assert_eq!(reply, "{}");

    let received = server.received_requests().await.expect("requests");
    assert_eq!(received.len(), 2);
}

#[tokio::test]
async fn persistent_server_errors_degrade_to_record_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = GroqClient::from_settings(&settings_for(&server, "groq")).expect("client");
    let err = complete_with_retry(&client, "prompt", &RetryPolicy::immediate(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EnrichError::EnrichmentFailed(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn gemini_returns_first_text_part() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                { "content": { "parts": [ { "text": "" }, { "text": "{\"sentiment\": \"neutral\"}" } ] } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = settings_for(&server, "gemini");
    settings.llm.model = "gemini-test".to_string();

    let client = GeminiClient::from_settings(&settings).expect("client");
    let reply = client.complete("prompt").await.expect("completion");
    assert_eq!(reply, "{\"sentiment\": \"neutral\"}");
}

#[tokio::test]
async fn gemini_invalid_key_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "status": "INVALID_ARGUMENT",
                       "details": [ { "reason": "API_KEY_INVALID" } ] }
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::from_settings(&settings_for(&server, "gemini")).expect("client");
    let err = client.complete("prompt").await.unwrap_err();
    assert!(matches!(err, EnrichError::Auth(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_fatal() {
    let mut settings = Settings::default();
    settings.llm.api_key = "test-key".to_string();
    // Nothing listens on port 9 (discard) in the test environment
    settings.llm.endpoint = "http://127.0.0.1:9".to_string();

    let client = GroqClient::from_settings(&settings).expect("client");
    let err = client.complete("prompt").await.unwrap_err();
    assert!(err.is_fatal(), "expected fatal error, got {err:?}");
}
