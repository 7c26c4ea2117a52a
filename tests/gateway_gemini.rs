use std::time::Duration;

use priority_harness::gateway::{
    FinishReason, GeminiAdapter, GenerateRequest, ModelProvider, ProviderError, ProxyClient,
};
use priority_harness::task::normalize_tasks;
use priority_harness::TuningConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-1.5-pro:generateContent";

fn adapter(server: &MockServer) -> GeminiAdapter {
    GeminiAdapter::with_config(server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn gemini_sends_key_prompt_and_json_mode() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "rank these"}]}],
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"ratedTasks\": []}"}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = GenerateRequest::new("gemini-1.5-pro", "rank these");
    let resp = adapter(&server).generate("test-key", &req).await.unwrap();
    assert_eq!(resp.content, "{\"ratedTasks\": []}");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
}

#[tokio::test]
async fn gemini_non_success_status_carries_context() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .generate("bad", &GenerateRequest::new("gemini-1.5-pro", "x"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Gemini HTTP 403");
    assert_eq!(err.http_status(), Some(403));
    let ctx = err.context().unwrap();
    assert_eq!(ctx.provider_code.as_deref(), Some("PERMISSION_DENIED"));
    assert_eq!(ctx.detail.as_deref(), Some("API key not valid"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn gemini_without_candidate_text_is_missing_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .generate("k", &GenerateRequest::new("gemini-1.5-pro", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::MissingContent { .. }));
    assert_eq!(err.to_string(), "Gemini response missing content");
}

#[tokio::test]
async fn gemini_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({"candidates": []})),
        )
        .mount(&server)
        .await;

    let adapter = GeminiAdapter::with_config(server.uri(), Duration::from_millis(100)).unwrap();
    let err = adapter
        .generate("k", &GenerateRequest::new("gemini-1.5-pro", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn proxy_posts_sanitized_config_and_resorts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/priority"))
        .and(body_partial_json(json!({
            "tasks": [{"id": "a"}, {"id": "b"}],
            "llmConfig": {"model": "gemini-1.5-flash", "temperature": 0.2}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ratedTasks": [
                {"id": "a", "title": "A", "priorityScore": 40, "priorityBand": "low", "reason": "r"},
                {"id": "b", "title": "B", "priorityScore": 90, "priorityBand": "critical", "reason": "r"}
            ],
            "summary": "remote",
            "provider": "gemini"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = normalize_tasks(&json!([{"id": "a"}, {"id": "b"}]));
    let config: TuningConfig = serde_json::from_value(json!({
        "model": "gemini-1.5-flash",
        "apiKey": "must-not-leak",
        "allowDirectApi": true
    }))
    .unwrap();

    let client = ProxyClient::new(Some(server.uri())).unwrap();
    let result = client.prioritize(&tasks, &config).await.unwrap();
    let ids: Vec<_> = result.rated_tasks.iter().map(|t| t.id()).collect();
    assert_eq!(ids, ["b", "a"]);
    assert_eq!(result.summary, "remote");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body["llmConfig"].get("apiKey").is_none());
    assert!(body["llmConfig"].get("allowDirectApi").is_none());
}

#[tokio::test]
async fn proxy_error_status_is_reported_as_http_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/priority"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = ProxyClient::new(Some(server.uri())).unwrap();
    let err = client
        .prioritize(&normalize_tasks(&json!([{}])), &TuningConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "HTTP 502");
    assert!(err.is_retryable());
}
