//! OpenAiEngine against a local mock of the OpenAI-compatible API

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use notesai_llm_engine::{
    ChatMessage, EngineConfig, EngineError, InferenceEngine, InitProgress, OpenAiEngine,
};
use serde_json::{json, Value};
use std::sync::Arc;

async fn list_models() -> Json<Value> {
    Json(json!({ "object": "list", "data": [{ "id": "test-model" }] }))
}

async fn chat_completions(Json(body): Json<Value>) -> impl IntoResponse {
    let user = body["messages"][1]["content"].as_str().unwrap_or_default();
    if user == "explode" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    let events = [
        r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":" world"}}]}"#,
        r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        r#"data: {"choices":[],"usage":{"prompt_tokens":9,"completion_tokens":2}}"#,
        "data: [DONE]",
    ];
    let body = events.join("\n\n") + "\n\n";

    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn spawn_mock_server() -> String {
    let app = Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/v1", addr)
}

fn messages(user: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You are a professional translator."),
        ChatMessage::user(user),
    ]
}

#[tokio::test]
async fn test_streams_deltas_and_records_stats() {
    let base_url = spawn_mock_server().await;
    let engine = OpenAiEngine::new(EngineConfig::for_server(base_url, "test-model")).unwrap();

    let reports = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = reports.clone();
    engine
        .load(Arc::new(move |report: InitProgress| sink.lock().unwrap().push(report.progress)))
        .await
        .unwrap();
    assert!(engine.is_loaded());
    assert_eq!(*reports.lock().unwrap(), vec![0.0, 1.0]);
    assert!(engine.is_model_cached().await.unwrap());

    let deltas: Vec<String> = engine
        .stream_chat(messages("Bonjour le monde"))
        .await
        .unwrap()
        .map(|delta| delta.unwrap())
        .collect()
        .await;

    assert_eq!(deltas, vec!["Hello", " world"]);

    let stats = engine.runtime_stats().await.unwrap();
    assert!(stats.starts_with("prefill:"), "unexpected stats: {}", stats);
    assert!(stats.contains("decoding:"));
}

#[tokio::test]
async fn test_unknown_model_fails_to_load() {
    let base_url = spawn_mock_server().await;
    let engine = OpenAiEngine::new(EngineConfig::for_server(base_url, "missing")).unwrap();

    let result = engine.load(Arc::new(|_: InitProgress| {})).await;
    assert!(matches!(result, Err(EngineError::ModelNotFound(ref m)) if m == "missing"));
    assert!(!engine.is_loaded());
    assert!(!engine.is_model_cached().await.unwrap());
}

#[tokio::test]
async fn test_server_error_status_is_surfaced() {
    let base_url = spawn_mock_server().await;
    let engine = OpenAiEngine::new(EngineConfig::for_server(base_url, "test-model")).unwrap();
    engine.load(Arc::new(|_: InitProgress| {})).await.unwrap();

    let result = engine.stream_chat(messages("explode")).await;
    match result {
        Err(EngineError::ServerStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected an error status"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_a_load_failure() {
    // Port 9 (discard) is essentially never served on loopback
    let engine =
        OpenAiEngine::new(EngineConfig::for_server("http://127.0.0.1:9/v1", "test-model"))
            .unwrap();
    let result = engine.load(Arc::new(|_: InitProgress| {})).await;
    assert!(matches!(result, Err(EngineError::LoadFailed(_))));
}
