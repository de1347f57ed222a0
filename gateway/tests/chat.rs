use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chef_core::{
    AssistantConfig, LanguageModel, ModelChunk, ModelRequest, ModelStream, Orchestrator,
    ToolCallRequest,
};
use chef_gateway::{router, AppState};
use chef_tools::{catalog_registry, CardStyle, CatalogStore, SqliteCatalog};
use futures::stream;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Replays one canned response per model call.
struct ScriptedModel {
    script: Mutex<VecDeque<Vec<ModelChunk>>>,
}

impl ScriptedModel {
    fn new(script: Vec<Vec<ModelChunk>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn stream_turn(&self, _request: ModelRequest<'_>) -> anyhow::Result<ModelStream> {
        let chunks = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![ModelChunk::Text("Nothing more to add.".into())]);
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

async fn app(script: Vec<Vec<ModelChunk>>) -> Router {
    let catalog = SqliteCatalog::connect("sqlite::memory:").await.unwrap();
    catalog.migrate().await.unwrap();
    catalog
        .seed(include_str!("../../tools/fixtures/catalog.sql"))
        .await
        .unwrap();

    let store: Arc<dyn CatalogStore> = Arc::new(catalog);
    let registry = catalog_registry(store, CardStyle::default()).unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(ScriptedModel::new(script)),
        Arc::new(registry),
        AssistantConfig::new("test assistant"),
    );
    router(AppState::new(orchestrator))
}

fn post_chat(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Splits an SSE body into `(event, data)` pairs.
fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut event = None;
            let mut data = None;
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_string());
                } else if let Some(json) = line.strip_prefix("data:") {
                    data = serde_json::from_str(json.trim()).ok();
                }
            }
            Some((event?, data?))
        })
        .collect()
}

#[tokio::test]
async fn health_reports_operational() {
    let app = app(Vec::new()).await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"SmartChef Gateway: Operational");
}

#[tokio::test]
async fn tools_endpoint_lists_the_catalog_tools() {
    let app = app(Vec::new()).await;

    let response = app
        .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let tools: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(tools.len(), 12);
    assert_eq!(tools[1]["name"], "listMeals");
    assert_eq!(tools[1]["parameters"]["type"], "object");
}

#[tokio::test]
async fn chat_streams_tool_use_and_answer() {
    let app = app(vec![
        vec![ModelChunk::ToolCall(ToolCallRequest {
            id: "call-1".into(),
            name: "listMeals".into(),
            arguments: json!({ "search": "soup" }),
        })],
        vec![
            ModelChunk::Text("You could make ".into()),
            ModelChunk::Text("Tomato Soup.".into()),
        ],
    ])
    .await;

    let response = app
        .oneshot(post_chat(json!({
            "messages": [{ "role": "user", "content": "Any soup recipes?" }]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let events = parse_sse(std::str::from_utf8(&body).unwrap());
    let kinds: Vec<&str> = events.iter().map(|(kind, _)| kind.as_str()).collect();
    assert_eq!(
        kinds,
        ["tool-call", "tool-result", "step-finish", "text-delta", "text-delta", "finish"]
    );

    let (_, result) = &events[1];
    assert_eq!(result["toolCallId"], "call-1");
    assert_eq!(result["result"][0]["name"], "Tomato Soup");
    assert_eq!(result["result"].as_array().unwrap().len(), 1);

    let (_, finish) = &events[5];
    assert_eq!(finish["type"], "finish");
    assert_eq!(finish["reason"], "stop");
    assert_eq!(finish["steps"], 2);
}

#[tokio::test]
async fn unknown_tool_is_reported_and_the_run_continues() {
    let app = app(vec![
        vec![ModelChunk::ToolCall(ToolCallRequest {
            id: "call-1".into(),
            name: "addToCart".into(),
            arguments: json!({}),
        })],
        vec![ModelChunk::Text("I can't do that, but here is how.".into())],
    ])
    .await;

    let response = app
        .oneshot(post_chat(json!({
            "messages": [{ "role": "user", "content": "Put the kit in my cart" }]
        })))
        .await
        .unwrap();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let events = parse_sse(std::str::from_utf8(&body).unwrap());
    let (kind, error) = &events[1];
    assert_eq!(kind, "tool-error");
    assert!(error["error"].as_str().unwrap().contains("addToCart"));
    assert_eq!(events.last().unwrap().0, "finish");
}

#[tokio::test]
async fn orphan_tool_turn_is_rejected() {
    let app = app(Vec::new()).await;

    let response = app
        .oneshot(post_chat(json!({
            "messages": [
                { "role": "user", "content": "hi" },
                {
                    "role": "tool",
                    "toolCallId": "never-requested",
                    "toolName": "listMeals",
                    "outcome": { "result": [] }
                }
            ]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_history_is_rejected() {
    let app = app(Vec::new()).await;

    let response = app
        .oneshot(post_chat(json!({ "messages": [] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
