//! Scripted stand-in for the completion endpoint.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use algoai::llm::{LlmConfig, RetryPolicy};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};

#[derive(Clone)]
pub struct Upstream {
    pub url: String,
    script: Arc<Vec<(u16, serde_json::Value)>>,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

impl Upstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> serde_json::Value {
        self.requests().last().cloned().expect("no request recorded")
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.auth.lock().unwrap().clone()
    }

    /// Client config pointing here with millisecond backoff.
    pub fn config(&self) -> LlmConfig {
        LlmConfig::new(&self.url, "test-key", "test-model", Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(1) })
    }
}

/// A successful chat completion envelope.
pub fn completion(text: &str) -> (u16, serde_json::Value) {
    (
        200,
        serde_json::json!({
            "model": "test-model",
            "choices": [{ "message": { "role": "assistant", "content": text } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19 },
        }),
    )
}

pub fn failure(status: u16) -> (u16, serde_json::Value) {
    (status, serde_json::json!({ "error": { "message": "upstream unavailable" } }))
}

async fn handle(
    State(up): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let n = up.hits.fetch_add(1, Ordering::SeqCst);
    up.requests.lock().unwrap().push(body);
    if let Some(v) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        up.auth.lock().unwrap().push(v.to_string());
    }
    // Past the end of the script the last entry repeats.
    let (status, reply) = up
        .script
        .get(n)
        .or_else(|| up.script.last())
        .cloned()
        .unwrap_or_else(|| failure(500));
    (StatusCode::from_u16(status).unwrap(), Json(reply))
}

pub async fn spawn_upstream(script: Vec<(u16, serde_json::Value)>) -> Upstream {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let up = Upstream {
        url: format!("http://{addr}/v1/chat/completions"),
        script: Arc::new(script),
        hits: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
        auth: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(handle))
        .with_state(up.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    up
}
