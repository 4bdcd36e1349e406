use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::AlgoError;
use crate::{db, AppState};

mod admin;
mod chat;

use admin::*;
use chat::*;

/// Run a blocking closure on the spawn_blocking pool and map JoinError.
async fn blocking<T, F>(f: F) -> Result<T, AlgoError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AlgoError::Internal(e.to_string()))
}

/// Trimmed, non-empty chat id from a request body.
fn require_chat_id(id: Option<String>) -> Result<String, AlgoError> {
    id.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(AlgoError::MissingChatId)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_only))
        .route("/test", get(test_alive))
        .route("/query", post(do_query))
        .route("/new_chat", post(new_chat))
        .route("/reset_chat", post(reset_chat))
        .route("/get_current_chat", get(get_current_chat))
        .route("/get_chat_history", get(get_chat_history))
        .route("/get_chat/{identifier}", get(get_chat))
        .route("/update_chat/{chat_id}", post(update_chat))
        .route("/update_chat_title", post(update_chat_title))
        .route("/clear_chats", post(clear_chats))
        .route("/delete_chat", post(delete_chat))
        .route("/archive_chat", post(archive_chat))
        .route("/suggestions", get(suggestions))
        .route("/llm-usage", get(llm_usage))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Shared health data (without endpoints) used by both `/` and `/health`.
async fn health_data(state: &AppState) -> serde_json::Value {
    let db = state.db.clone();
    let stats = blocking(move || db.stats())
        .await
        .and_then(|r| r)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stats unavailable");
            db::Stats::default()
        });

    serde_json::json!({
        "name": "algoai",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "llm_enabled": state.llm.is_some(),
        "model": state.llm.as_ref().map(|c| c.model.clone()),
        "history_limit": state.assembler.history_limit(),
        "stats": stats,
    })
}

/// GET /: welcome message, health data and the endpoint list.
async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut data = health_data(&state).await;
    if let Some(obj) = data.as_object_mut() {
        obj.insert(
            "message".to_string(),
            serde_json::json!(format!(
                "Welcome to {}! Use /query to begin.",
                state.assembler.persona().name
            )),
        );
        obj.insert("endpoints".to_string(), serde_json::json!({
            "GET /": "index with health data + endpoint list",
            "GET /health": "health only (uptime, conversation counts, llm status)",
            "GET /test": "liveness check",
            "POST /query": "ask a question (body: {query, chat_id?, deep_dive?})",
            "POST /new_chat": "start a conversation with a welcome line",
            "POST /reset_chat": "delete one conversation (body: {chat_id})",
            "GET /get_current_chat?chat_id=X": "full history of one conversation",
            "GET /get_chat_history": "list active conversations",
            "GET /get_chat/:identifier?page=1&limit=10": "one conversation by id or title, paginated",
            "POST /update_chat/:chat_id": "append a turn and/or set the title (body: {user_msg, ai_msg, title?})",
            "POST /update_chat_title": "rename (body: {chat_id, title})",
            "POST /clear_chats": "delete every conversation",
            "POST /delete_chat": "delete one conversation (body: {chat_id})",
            "POST /archive_chat": "toggle archived (body: {chat_id})",
            "GET /suggestions?category=X": "rotating suggested prompt",
            "GET /llm-usage": "completion usage totals",
        }));
    }
    Json(data)
}

/// GET /health: health data only (no endpoint list).
async fn health_only(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(health_data(&state).await)
}

async fn test_alive() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Backend is operational!" }))
}
