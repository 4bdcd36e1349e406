//! Conversation handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::chat::{self, QueryReply, QueryRequest};
use crate::error::AlgoError;
use crate::{suggest, AppState};
use super::{blocking, require_chat_id};

const DEFAULT_PAGE_LIMIT: usize = 10;
const MAX_PAGE_LIMIT: usize = 100;

pub(super) async fn do_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryReply>, AlgoError> {
    Ok(Json(chat::submit_query(&state, req).await?))
}

/// Start a conversation and store its welcome line as the first turn.
pub(super) async fn new_chat(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let chat_id = uuid::Uuid::new_v4().to_string();
    let persona = state.assembler.persona().name.clone();
    let db = state.db.clone();
    let id = chat_id.clone();
    let (greeting, returning) = blocking(move || {
        let returning = !db.list_conversations()?.is_empty();
        let greeting = suggest::welcome_line(&persona, returning);
        db.create_conversation(&id, "")?;
        db.append_turn(&id, "", &greeting)?;
        db.set_welcome_shown(&id)?;
        Ok::<_, AlgoError>((greeting, returning))
    })
    .await??;

    info!(chat_id = %chat_id, returning, "new chat");
    Ok(Json(serde_json::json!({ "chat_id": chat_id, "greeting": greeting })))
}

#[derive(Deserialize, Default)]
pub(super) struct ChatIdBody {
    #[serde(default, alias = "conversation_id")]
    chat_id: Option<String>,
}

pub(super) async fn reset_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatIdBody>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let chat_id = require_chat_id(body.chat_id)?;
    let db = state.db.clone();
    let id = chat_id.clone();
    let removed = blocking(move || db.delete_conversation(&id)).await??;
    info!(chat_id = %chat_id, removed, "chat reset");
    Ok(Json(serde_json::json!({
        "message": format!("Chat {chat_id} has been reset."),
        "chat_id": chat_id,
    })))
}

#[derive(Deserialize)]
pub(super) struct CurrentChatQuery {
    #[serde(default, alias = "conversation_id")]
    chat_id: Option<String>,
}

pub(super) async fn get_current_chat(
    State(state): State<AppState>,
    Query(q): Query<CurrentChatQuery>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let chat_id = require_chat_id(q.chat_id)?;
    let db = state.db.clone();
    let id = chat_id.clone();
    let (conversation, history) = blocking(move || {
        Ok::<_, AlgoError>((db.get_conversation(&id)?, db.turns(&id)?))
    })
    .await??;

    let title = conversation
        .as_ref()
        .map(|c| c.title.clone())
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            history
                .iter()
                .map(|t| t.user_text.as_str())
                .find(|u| !u.is_empty())
                .map(|u| crate::util::clip_chars(u, crate::db::AUTO_TITLE_LEN))
        })
        .unwrap_or_else(|| "Untitled".into());

    Ok(Json(serde_json::json!({
        "chat_id": chat_id,
        "title": title,
        "history": history,
        "last_active": conversation.map(|c| c.last_active),
    })))
}

pub(super) async fn get_chat_history(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let db = state.db.clone();
    let chats = blocking(move || db.list_conversations()).await??;
    Ok(Json(serde_json::json!({ "chats": chats })))
}

#[derive(Deserialize)]
pub(super) struct PageQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

pub(super) async fn get_chat(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);

    let db = state.db.clone();
    let (conversation, history, total) = blocking(move || {
        let Some(c) = db.find_conversation(&identifier)? else {
            return Err(AlgoError::NotFound);
        };
        let history = db.turns_page(&c.id, page, limit)?;
        let total = db.turn_count(&c.id)?;
        Ok::<_, AlgoError>((c, history, total))
    })
    .await??;

    Ok(Json(serde_json::json!({
        "chat_id": conversation.id,
        "title": conversation.title,
        "history": history,
        "last_active": conversation.last_active,
        "total_pages": total.div_ceil(limit),
        "current_page": page,
    })))
}

#[derive(Deserialize, Default)]
pub(super) struct UpdateChatBody {
    #[serde(default)]
    user_msg: String,
    #[serde(default)]
    ai_msg: String,
    #[serde(default)]
    title: Option<String>,
}

/// Append a turn supplied by the client and/or set the title.
pub(super) async fn update_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(body): Json<UpdateChatBody>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let chat_id = require_chat_id(Some(chat_id))?;
    let title = body.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    let db = state.db.clone();
    let id = chat_id.clone();
    let new_title = title.clone();
    blocking(move || {
        db.ensure_conversation(&id)?;
        if !body.user_msg.trim().is_empty() || !body.ai_msg.trim().is_empty() {
            db.append_turn(&id, &body.user_msg, &body.ai_msg)?;
        }
        if let Some(t) = new_title {
            db.set_title(&id, &t)?;
        }
        Ok::<_, AlgoError>(())
    })
    .await??;

    Ok(Json(serde_json::json!({
        "message": format!("Chat {chat_id} updated successfully!"),
        "chat_id": chat_id,
        "title": title,
    })))
}

#[derive(Deserialize)]
pub(super) struct TitleBody {
    #[serde(default, alias = "conversation_id")]
    chat_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

pub(super) async fn update_chat_title(
    State(state): State<AppState>,
    Json(body): Json<TitleBody>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let chat_id = require_chat_id(body.chat_id)?;
    let title = body
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(AlgoError::EmptyTitle)?;

    let db = state.db.clone();
    let id = chat_id.clone();
    let updated = blocking(move || db.set_title(&id, &title)).await??;
    if !updated {
        return Err(AlgoError::NotFound);
    }
    Ok(Json(serde_json::json!({
        "message": "Chat title updated successfully",
        "chat_id": chat_id,
    })))
}

pub(super) async fn clear_chats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let db = state.db.clone();
    let removed = blocking(move || db.delete_all()).await??;
    info!(removed, "all chats cleared");
    Ok(Json(serde_json::json!({
        "message": "All chat history cleared successfully.",
        "removed": removed,
    })))
}

pub(super) async fn delete_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatIdBody>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let chat_id = require_chat_id(body.chat_id)?;
    let db = state.db.clone();
    let id = chat_id.clone();
    if !blocking(move || db.delete_conversation(&id)).await?? {
        return Err(AlgoError::NotFound);
    }
    Ok(Json(serde_json::json!({
        "message": format!("Chat {chat_id} deleted successfully."),
        "chat_id": chat_id,
    })))
}

pub(super) async fn archive_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatIdBody>,
) -> Result<Json<serde_json::Value>, AlgoError> {
    let chat_id = require_chat_id(body.chat_id)?;
    let db = state.db.clone();
    let id = chat_id.clone();
    let active = blocking(move || db.toggle_archived(&id))
        .await??
        .ok_or(AlgoError::NotFound)?;
    let verb = if active { "unarchived" } else { "archived" };
    Ok(Json(serde_json::json!({
        "message": format!("Chat {chat_id} {verb} successfully"),
        "chat_id": chat_id,
        "active": active,
    })))
}
