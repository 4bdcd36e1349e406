//! The query pipeline: classify, assemble, complete, format, persist.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classify::Intent;
use crate::error::AlgoError;
use crate::llm::{self, Completion};
use crate::prompt::{Assembly, PromptContext};
use crate::{db_call, AppState};

pub const MAX_QUERY_CHARS: usize = 8192;
const MAX_CHAT_ID_LEN: usize = 128;

#[derive(Debug, Deserialize, Default)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, alias = "conversation_id")]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub deep_dive: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct QueryReply {
    pub response: String,
    #[serde(rename = "chat_id")]
    pub conversation_id: String,
    pub intent: Intent,
}

/// Use the caller's id when it is usable, otherwise mint one.
fn resolve_chat_id(requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(id) if !id.is_empty() && id.len() <= MAX_CHAT_ID_LEN => id.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

/// Answer one prompt within a conversation.
///
/// Only input validation fails. Completion and storage problems are logged
/// and surface as a displayable reply so the caller always gets an answer.
pub async fn submit_query(state: &AppState, req: QueryRequest) -> Result<QueryReply, AlgoError> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err(AlgoError::EmptyQuery);
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(AlgoError::QueryTooLong);
    }

    let chat_id = resolve_chat_id(req.chat_id.as_deref());
    let deep_dive = req.deep_dive.unwrap_or(false);

    let id = chat_id.clone();
    match db_call(&state.db, move |db| db.ensure_conversation(&id)).await {
        Ok(Err(e)) | Err(e) => warn!(error = %e, chat_id = %chat_id, "ensure conversation failed"),
        Ok(Ok(_)) => {}
    }

    let assembler = state.assembler.clone();
    let (id, q) = (chat_id.clone(), query.clone());
    let assembled = db_call(&state.db, move |db| assembler.assemble(db, &id, &q, deep_dive)).await;
    let assembly = assembly_or_fresh(state, assembled, &chat_id, &query, deep_dive);
    let intent = assembly.intent();

    // Only a delivered completion counts as the welcome.
    let mut welcomed = false;
    let response = match assembly {
        Assembly::Reply { text, .. } => text,
        Assembly::Call(plan) => {
            let raw = match &state.llm {
                None => llm::not_configured_reply(),
                Some(cfg) => match llm::complete(cfg, &plan).await {
                    Completion::Ok(result) => {
                        record_usage(state, intent, &result).await;
                        welcomed = intent == Intent::Greeting;
                        result.content
                    }
                    other => other.into_reply(),
                },
            };
            state.formatter.format(&raw)
        }
    };

    let (id, q, a) = (chat_id.clone(), query.clone(), response.clone());
    match db_call(&state.db, move |db| db.append_turn(&id, &q, &a)).await {
        Ok(Err(e)) | Err(e) => warn!(error = %e, chat_id = %chat_id, "saving turn failed"),
        Ok(Ok(_)) => {}
    }

    if welcomed {
        let id = chat_id.clone();
        match db_call(&state.db, move |db| db.set_welcome_shown(&id)).await {
            Ok(Err(e)) | Err(e) => warn!(error = %e, chat_id = %chat_id, "marking welcome failed"),
            Ok(Ok(())) => {}
        }
    }

    info!(
        chat_id = %chat_id,
        intent = %intent,
        query_chars = query.chars().count(),
        response_chars = response.chars().count(),
        "query answered"
    );

    Ok(QueryReply { response, conversation_id: chat_id, intent })
}

/// A failed store task still gets an answer, built with no history.
fn assembly_or_fresh(
    state: &AppState,
    assembled: Result<Assembly, AlgoError>,
    chat_id: &str,
    query: &str,
    deep_dive: bool,
) -> Assembly {
    assembled.unwrap_or_else(|e| {
        warn!(error = %e, chat_id, "assembly failed, answering without context");
        state.assembler.build(&PromptContext::default(), query, deep_dive)
    })
}

async fn record_usage(state: &AppState, intent: Intent, result: &llm::LlmResult) {
    let (prompt_tokens, completion_tokens) = result
        .usage
        .as_ref()
        .map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));
    let model = result.model.clone();
    let duration_ms = result.duration_ms;
    let logged = db_call(&state.db, move |db| {
        db.log_llm_call(intent.as_str(), &model, prompt_tokens, completion_tokens, duration_ms)
    })
    .await;
    if let Ok(Err(e)) | Err(e) = logged {
        warn!(error = %e, "usage logging failed");
    }
}
