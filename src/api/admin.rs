//! Suggestions and usage reporting.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AlgoError;
use crate::{db, suggest, AppState};
use super::blocking;

#[derive(Deserialize, Default)]
pub(super) struct SuggestionQuery {
    #[serde(default)]
    category: Option<String>,
}

pub(super) async fn suggestions(Query(q): Query<SuggestionQuery>) -> Json<serde_json::Value> {
    let category = q.category.unwrap_or_default();
    Json(serde_json::json!({
        "category": suggest::pool_name(&category),
        "suggestion": suggest::suggestion(&category),
    }))
}

pub(super) async fn llm_usage(
    State(state): State<AppState>,
) -> Result<Json<db::LlmUsageSummary>, AlgoError> {
    let db = state.db.clone();
    let summary = blocking(move || db.llm_usage_summary()).await??;
    Ok(Json(summary))
}
