use axum::http::StatusCode;
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum AlgoError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("query exceeds maximum length")]
    QueryTooLong,

    #[error("no chat_id provided")]
    MissingChatId,

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("chat not found")]
    NotFound,

    #[error("completion API not configured (set ALGOAI_LLM_KEY)")]
    LlmNotConfigured,

    #[error("completion backend error: {0}")]
    LlmBackend(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AlgoError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::LlmNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::LlmBackend(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl axum::response::IntoResponse for AlgoError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
