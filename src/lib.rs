pub mod api;
pub mod chat;
pub mod classify;
pub mod db;
pub mod error;
pub mod format;
pub mod llm;
pub mod prompt;
pub mod suggest;
pub mod util;

use std::sync::Arc;

pub type SharedDB = Arc<db::ChatDB>;

/// Run a blocking DB operation on tokio's blocking thread pool.
///
/// All synchronous ChatDB calls in async context MUST go through this
/// to avoid starving tokio worker threads.
pub async fn db_call<F, T>(db: &SharedDB, f: F) -> Result<T, error::AlgoError>
where
    F: FnOnce(&db::ChatDB) -> T + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| error::AlgoError::Internal(e.to_string()))
}

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDB,
    pub llm: Option<llm::LlmConfig>,
    pub assembler: Arc<prompt::PromptAssembler>,
    pub formatter: Arc<format::Formatter>,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(
        db: SharedDB,
        llm: Option<llm::LlmConfig>,
        assembler: prompt::PromptAssembler,
        formatter: format::Formatter,
    ) -> Self {
        Self {
            db,
            llm,
            assembler: Arc::new(assembler),
            formatter: Arc::new(formatter),
            started_at: std::time::Instant::now(),
        }
    }
}
