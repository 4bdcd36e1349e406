//! SQLite-backed conversation storage. One row per conversation, one row per turn.

mod conversation;
mod usage;

pub use usage::{LlmUsageSummary, UsageBucket};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::Serialize;

use crate::error::AlgoError;

/// Set busy_timeout and foreign keys on every connection handed out by the pool.
/// Foreign keys are per-connection in SQLite, so turn cascades depend on this.
#[derive(Debug)]
struct ConnectionCustomizer;
impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(())
    }
}

type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

pub const MAX_TITLE_LEN: usize = 100;
/// Titles derived from the first user message are clipped to this.
pub const AUTO_TITLE_LEN: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    #[serde(rename = "chat_id")]
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub last_active: i64,
    pub welcome_shown: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub conversation_id: String,
    #[serde(rename = "user")]
    pub user_text: String,
    #[serde(rename = "ai")]
    pub assistant_text: String,
    pub created_at: i64,
}

/// Row shown in the conversation list.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub chat_id: String,
    pub title: String,
    pub last_active: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct Stats {
    pub conversations: usize,
    pub active: usize,
    pub archived: usize,
    pub turns: usize,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    last_active INTEGER NOT NULL,
    welcome_shown INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_conversations_last_active ON conversations(last_active);
CREATE INDEX IF NOT EXISTS idx_conversations_title ON conversations(title);

CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    user_text TEXT NOT NULL DEFAULT '',
    assistant_text TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation_id, id);

CREATE TABLE IF NOT EXISTS llm_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts INTEGER NOT NULL,
    intent TEXT NOT NULL,
    model TEXT NOT NULL,
    prompt_tokens INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    duration_ms INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_llm_usage_ts ON llm_usage(ts);
"#;

/// SQLite-backed conversation store.
pub struct ChatDB {
    pool: Pool<SqliteConnectionManager>,
}

impl ChatDB {
    fn conn(&self) -> Result<PooledConn, AlgoError> {
        self.pool.get().map_err(|e| AlgoError::Internal(format!("pool: {e}")))
    }

    /// Open (or create) a database at the given path.
    /// Pool size defaults to 8 (1 writer + 7 readers in WAL mode).
    pub fn open(path: &str) -> Result<Self, AlgoError> {
        let pool_size = if path == ":memory:" { 2 } else { 8 };
        let manager = if path == ":memory:" {
            // Shared cache so all pool connections see the same in-memory DB.
            // Each test gets a unique name to avoid cross-test pollution.
            let name = uuid::Uuid::new_v4().to_string();
            SqliteConnectionManager::file(format!("file:{name}?mode=memory&cache=shared"))
        } else {
            SqliteConnectionManager::file(path)
        };
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .map_err(|e| AlgoError::Internal(format!("pool: {e}")))?;

        let conn = pool.get().map_err(|e| AlgoError::Internal(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);
        Ok(Self { pool })
    }

    pub fn stats(&self) -> Result<Stats, AlgoError> {
        let conn = self.conn()?;
        let (conversations, active): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(active), 0) FROM conversations",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let turns: i64 = conn.query_row("SELECT COUNT(*) FROM turns", [], |r| r.get(0))?;
        Ok(Stats {
            conversations: conversations as usize,
            active: active as usize,
            archived: (conversations - active).max(0) as usize,
            turns: turns as usize,
        })
    }
}

fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get("id")?,
        title: row.get("title")?,
        created_at: row.get("created_at")?,
        last_active: row.get("last_active")?,
        welcome_shown: row.get::<_, i64>("welcome_shown")? != 0,
        active: row.get::<_, i64>("active")? != 0,
    })
}

fn row_to_turn(row: &rusqlite::Row) -> rusqlite::Result<Turn> {
    Ok(Turn {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        user_text: row.get("user_text")?,
        assistant_text: row.get("assistant_text")?,
        created_at: row.get("created_at")?,
    })
}
