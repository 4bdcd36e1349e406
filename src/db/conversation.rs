//! Conversation and turn persistence.

use rusqlite::{params, OptionalExtension};

use super::*;
use crate::util::{clip_chars, now_ms};

const CONVERSATION_COLS: &str = "id, title, created_at, last_active, welcome_shown, active";
const TURN_COLS: &str = "id, conversation_id, user_text, assistant_text, created_at";

impl ChatDB {
    /// Insert a new conversation. Fails if the id is taken.
    pub fn create_conversation(&self, id: &str, title: &str) -> Result<Conversation, AlgoError> {
        let conn = self.conn()?;
        let now = now_ms();
        conn.execute(
            "INSERT INTO conversations (id, title, created_at, last_active) VALUES (?1, ?2, ?3, ?3)",
            params![id, clip_chars(title, MAX_TITLE_LEN), now],
        )?;
        drop(conn);
        self.get_conversation(id)?
            .ok_or_else(|| AlgoError::Internal("conversation vanished after insert".into()))
    }

    /// Create the conversation if it does not exist yet, then return it.
    pub fn ensure_conversation(&self, id: &str) -> Result<Conversation, AlgoError> {
        let conn = self.conn()?;
        let now = now_ms();
        conn.execute(
            "INSERT OR IGNORE INTO conversations (id, created_at, last_active) VALUES (?1, ?2, ?2)",
            params![id, now],
        )?;
        drop(conn);
        self.get_conversation(id)?
            .ok_or_else(|| AlgoError::Internal("conversation vanished after insert".into()))
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, AlgoError> {
        let conn = self.conn()?;
        let c = conn
            .query_row(
                &format!("SELECT {CONVERSATION_COLS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )
            .optional()?;
        Ok(c)
    }

    /// Look up by id first, then by exact title (most recently active wins).
    pub fn find_conversation(&self, identifier: &str) -> Result<Option<Conversation>, AlgoError> {
        if let Some(c) = self.get_conversation(identifier)? {
            return Ok(Some(c));
        }
        let conn = self.conn()?;
        let c = conn
            .query_row(
                &format!(
                    "SELECT {CONVERSATION_COLS} FROM conversations WHERE title = ?1 \
                     ORDER BY last_active DESC LIMIT 1"
                ),
                params![identifier],
                row_to_conversation,
            )
            .optional()?;
        Ok(c)
    }

    /// Append one exchange. Creates the conversation when missing, bumps
    /// `last_active`, and fills an empty title from the user text.
    pub fn append_turn(&self, id: &str, user_text: &str, assistant_text: &str) -> Result<Turn, AlgoError> {
        let user_text = user_text.trim();
        let assistant_text = assistant_text.trim();
        let now = now_ms();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO conversations (id, created_at, last_active) VALUES (?1, ?2, ?2)",
            params![id, now],
        )?;
        tx.execute(
            "INSERT INTO turns (conversation_id, user_text, assistant_text, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![id, user_text, assistant_text, now],
        )?;
        let turn_id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE conversations SET last_active = ?2 WHERE id = ?1",
            params![id, now],
        )?;
        if !user_text.is_empty() {
            tx.execute(
                "UPDATE conversations SET title = ?2 WHERE id = ?1 AND title = ''",
                params![id, clip_chars(user_text, AUTO_TITLE_LEN)],
            )?;
        }
        tx.commit()?;

        Ok(Turn {
            id: turn_id,
            conversation_id: id.to_string(),
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
            created_at: now,
        })
    }

    /// All turns of a conversation, oldest first.
    pub fn turns(&self, id: &str) -> Result<Vec<Turn>, AlgoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TURN_COLS} FROM turns WHERE conversation_id = ?1 ORDER BY id ASC"
        ))?;
        let turns = stmt
            .query_map(params![id], row_to_turn)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    /// The most recent `limit` turns, oldest first.
    pub fn recent_turns(&self, id: &str, limit: usize) -> Result<Vec<Turn>, AlgoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TURN_COLS} FROM turns WHERE conversation_id = ?1 ORDER BY id DESC LIMIT ?2"
        ))?;
        let mut turns = stmt
            .query_map(params![id, limit as i64], row_to_turn)?
            .collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    /// One page of turns (1-based page), oldest first.
    pub fn turns_page(&self, id: &str, page: usize, limit: usize) -> Result<Vec<Turn>, AlgoError> {
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TURN_COLS} FROM turns WHERE conversation_id = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3"
        ))?;
        let turns = stmt
            .query_map(params![id, limit as i64, offset as i64], row_to_turn)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    pub fn turn_count(&self, id: &str) -> Result<usize, AlgoError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM turns WHERE conversation_id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// Active conversations that have at least one turn, most recent first.
    /// Untitled ones fall back to their first user message, then to a short id.
    pub fn list_conversations(&self) -> Result<Vec<ConversationSummary>, AlgoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.title, c.last_active, \
                    (SELECT t.user_text FROM turns t \
                     WHERE t.conversation_id = c.id AND t.user_text != '' \
                     ORDER BY t.id ASC LIMIT 1) AS first_user \
             FROM conversations c \
             WHERE c.active = 1 AND EXISTS (SELECT 1 FROM turns t WHERE t.conversation_id = c.id) \
             ORDER BY c.last_active DESC, c.rowid DESC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(chat_id, title, last_active, first_user)| {
                let title = if !title.trim().is_empty() {
                    clip_chars(&title, MAX_TITLE_LEN)
                } else if let Some(first) = first_user.filter(|s| !s.trim().is_empty()) {
                    clip_chars(&first, AUTO_TITLE_LEN)
                } else {
                    format!("Chat {}", chat_id.chars().take(8).collect::<String>())
                };
                ConversationSummary { chat_id, title, last_active }
            })
            .collect())
    }

    /// Rename. Returns false when the conversation does not exist.
    pub fn set_title(&self, id: &str, title: &str) -> Result<bool, AlgoError> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE conversations SET title = ?2, last_active = ?3 WHERE id = ?1",
            params![id, clip_chars(title, MAX_TITLE_LEN), now_ms()],
        )?;
        Ok(n > 0)
    }

    pub fn set_welcome_shown(&self, id: &str) -> Result<(), AlgoError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE conversations SET welcome_shown = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Flip active/archived. Returns the new `active` value, or None if missing.
    pub fn toggle_archived(&self, id: &str) -> Result<Option<bool>, AlgoError> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE conversations SET active = 1 - active WHERE id = ?1",
            params![id],
        )?;
        if n == 0 {
            return Ok(None);
        }
        let active: i64 = conn.query_row(
            "SELECT active FROM conversations WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(Some(active != 0))
    }

    /// Delete a conversation and its turns. Returns false if it did not exist.
    pub fn delete_conversation(&self, id: &str) -> Result<bool, AlgoError> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    /// Delete every conversation. Returns how many were removed.
    pub fn delete_all(&self) -> Result<usize, AlgoError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM turns", [])?;
        let n = tx.execute("DELETE FROM conversations", [])?;
        tx.commit()?;
        Ok(n)
    }
}
