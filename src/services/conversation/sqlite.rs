use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params};

use super::{ConversationStore, check_exchange, last_exchange_len};
use crate::error::ConversationError;
use crate::models::{ConversationTurn, Role};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_turns_user ON turns(user_id, id);
"#;

/// Durable store; histories survive restarts.
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
    max_turns: usize,
}

impl SqliteConversationStore {
    pub fn open(path: &Path, max_turns: usize) -> Result<Self, ConversationError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConversationError::Storage(e.to_string()))?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            max_turns: max_turns.max(1),
        })
    }

    fn load(conn: &Connection, user_id: &str) -> Result<Vec<(i64, ConversationTurn)>, ConversationError> {
        let mut stmt = conn.prepare(
            "SELECT id, role, content, timestamp FROM turns WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (id, role, content, timestamp) = row?;
            let role: Role = role.parse().map_err(ConversationError::InvalidTurn)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| ConversationError::InvalidTurn(e.to_string()))?
                .with_timezone(&Utc);
            turns.push((
                id,
                ConversationTurn {
                    role,
                    content,
                    timestamp,
                },
            ));
        }
        Ok(turns)
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn history(&self, user_id: &str) -> Result<Vec<ConversationTurn>, ConversationError> {
        let conn = self.conn.lock();
        Ok(Self::load(&conn, user_id)?
            .into_iter()
            .map(|(_, turn)| turn)
            .collect())
    }

    async fn append_exchange(
        &self,
        user_id: &str,
        user: ConversationTurn,
        assistant: ConversationTurn,
    ) -> Result<(), ConversationError> {
        check_exchange(&user, &assistant)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for turn in [&user, &assistant] {
            tx.execute(
                "INSERT INTO turns (user_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
                params![
                    user_id,
                    turn.role.to_string(),
                    turn.content,
                    turn.timestamp.to_rfc3339()
                ],
            )?;
        }
        // Keep only the newest max_turns rows for this user.
        tx.execute(
            "DELETE FROM turns WHERE user_id = ?1 AND id NOT IN (
                SELECT id FROM turns WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2
            )",
            params![user_id, self.max_turns as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn delete_last_exchange(&self, user_id: &str) -> Result<bool, ConversationError> {
        let conn = self.conn.lock();
        let rows = Self::load(&conn, user_id)?;
        let turns: Vec<ConversationTurn> = rows.iter().map(|(_, t)| t.clone()).collect();

        let remove = last_exchange_len(&turns);
        if remove == 0 {
            return Ok(false);
        }
        let first_removed = rows[rows.len() - remove].0;
        conn.execute(
            "DELETE FROM turns WHERE user_id = ?1 AND id >= ?2",
            params![user_id, first_removed],
        )?;
        Ok(true)
    }

    async fn clear_user(&self, user_id: &str) -> Result<(), ConversationError> {
        self.conn
            .lock()
            .execute("DELETE FROM turns WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), ConversationError> {
        self.conn.lock().execute("DELETE FROM turns", [])?;
        Ok(())
    }

    fn max_turns(&self) -> usize {
        self.max_turns
    }
}
