//! Per-user rolling conversation window with idle expiry
//!
//! A conversation expires as a unit: every append moves the deadline of
//! all of that user's turns to `now + ttl`. Expired turns are purged when
//! they are read, and by the optional gateway sweep.

use super::types::{ConversationTurn, Role};
use crate::config::ConversationConfig;
use crate::error::{Error, Result};
use crate::storage::{from_millis, to_millis, Database};
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

/// Durable conversation store backed by SQLite
pub struct ConversationStore {
    db: Database,
    ttl: Duration,
    max_turns: usize,
}

impl ConversationStore {
    /// Create a store over an opened database
    pub fn new(db: Database, config: &ConversationConfig) -> Self {
        Self {
            db,
            ttl: Duration::seconds(config.ttl_secs as i64),
            max_turns: config.max_turns.max(1),
        }
    }

    /// Append a turn to the user's conversation
    pub async fn append(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ConversationTurn> {
        self.append_at(user_id, role, content, Utc::now()).await
    }

    /// Append a turn as of `now`
    pub async fn append_at(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<ConversationTurn> {
        // Stored at millisecond precision
        let now = from_millis(to_millis(now));
        let expires_at = now + self.ttl;
        let mut conn = self.db.conn().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO conversation_turns (user_id, role, content, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                role.as_str(),
                content,
                to_millis(now),
                to_millis(expires_at)
            ],
        )?;
        tx.execute(
            "UPDATE conversation_turns SET expires_at = ?1 WHERE user_id = ?2",
            params![to_millis(expires_at), user_id],
        )?;
        let trimmed = tx.execute(
            "DELETE FROM conversation_turns
             WHERE user_id = ?1 AND seq NOT IN (
                 SELECT seq FROM conversation_turns
                 WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2
             )",
            params![user_id, self.max_turns as i64],
        )?;
        tx.commit()?;

        if trimmed > 0 {
            tracing::debug!(user = %user_id, trimmed, "Trimmed conversation window");
        }

        Ok(ConversationTurn {
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
            expires_at,
        })
    }

    /// Read the user's live turns, oldest first
    pub async fn read(&self, user_id: &str) -> Result<Vec<ConversationTurn>> {
        self.read_at(user_id, Utc::now()).await
    }

    /// Read as of `now`, purging the user's expired turns first
    pub async fn read_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<ConversationTurn>> {
        let conn = self.db.conn().await;

        let purged = conn.execute(
            "DELETE FROM conversation_turns WHERE user_id = ?1 AND expires_at < ?2",
            params![user_id, to_millis(now)],
        )?;
        if purged > 0 {
            tracing::debug!(user = %user_id, purged, "Conversation expired");
        }

        let mut stmt = conn.prepare(
            "SELECT role, content, created_at, expires_at FROM conversation_turns
             WHERE user_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content, created_at, expires_at) = row?;
            turns.push(ConversationTurn {
                user_id: user_id.to_string(),
                role: role.parse().map_err(Error::Internal)?,
                content,
                created_at: from_millis(created_at),
                expires_at: from_millis(expires_at),
            });
        }
        Ok(turns)
    }

    /// Drop the user's conversation, returning how many turns were removed
    pub async fn clear(&self, user_id: &str) -> Result<usize> {
        let conn = self.db.conn().await;
        Ok(conn.execute(
            "DELETE FROM conversation_turns WHERE user_id = ?1",
            params![user_id],
        )?)
    }

    /// Remove expired turns for every user
    pub async fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.db.conn().await;
        Ok(conn.execute(
            "DELETE FROM conversation_turns WHERE expires_at < ?1",
            params![to_millis(now)],
        )?)
    }
}
