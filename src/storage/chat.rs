//! Conversation memory: per-session message log.

use sqlx::{Row, SqliteConnection};
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use super::{Storage, from_millis, now_millis};
use crate::error::{MonitorError, Result};
use crate::model::{ChatMessage, Role};

/// Number of prior messages replayed into a new assistant request.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

impl Storage {
    /// Append a message to a session's log.
    pub async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage> {
        let mut conn = self.pool.acquire().await?;
        insert_message(&mut *conn, session_id, role, content).await
    }

    /// Append a question and its reply as one unit.
    ///
    /// Both messages are written in one transaction, user first, so a session
    /// never holds a question without its answer.
    pub async fn append_exchange(
        &self,
        session_id: &str,
        query: &str,
        reply: &str,
    ) -> Result<(ChatMessage, ChatMessage)> {
        let mut tx = self.pool.begin().await?;
        let question = insert_message(&mut *tx, session_id, Role::User, query).await?;
        let answer = insert_message(&mut *tx, session_id, Role::Assistant, reply).await?;
        tx.commit().await?;

        Ok((question, answer))
    }

    /// The latest `limit` messages of a session, oldest first.
    ///
    /// This is a sliding window: once a session grows past `limit`, the
    /// earliest messages drop out.
    pub async fn chat_history(&self, session_id: &str, limit: u32) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, role, content, ts
            FROM (
                SELECT id, session_id, role, content, ts
                FROM chat_history
                WHERE session_id = ?
                ORDER BY ts DESC, id DESC
                LIMIT ?
            )
            ORDER BY ts ASC, id ASC
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }
}

async fn insert_message(
    conn: &mut SqliteConnection,
    session_id: &str,
    role: Role,
    content: &str,
) -> Result<ChatMessage> {
    let (ts, timestamp) = now_millis();

    sqlx::query(
        r#"
        INSERT INTO chat_history (session_id, role, content, ts)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(ts)
    .execute(&mut *conn)
    .await?;

    // Content is operator text; log its size only.
    debug!(session_id, role = %role, content_len = content.len(), "Chat message stored");

    Ok(ChatMessage {
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        timestamp,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage> {
    let role: String = row.get("role");
    let role = role
        .parse::<Role>()
        .map_err(|e| MonitorError::Storage(sqlx::Error::Decode(e.into())))?;

    Ok(ChatMessage {
        session_id: row.get("session_id"),
        role,
        content: row.get("content"),
        timestamp: from_millis(row.get("ts")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_is_chronological() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage.append_message("s1", Role::User, "first").await.unwrap();
        storage.append_message("s1", Role::Assistant, "second").await.unwrap();
        storage.append_message("s2", Role::User, "other").await.unwrap();
        storage.append_message("s1", Role::User, "third").await.unwrap();

        let history = storage.chat_history("s1", DEFAULT_HISTORY_LIMIT).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(history[1].role, Role::Assistant);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_history_keeps_latest_window() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        for i in 0..15 {
            storage
                .append_message("s1", Role::User, &format!("m{i}"))
                .await
                .unwrap();
        }

        let history = storage.chat_history("s1", 4).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m11", "m12", "m13", "m14"]);
    }

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        assert!(storage.chat_history("nobody", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_is_stored_in_order() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage.append_exchange("s1", "question", "answer").await.unwrap();

        let history = storage.chat_history("s1", DEFAULT_HISTORY_LIMIT).await.unwrap();
        let turns: Vec<(Role, &str)> = history
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(turns, vec![(Role::User, "question"), (Role::Assistant, "answer")]);
    }

    #[tokio::test]
    async fn test_failed_exchange_leaves_no_question() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        sqlx::query(
            r#"
            CREATE TRIGGER reject_assistant BEFORE INSERT ON chat_history
            WHEN NEW.role = 'assistant'
            BEGIN SELECT RAISE(ABORT, 'assistant rows rejected'); END
            "#,
        )
        .execute(&storage.pool)
        .await
        .unwrap();

        let result = storage.append_exchange("s1", "question", "answer").await;
        assert!(matches!(result, Err(MonitorError::Storage(_))));
        assert!(storage.chat_history("s1", 10).await.unwrap().is_empty());
    }
}
