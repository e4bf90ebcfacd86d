//! SQLite chat/message persistence.
//!
//! Implements `PersistenceClient` from `parley-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, and UUIDs/datetimes
//! stored as TEXT. Every inserted message is published to the attached
//! change feed (if any) after the insert commits.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parley_core::chat::repository::PersistenceClient;
use parley_types::chat::{Chat, Message, MessageQuery, NewMessage, Sender, SortOrder};
use parley_types::error::RepositoryError;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::pool::DatabasePool;
use crate::realtime::feed::BroadcastChangeFeed;

/// SQLite-backed implementation of `PersistenceClient`.
pub struct SqlitePersistenceClient {
    pool: DatabasePool,
    feed: Option<Arc<BroadcastChangeFeed>>,
}

impl SqlitePersistenceClient {
    /// Create a new client backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool, feed: None }
    }

    /// Publish inserted messages to `feed`.
    pub fn with_change_feed(mut self, feed: Arc<BroadcastChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct ChatRow {
    id: String,
    user_id: String,
    title: String,
    created_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_chat(self) -> Result<Chat, RepositoryError> {
        Ok(Chat {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    chat_id: String,
    content: String,
    sender: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            content: row.try_get("content")?,
            sender: row.try_get("sender")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let sender = self
            .sender
            .parse::<Sender>()
            .map_err(RepositoryError::Query)?;

        Ok(Message {
            id: parse_uuid(&self.id)?,
            chat_id: parse_uuid(&self.chat_id)?,
            content: self.content,
            sender,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC3339 so TEXT comparison orders chronologically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at the precision that survives a round trip.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// PersistenceClient impl
// ---------------------------------------------------------------------------

impl PersistenceClient for SqlitePersistenceClient {
    async fn fetch_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT id, user_id, title, created_at FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let chat_row = ChatRow::from_row(&row).map_err(query_err)?;
                Ok(Some(chat_row.into_chat()?))
            }
            None => Ok(None),
        }
    }

    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, RepositoryError> {
        let mut sql = String::from(
            "SELECT id, chat_id, content, sender, created_at FROM messages WHERE chat_id = ?",
        );
        if query.before.is_some() {
            sql.push_str(" AND created_at < ?");
        }
        sql.push_str(match query.order {
            SortOrder::Ascending => " ORDER BY created_at ASC, rowid ASC",
            SortOrder::Descending => " ORDER BY created_at DESC, rowid DESC",
        });
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql).bind(query.chat_id.to_string());
        if let Some(before) = &query.before {
            q = q.bind(format_datetime(before));
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit as i64);
        }

        let rows = q.fetch_all(&self.pool.reader).await.map_err(query_err)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row = MessageRow::from_row(row).map_err(query_err)?;
            messages.push(msg_row.into_message()?);
        }
        Ok(messages)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        let stored = Message {
            id: Uuid::now_v7(),
            chat_id: message.chat_id,
            content: message.content.clone(),
            sender: message.sender,
            created_at: now(),
        };

        sqlx::query(
            "INSERT INTO messages (id, chat_id, content, sender, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(stored.id.to_string())
        .bind(stored.chat_id.to_string())
        .bind(&stored.content)
        .bind(stored.sender.to_string())
        .bind(format_datetime(&stored.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        debug!(message_id = %stored.id, chat_id = %stored.chat_id, sender = %stored.sender, "message stored");

        if let Some(feed) = &self.feed {
            feed.publish(&stored);
        }
        Ok(stored)
    }

    async fn insert_chat(&self, user_id: &Uuid, title: &str) -> Result<Chat, RepositoryError> {
        let chat = Chat {
            id: Uuid::now_v7(),
            user_id: *user_id,
            title: title.to_string(),
            created_at: now(),
        };

        sqlx::query("INSERT INTO chats (id, user_id, title, created_at) VALUES (?, ?, ?, ?)")
            .bind(chat.id.to_string())
            .bind(chat.user_id.to_string())
            .bind(&chat.title)
            .bind(format_datetime(&chat.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(chat)
    }

    async fn fetch_chats(&self, user_id: &Uuid) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, created_at FROM chats WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            let chat_row = ChatRow::from_row(row).map_err(query_err)?;
            chats.push(chat_row.into_chat()?);
        }
        Ok(chats)
    }
}
