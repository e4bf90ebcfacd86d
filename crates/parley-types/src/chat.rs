//! Chat and message types for Parley.
//!
//! These types model the rows of the backing store: chats owned by a user
//! and the messages exchanged inside them, plus the query shapes used to
//! read message history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Who authored a message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (sender IN ('user', 'ai'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "ai" => Ok(Sender::Ai),
            other => Err(format!("invalid sender: '{other}'")),
        }
    }
}

/// A conversation owned by a single user.
///
/// Only the title is mutable after creation, and nothing in the sync
/// engine changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A single stored message.
///
/// `id` and `created_at` are assigned by the store on insert. Timestamps are
/// monotonic per chat in practice but two rows may share one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

/// A message about to be inserted. The store fills in id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub content: String,
    pub sender: Sender,
}

impl NewMessage {
    pub fn user(chat_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            content: content.into(),
            sender: Sender::User,
        }
    }

    pub fn ai(chat_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            content: content.into(),
            sender: Sender::Ai,
        }
    }
}

/// Sort direction on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Range query over a chat's messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageQuery {
    pub chat_id: Uuid,
    /// Exclusive upper bound on `created_at`.
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub order: SortOrder,
}

impl MessageQuery {
    /// The newest `limit` messages of a chat, newest first.
    pub fn latest(chat_id: Uuid, limit: u32) -> Self {
        Self {
            chat_id,
            before: None,
            limit: Some(limit),
            order: SortOrder::Descending,
        }
    }

    /// Up to `limit` messages strictly older than `before`, newest first.
    pub fn older_than(chat_id: Uuid, before: DateTime<Utc>, limit: u32) -> Self {
        Self {
            chat_id,
            before: Some(before),
            limit: Some(limit),
            order: SortOrder::Descending,
        }
    }
}
