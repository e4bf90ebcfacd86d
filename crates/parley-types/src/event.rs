//! Change events published by the conversation sync engine.
//!
//! A presentation layer subscribes to these to re-render the active chat
//! without polling the engine's log.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::Message;

/// Where a merged message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSource {
    /// Returned by the engine's own insert call.
    Confirmed,
    /// Delivered by the realtime feed.
    Pushed,
}

/// Log-level change in the selected chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A chat finished loading and is ready.
    ChatSelected { chat_id: Uuid, message_count: usize },

    /// A new message entered the log at `index`.
    MessageMerged {
        message: Message,
        index: usize,
        source: MergeSource,
    },

    /// A history page was merged at the head of the log.
    HistoryLoaded { chat_id: Uuid, added: usize },

    /// The log was discarded (switch, failed load, or teardown).
    SelectionCleared,
}
