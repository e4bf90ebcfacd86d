//! Conversation synchronization.
//!
//! `MessageLog` holds the ordering and dedup rules; `ConversationSyncEngine`
//! feeds it from the three sources that mutate a chat: confirmed sends,
//! realtime pushes, and history pagination.

pub mod engine;
pub mod log;

pub use engine::{ConversationSyncEngine, PageOutcome, ReplySource, SendReceipt, SyncPhase};
pub use log::MessageLog;
