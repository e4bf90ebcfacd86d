use thiserror::Error;

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from a realtime change feed.
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    #[error("subscription failed: {0}")]
    SubscribeFailed(String),

    #[error("unknown subscription handle {0}")]
    UnknownHandle(u64),
}

/// Errors from a response generator. Always recoverable for a chat turn.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("rate limited")]
    RateLimited,

    #[error("provider returned no text")]
    EmptyResponse,

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Errors surfaced by the conversation sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("chat not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("a conflicting operation is already in flight for this chat")]
    Busy,

    #[error("superseded by a newer chat selection")]
    Superseded,
}
