//! PersistenceClient trait definition.
//!
//! Provides CRUD operations for chats and messages against the backing
//! store, which is the single source of truth for both.

use parley_types::chat::{Chat, Message, MessageQuery, NewMessage};
use parley_types::error::RepositoryError;
use uuid::Uuid;

/// Port to the chat/message store.
///
/// Implementations live in parley-infra (e.g., `SqlitePersistenceClient`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait PersistenceClient: Send + Sync {
    /// Get a chat by its unique ID.
    fn fetch_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Get messages of a chat matching the query's range, order, and limit.
    ///
    /// Rows sharing a `created_at` come back in insertion order (reversed
    /// for descending queries).
    fn fetch_messages(
        &self,
        query: &MessageQuery,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Insert a message. The store assigns `id` and `created_at`.
    fn insert_message(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Create a chat for a user.
    fn insert_chat(
        &self,
        user_id: &Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// List a user's chats, ordered by created_at DESC.
    fn fetch_chats(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;
}
