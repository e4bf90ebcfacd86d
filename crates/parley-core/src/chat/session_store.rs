//! Signed-in user's chat list.
//!
//! ChatSessionStore caches chat metadata (never messages) for one user,
//! newest first. It is independent of the sync engine: callers pick a chat
//! id from here and hand it to `ConversationSyncEngine::select_chat`.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local, TimeZone};
use parley_types::chat::Chat;
use parley_types::error::RepositoryError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::repository::PersistenceClient;

/// Title given to newly created chats, e.g. `Chat 1/5/2025, 3:04:05 PM`.
pub fn default_chat_title<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Chat {}", at.format("%-m/%-d/%Y, %-I:%M:%S %p"))
}

/// Cached chat list for a signed-in user.
pub struct ChatSessionStore<P: PersistenceClient> {
    persistence: Arc<P>,
    user_id: Uuid,
    chats: RwLock<Vec<Chat>>,
}

impl<P: PersistenceClient> ChatSessionStore<P> {
    /// Sign `user_id` in and load their chats.
    pub async fn login(persistence: Arc<P>, user_id: Uuid) -> Result<Self, RepositoryError> {
        let store = Self {
            persistence,
            user_id,
            chats: RwLock::new(Vec::new()),
        };
        store.refresh().await?;
        info!(%user_id, chats = store.chats().len(), "signed in");
        Ok(store)
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Re-fetch the chat list, replacing the cache.
    ///
    /// On error the previous cache is kept.
    pub async fn refresh(&self) -> Result<Vec<Chat>, RepositoryError> {
        let chats = self.persistence.fetch_chats(&self.user_id).await?;
        debug!(user_id = %self.user_id, count = chats.len(), "chat list refreshed");
        *self.chats.write().expect("chat list lock poisoned") = chats.clone();
        Ok(chats)
    }

    /// Alias of [`refresh`](Self::refresh).
    pub async fn list(&self) -> Result<Vec<Chat>, RepositoryError> {
        self.refresh().await
    }

    /// Create a chat titled after the current local time and prepend it.
    pub async fn create(&self) -> Result<Uuid, RepositoryError> {
        self.create_titled(&default_chat_title(&Local::now())).await
    }

    /// Create a chat with an explicit title and prepend it.
    pub async fn create_titled(&self, title: &str) -> Result<Uuid, RepositoryError> {
        let chat = self.persistence.insert_chat(&self.user_id, title).await?;
        let id = chat.id;
        info!(chat_id = %id, title = %chat.title, "chat created");
        self.chats
            .write()
            .expect("chat list lock poisoned")
            .insert(0, chat);
        Ok(id)
    }

    /// Cached snapshot, newest first.
    pub fn chats(&self) -> Vec<Chat> {
        self.chats.read().expect("chat list lock poisoned").clone()
    }

    pub fn get(&self, chat_id: &Uuid) -> Option<Chat> {
        self.chats
            .read()
            .expect("chat list lock poisoned")
            .iter()
            .find(|c| c.id == *chat_id)
            .cloned()
    }

    /// Sign out, dropping the cached list.
    pub fn logout(self) {
        self.chats.write().expect("chat list lock poisoned").clear();
        info!(user_id = %self.user_id, "signed out");
    }
}
