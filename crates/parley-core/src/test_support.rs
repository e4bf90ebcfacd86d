//! In-memory collaborators for engine and session-store tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parley_types::chat::{Chat, Message, MessageQuery, NewMessage, Sender, SortOrder};
use parley_types::error::{GenerationError, RealtimeError, RepositoryError};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::chat::repository::PersistenceClient;
use crate::llm::generator::ResponseGenerator;
use crate::realtime::bridge::{InsertCallback, RealtimeBridge, SubscriptionHandle};

/// Poll `condition` until it holds, yielding to other tasks in between.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

// --- Feed ---

/// Realtime feed that delivers synchronously to registered callbacks.
#[derive(Default)]
pub struct FakeFeed {
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<u64, (Uuid, InsertCallback)>>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `message` to every subscriber of its chat.
    pub fn publish(&self, message: &Message) {
        let payload = serde_json::to_value(message).expect("message serializes");
        self.deliver_raw(message.chat_id, payload);
    }

    pub fn deliver_raw(&self, chat_id: Uuid, payload: serde_json::Value) {
        let callbacks: Vec<InsertCallback> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(payload.clone());
        }
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn active_for(&self, chat_id: Uuid) -> usize {
        self.subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|(chat, _)| *chat == chat_id)
            .count()
    }
}

impl RealtimeBridge for FakeFeed {
    async fn subscribe(
        &self,
        chat_id: Uuid,
        on_insert: InsertCallback,
    ) -> Result<SubscriptionHandle, RealtimeError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.subscriptions
            .lock()
            .unwrap()
            .insert(id, (chat_id, on_insert));
        Ok(SubscriptionHandle::new(id))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), RealtimeError> {
        self.subscriptions
            .lock()
            .unwrap()
            .remove(&handle.id())
            .map(|_| ())
            .ok_or(RealtimeError::UnknownHandle(handle.id()))
    }
}

// --- Store ---

struct StoreState {
    chats: Vec<Chat>,
    /// Insertion order; ties on `created_at` resolve by position.
    messages: Vec<Message>,
    clock: DateTime<Utc>,
    frozen: bool,
    fail_fetches: bool,
    fail_inserts_from: Option<Sender>,
    fetch_gates: HashMap<Uuid, Arc<Notify>>,
    fetches_waiting: HashMap<Uuid, usize>,
    insert_gate: Option<Arc<Notify>>,
}

/// In-memory store with a deterministic clock and injectable failures.
///
/// Each issued timestamp is one second after the previous one unless the
/// clock is frozen. Gates are one-shot: the next matching call parks until
/// the returned `Notify` is signalled.
pub struct FakeStore {
    state: Mutex<StoreState>,
    feed: Option<Arc<FakeFeed>>,
    insert_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A store that publishes every inserted row to `feed` before returning.
    pub fn with_feed(feed: Arc<FakeFeed>) -> Self {
        Self::build(Some(feed))
    }

    fn build(feed: Option<Arc<FakeFeed>>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                chats: Vec::new(),
                messages: Vec::new(),
                clock: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
                frozen: false,
                fail_fetches: false,
                fail_inserts_from: None,
                fetch_gates: HashMap::new(),
                fetches_waiting: HashMap::new(),
                insert_gate: None,
            }),
            feed,
            insert_calls: AtomicUsize::new(0),
        }
    }

    fn tick(state: &mut StoreState) -> DateTime<Utc> {
        if !state.frozen {
            state.clock += chrono::Duration::seconds(1);
        }
        state.clock
    }

    pub fn seed_chat(&self, title: &str) -> Chat {
        self.seed_chat_for(Uuid::now_v7(), title)
    }

    pub fn seed_chat_for(&self, user_id: Uuid, title: &str) -> Chat {
        let mut state = self.state.lock().unwrap();
        let chat = Chat {
            id: Uuid::now_v7(),
            user_id,
            title: title.to_string(),
            created_at: Self::tick(&mut state),
        };
        state.chats.push(chat.clone());
        chat
    }

    /// Store `count` alternating user/AI rows, returned oldest first.
    pub fn seed_messages(&self, chat_id: Uuid, count: usize) -> Vec<Message> {
        let mut state = self.state.lock().unwrap();
        let mut seeded = Vec::with_capacity(count);
        for i in 0..count {
            let sender = if i % 2 == 0 { Sender::User } else { Sender::Ai };
            let message = Message {
                id: Uuid::now_v7(),
                chat_id,
                content: format!("seed {i}"),
                sender,
                created_at: Self::tick(&mut state),
            };
            state.messages.push(message.clone());
            seeded.push(message);
        }
        seeded
    }

    /// Build a row on the store clock without storing it.
    pub fn row_for(&self, chat_id: Uuid, sender: Sender, content: &str) -> Message {
        let mut state = self.state.lock().unwrap();
        Message {
            id: Uuid::now_v7(),
            chat_id,
            content: content.to_string(),
            sender,
            created_at: Self::tick(&mut state),
        }
    }

    pub fn messages_in(&self, chat_id: Uuid) -> Vec<Message> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub fn freeze_clock(&self) {
        self.state.lock().unwrap().frozen = true;
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetches = fail;
    }

    /// Fail inserts of messages from `sender` (or none with `None`).
    pub fn fail_inserts_from(&self, sender: Option<Sender>) {
        self.state.lock().unwrap().fail_inserts_from = sender;
    }

    /// Park the next `fetch_messages` for `chat_id`.
    pub fn hold_fetches(&self, chat_id: Uuid) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state
            .lock()
            .unwrap()
            .fetch_gates
            .insert(chat_id, gate.clone());
        gate
    }

    pub fn fetches_waiting(&self, chat_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .fetches_waiting
            .get(&chat_id)
            .copied()
            .unwrap_or(0)
    }

    /// Park the next `insert_message`.
    pub fn hold_inserts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().insert_gate = Some(gate.clone());
        gate
    }

    pub fn release_inserts(&self, gate: &Notify) {
        gate.notify_one();
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceClient for FakeStore {
    async fn fetch_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let state = self.state.lock().unwrap();
        if state.fail_fetches {
            return Err(RepositoryError::Connection);
        }
        Ok(state.chats.iter().find(|c| c.id == *chat_id).cloned())
    }

    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, RepositoryError> {
        let gate = self.state.lock().unwrap().fetch_gates.remove(&query.chat_id);
        if let Some(gate) = gate {
            *self
                .state
                .lock()
                .unwrap()
                .fetches_waiting
                .entry(query.chat_id)
                .or_default() += 1;
            gate.notified().await;
            if let Some(waiting) = self
                .state
                .lock()
                .unwrap()
                .fetches_waiting
                .get_mut(&query.chat_id)
            {
                *waiting -= 1;
            }
        }

        let state = self.state.lock().unwrap();
        if state.fail_fetches {
            return Err(RepositoryError::Connection);
        }

        // Stable sort keeps insertion order within equal timestamps.
        let mut rows: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.chat_id == query.chat_id)
            .filter(|m| query.before.is_none_or(|before| m.created_at < before))
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        if query.order == SortOrder::Descending {
            rows.reverse();
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.lock().unwrap().insert_gate.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let stored = {
            let mut state = self.state.lock().unwrap();
            if state.fail_inserts_from == Some(message.sender) {
                return Err(RepositoryError::Query("insert rejected".to_string()));
            }
            let stored = Message {
                id: Uuid::now_v7(),
                chat_id: message.chat_id,
                content: message.content.clone(),
                sender: message.sender,
                created_at: Self::tick(&mut state),
            };
            state.messages.push(stored.clone());
            stored
        };

        if let Some(feed) = &self.feed {
            feed.publish(&stored);
        }
        Ok(stored)
    }

    async fn insert_chat(&self, user_id: &Uuid, title: &str) -> Result<Chat, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_inserts_from.is_some() {
            return Err(RepositoryError::Query("insert rejected".to_string()));
        }
        let chat = Chat {
            id: Uuid::now_v7(),
            user_id: *user_id,
            title: title.to_string(),
            created_at: Self::tick(&mut state),
        };
        state.chats.push(chat.clone());
        Ok(chat)
    }

    async fn fetch_chats(&self, user_id: &Uuid) -> Result<Vec<Chat>, RepositoryError> {
        let state = self.state.lock().unwrap();
        if state.fail_fetches {
            return Err(RepositoryError::Connection);
        }
        let mut chats: Vec<Chat> = state
            .chats
            .iter()
            .filter(|c| c.user_id == *user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }
}

// --- Generator ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    /// Reply with `echo: <prompt>`.
    Echo,
    /// Always fail with a provider error.
    Fail,
    /// Reply with whitespace only.
    Blank,
}

/// Generator with a fixed behavior and an optional hold gate.
pub struct ScriptedGenerator {
    mode: GeneratorMode,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedGenerator {
    pub fn new(mode: GeneratorMode) -> Self {
        Self {
            mode,
            gate: Mutex::new(None),
        }
    }

    /// Park every subsequent `generate` until released.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Let one parked (or the next) `generate` call proceed.
    pub fn release(&self, gate: &Notify) {
        gate.notify_one();
    }
}

impl ResponseGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerationError>> + Send {
        let gate = self.gate.lock().unwrap().clone();
        let mode = self.mode;
        let prompt = prompt.to_string();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match mode {
                GeneratorMode::Echo => Ok(format!("echo: {prompt}")),
                GeneratorMode::Fail => Err(GenerationError::Provider {
                    message: "scripted failure".to_string(),
                }),
                GeneratorMode::Blank => Ok("   ".to_string()),
            }
        }
    }
}
