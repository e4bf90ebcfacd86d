//! Conversation sync engine.
//!
//! Owns the selected chat's [`MessageLog`] and reconciles three concurrent
//! writers into it:
//!
//! - **Confirmed sends:** rows returned by the store after `send` inserts them.
//! - **Realtime pushes:** rows delivered by the [`RealtimeBridge`] callback,
//!   forwarded through a single-consumer channel to one pump task.
//! - **History pages:** older rows fetched by `load_more_messages`.
//!
//! All three end in the same merge routine, so the final log does not depend
//! on the order in which they complete. The state lock is never held across
//! an `.await`; stale results are detected with a selection sequence token.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parley_types::chat::{Chat, Message, MessageQuery, NewMessage};
use parley_types::config::SyncConfig;
use parley_types::error::SyncError;
use parley_types::event::{MergeSource, SyncEvent};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chat::repository::PersistenceClient;
use crate::event::bus::EventBus;
use crate::llm::generator::ResponseGenerator;
use crate::realtime::bridge::{InsertCallback, RealtimeBridge, SubscriptionHandle};

use super::log::MessageLog;

/// Lifecycle phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No chat selected.
    Idle,
    /// Initial fetch for the selected chat is in flight.
    Loading,
    /// Log available; sends, pushes, and pagination accepted.
    Ready,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::Loading => write!(f, "loading"),
            SyncPhase::Ready => write!(f, "ready"),
        }
    }
}

/// Result of a history page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page was merged; `added` counts rows that were not already present.
    Loaded { added: usize },
    /// The store returned an empty page.
    NoMoreHistory,
}

/// Where the stored AI reply text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Generated,
    Fallback,
}

/// Outcome of one user turn.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub user_message: Message,
    /// `None` when the reply could not be persisted.
    pub reply: Option<Message>,
    pub reply_source: ReplySource,
}

struct SessionState {
    phase: SyncPhase,
    /// Chat whose rows are accepted into the log (set as soon as loading starts).
    target: Option<Uuid>,
    chat: Option<Chat>,
    log: MessageLog,
    /// Bumped by every selection change; in-flight work compares against it.
    selection: u64,
    subscription: Option<SubscriptionHandle>,
    has_more: bool,
    paginating: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            target: None,
            chat: None,
            log: MessageLog::new(),
            selection: 0,
            subscription: None,
            has_more: false,
            paginating: false,
        }
    }

    /// Discard the log and point at `target` (or nothing).
    fn reset(&mut self, target: Option<Uuid>) {
        self.phase = if target.is_some() {
            SyncPhase::Loading
        } else {
            SyncPhase::Idle
        };
        self.target = target;
        self.chat = None;
        self.log.clear();
        self.has_more = false;
        self.paginating = false;
    }
}

/// State shared between the engine and its push pump.
struct Shared {
    state: Mutex<SessionState>,
    events: EventBus,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("sync state lock poisoned")
    }

    /// Merge one row for the chat it names, if that chat is still the target.
    fn merge(&self, message: Message, source: MergeSource) -> bool {
        let mut state = self.lock();
        if state.target != Some(message.chat_id) {
            debug!(
                chat_id = %message.chat_id,
                message_id = %message.id,
                ?source,
                "dropping row for a chat that is not selected"
            );
            return false;
        }
        match state.log.merge(message.clone()) {
            Some(index) => {
                self.events.publish(SyncEvent::MessageMerged {
                    message,
                    index,
                    source,
                });
                true
            }
            None => false,
        }
    }

    fn merge_pushed(&self, payload: serde_json::Value) -> bool {
        match serde_json::from_value::<Message>(payload) {
            Ok(message) => self.merge(message, MergeSource::Pushed),
            Err(err) => {
                debug!(error = %err, "dropping malformed realtime payload");
                false
            }
        }
    }
}

/// Keeps one chat's message log faithful to the store.
///
/// Construct inside a Tokio runtime: the engine spawns the task that drains
/// realtime pushes into the log. Dropping the engine stops the task and
/// releases any live subscription.
pub struct ConversationSyncEngine<P, R, G>
where
    P: PersistenceClient,
    R: RealtimeBridge,
    G: ResponseGenerator,
{
    persistence: Arc<P>,
    realtime: Arc<R>,
    generator: Arc<G>,
    config: SyncConfig,
    shared: Arc<Shared>,
    push_tx: mpsc::UnboundedSender<serde_json::Value>,
    send_gate: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

impl<P, R, G> ConversationSyncEngine<P, R, G>
where
    P: PersistenceClient,
    R: RealtimeBridge,
    G: ResponseGenerator,
{
    /// Create an idle engine over the given collaborators.
    pub fn new(persistence: Arc<P>, realtime: Arc<R>, generator: Arc<G>, config: SyncConfig) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::new()),
            events: EventBus::new(config.event_capacity),
        });
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        tokio::spawn(pump_pushes(shared.clone(), push_rx, shutdown.clone()));

        Self {
            persistence,
            realtime,
            generator,
            config,
            shared,
            push_tx,
            send_gate: tokio::sync::Mutex::new(()),
            shutdown,
        }
    }

    // --- Reads ---

    pub fn phase(&self) -> SyncPhase {
        self.shared.lock().phase
    }

    /// Metadata of the selected chat once it is `Ready`.
    pub fn current_chat(&self) -> Option<Chat> {
        self.shared.lock().chat.clone()
    }

    /// Snapshot of the log.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().log.to_vec()
    }

    /// Whether the last page fetched was full, so older rows may exist.
    pub fn has_more_history(&self) -> bool {
        self.shared.lock().has_more
    }

    pub fn is_paginating(&self) -> bool {
        self.shared.lock().paginating
    }

    /// Subscribe to log change events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    // --- Selection ---

    /// Make `chat_id` the active chat.
    ///
    /// Tears down the previous subscription, subscribes to the new chat, and
    /// loads its most recent page. A later call supersedes this one: the
    /// earlier call then returns [`SyncError::Superseded`] and applies nothing.
    /// On `NotFound` or a storage/realtime failure the engine is left `Idle`.
    pub async fn select_chat(&self, chat_id: Uuid) -> Result<Chat, SyncError> {
        let (token, previous) = {
            let mut state = self.shared.lock();
            state.selection += 1;
            let previous = state.subscription.take();
            state.reset(Some(chat_id));
            self.shared.events.publish(SyncEvent::SelectionCleared);
            (state.selection, previous)
        };

        if let Some(handle) = previous {
            self.release(handle).await;
        }

        info!(%chat_id, "selecting chat");
        let result = self.load_selection(token, chat_id).await;

        match &result {
            Ok(_) | Err(SyncError::Superseded) => {}
            Err(err) => {
                warn!(%chat_id, error = %err, "chat selection failed");
                let stale = {
                    let mut state = self.shared.lock();
                    if state.selection == token {
                        state.reset(None);
                        self.shared.events.publish(SyncEvent::SelectionCleared);
                        state.subscription.take()
                    } else {
                        None
                    }
                };
                if let Some(handle) = stale {
                    self.release(handle).await;
                }
            }
        }

        result
    }

    async fn load_selection(&self, token: u64, chat_id: Uuid) -> Result<Chat, SyncError> {
        let chat = self
            .persistence
            .fetch_chat(&chat_id)
            .await?
            .ok_or(SyncError::NotFound)?;
        self.ensure_current(token)?;

        // Subscribe before fetching so rows inserted during the fetch are
        // delivered; the merge dedups any overlap with the page.
        let handle = self.realtime.subscribe(chat_id, self.insert_callback()).await?;
        let rejected = {
            let mut state = self.shared.lock();
            if state.selection == token {
                state.subscription = Some(handle);
                None
            } else {
                Some(handle)
            }
        };
        if let Some(handle) = rejected {
            self.release(handle).await;
            return Err(SyncError::Superseded);
        }

        let page_size = self.config.page_size;
        let mut page = self
            .persistence
            .fetch_messages(&MessageQuery::latest(chat_id, page_size))
            .await?;
        page.reverse();
        let fetched = page.len();

        let mut state = self.shared.lock();
        if state.selection != token {
            debug!(%chat_id, "discarding superseded initial page");
            return Err(SyncError::Superseded);
        }
        state.log.merge_all(page);
        state.chat = Some(chat.clone());
        state.phase = SyncPhase::Ready;
        state.has_more = fetched >= page_size as usize;
        self.shared.events.publish(SyncEvent::ChatSelected {
            chat_id,
            message_count: state.log.len(),
        });
        info!(%chat_id, messages = state.log.len(), "chat ready");

        Ok(chat)
    }

    /// Deselect the current chat and drop its subscription.
    pub async fn close(&self) {
        let handle = {
            let mut state = self.shared.lock();
            state.selection += 1;
            state.reset(None);
            self.shared.events.publish(SyncEvent::SelectionCleared);
            state.subscription.take()
        };
        if let Some(handle) = handle {
            self.release(handle).await;
        }
    }

    // --- Sending ---

    /// Send a user message and store the AI reply.
    ///
    /// The user row is merged as soon as the store returns it; generation
    /// failures are absorbed by storing the configured fallback reply. Only
    /// the user-message insert is serialized: a concurrent `send` during it
    /// fails with [`SyncError::Busy`].
    pub async fn send(&self, content: &str) -> Result<SendReceipt, SyncError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SyncError::InvalidState("message content is empty".to_string()));
        }

        let chat_id = {
            let state = self.shared.lock();
            match (&state.phase, &state.chat) {
                (SyncPhase::Ready, Some(chat)) => chat.id,
                (phase, _) => {
                    return Err(SyncError::InvalidState(format!(
                        "send requires a ready chat, engine is {phase}"
                    )));
                }
            }
        };

        let user_message = {
            let _gate = self.send_gate.try_lock().map_err(|_| SyncError::Busy)?;
            let message = self
                .persistence
                .insert_message(&NewMessage::user(chat_id, content))
                .await?;
            self.shared.merge(message.clone(), MergeSource::Confirmed);
            message
        };

        let (reply_text, reply_source) = match self.generator.generate(content).await {
            Ok(text) if !text.trim().is_empty() => (text, ReplySource::Generated),
            Ok(_) => {
                warn!(%chat_id, generator = self.generator.name(), "blank reply, using fallback");
                (self.config.fallback_reply.clone(), ReplySource::Fallback)
            }
            Err(err) => {
                warn!(%chat_id, generator = self.generator.name(), error = %err, "generation failed, using fallback");
                (self.config.fallback_reply.clone(), ReplySource::Fallback)
            }
        };

        let reply = match self
            .persistence
            .insert_message(&NewMessage::ai(chat_id, reply_text))
            .await
        {
            Ok(message) => {
                // Merged only if this chat is still selected.
                self.shared.merge(message.clone(), MergeSource::Confirmed);
                Some(message)
            }
            Err(err) => {
                error!(%chat_id, error = %err, "failed to store reply");
                None
            }
        };

        Ok(SendReceipt {
            user_message,
            reply,
            reply_source,
        })
    }

    // --- Pagination ---

    /// Load the page of messages just older than the oldest loaded one.
    pub async fn load_more_messages(&self) -> Result<PageOutcome, SyncError> {
        let (token, chat_id, cursor) = {
            let mut state = self.shared.lock();
            if state.phase != SyncPhase::Ready {
                return Err(SyncError::InvalidState(format!(
                    "pagination requires a ready chat, engine is {}",
                    state.phase
                )));
            }
            let (Some(chat_id), Some(cursor)) = (state.target, state.log.oldest_timestamp()) else {
                return Err(SyncError::InvalidState("no messages loaded".to_string()));
            };
            if state.paginating {
                return Err(SyncError::Busy);
            }
            state.paginating = true;
            (state.selection, chat_id, cursor)
        };

        let page_size = self.config.page_size;
        let result = self
            .persistence
            .fetch_messages(&MessageQuery::older_than(chat_id, cursor, page_size))
            .await;

        let mut state = self.shared.lock();
        if state.selection != token {
            debug!(%chat_id, "discarding history page for deselected chat");
            return Err(SyncError::Superseded);
        }
        state.paginating = false;

        let mut page = result?;
        if page.is_empty() {
            state.has_more = false;
            return Ok(PageOutcome::NoMoreHistory);
        }

        let fetched = page.len();
        page.reverse();
        let added = state.log.merge_all(page);
        state.has_more = fetched >= page_size as usize;
        self.shared
            .events
            .publish(SyncEvent::HistoryLoaded { chat_id, added });
        debug!(%chat_id, added, "history page merged");

        Ok(PageOutcome::Loaded { added })
    }

    // --- Realtime ---

    /// Merge a row delivered by the realtime feed.
    ///
    /// Malformed payloads and rows for other chats are dropped. Returns
    /// whether the log changed.
    pub fn merge_pushed_message(&self, payload: serde_json::Value) -> bool {
        self.shared.merge_pushed(payload)
    }

    fn insert_callback(&self) -> InsertCallback {
        let tx = self.push_tx.clone();
        Arc::new(move |payload: serde_json::Value| {
            let _ = tx.send(payload);
        })
    }

    fn ensure_current(&self, token: u64) -> Result<(), SyncError> {
        if self.shared.lock().selection == token {
            Ok(())
        } else {
            Err(SyncError::Superseded)
        }
    }

    async fn release(&self, handle: SubscriptionHandle) {
        if let Err(err) = self.realtime.unsubscribe(handle).await {
            warn!(%handle, error = %err, "failed to unsubscribe");
        }
    }
}

impl<P, R, G> Drop for ConversationSyncEngine<P, R, G>
where
    P: PersistenceClient,
    R: RealtimeBridge,
    G: ResponseGenerator,
{
    fn drop(&mut self) {
        self.shutdown.cancel();

        let handle = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscription
            .take();
        let Some(handle) = handle else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let realtime = self.realtime.clone();
                runtime.spawn(async move {
                    if let Err(err) = realtime.unsubscribe(handle).await {
                        warn!(%handle, error = %err, "failed to unsubscribe on drop");
                    }
                });
            }
            Err(_) => warn!(%handle, "engine dropped outside a runtime, subscription not released"),
        }
    }
}

async fn pump_pushes(
    shared: Arc<Shared>,
    mut rx: mpsc::UnboundedReceiver<serde_json::Value>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            payload = rx.recv() => match payload {
                Some(payload) => {
                    shared.merge_pushed(payload);
                }
                None => break,
            },
        }
    }
    debug!("push pump stopped");
}
