//! In-process realtime change feed.
//!
//! `BroadcastChangeFeed` implements `RealtimeBridge` with one
//! `tokio::sync::broadcast` channel per chat. Each subscription runs a
//! forwarding task that serializes delivered rows to JSON and hands them to
//! the subscriber's callback, mirroring a hosted realtime service that pushes
//! raw row payloads. Tasks are stopped through a per-subscription
//! `CancellationToken`.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parley_core::realtime::bridge::{InsertCallback, RealtimeBridge, SubscriptionHandle};
use parley_types::chat::Message;
use parley_types::error::RealtimeError;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

struct Subscription {
    chat_id: Uuid,
    cancel: CancellationToken,
}

/// Per-chat channel. `subscribers` only changes under the map's entry lock.
struct Channel {
    sender: broadcast::Sender<Message>,
    subscribers: usize,
}

/// Fan-out of inserted messages to per-chat subscribers.
pub struct BroadcastChangeFeed {
    capacity: usize,
    channels: DashMap<Uuid, Channel>,
    subscriptions: DashMap<u64, Subscription>,
    next_id: AtomicU64,
}

impl BroadcastChangeFeed {
    /// Create a feed whose per-chat channels buffer `capacity` rows.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: DashMap::new(),
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Deliver an inserted row to every subscriber of its chat.
    pub fn publish(&self, message: &Message) {
        if let Some(channel) = self.channels.get(&message.chat_id) {
            let _ = channel.sender.send(message.clone());
        }
    }

    /// Number of live subscriptions across all chats.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl RealtimeBridge for BroadcastChangeFeed {
    async fn subscribe(
        &self,
        chat_id: Uuid,
        on_insert: InsertCallback,
    ) -> Result<SubscriptionHandle, RealtimeError> {
        let mut rx = {
            let mut channel = self.channels.entry(chat_id).or_insert_with(|| Channel {
                sender: broadcast::channel(self.capacity).0,
                subscribers: 0,
            });
            channel.subscribers += 1;
            channel.sender.subscribe()
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SubscriptionHandle::new(id);
        let cancel = CancellationToken::new();
        self.subscriptions.insert(
            id,
            Subscription {
                chat_id,
                cancel: cancel.clone(),
            },
        );

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(message) => match serde_json::to_value(&message) {
                            Ok(payload) => on_insert(payload),
                            Err(err) => warn!(%chat_id, error = %err, "failed to encode row"),
                        },
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(%chat_id, skipped, "subscriber lagged, rows dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!(%chat_id, %handle, "forwarding task stopped");
        });

        debug!(%chat_id, %handle, "subscribed");
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), RealtimeError> {
        let (_, subscription) = self
            .subscriptions
            .remove(&handle.id())
            .ok_or(RealtimeError::UnknownHandle(handle.id()))?;
        subscription.cancel.cancel();

        let chat_id = subscription.chat_id;
        if let Some(mut channel) = self.channels.get_mut(&chat_id) {
            channel.subscribers = channel.subscribers.saturating_sub(1);
        }
        // Re-checked under the entry lock: a concurrent subscribe may have
        // joined the channel since the decrement.
        self.channels
            .remove_if(&chat_id, |_, channel| channel.subscribers == 0);
        debug!(%chat_id, %handle, "unsubscribed");
        Ok(())
    }
}
