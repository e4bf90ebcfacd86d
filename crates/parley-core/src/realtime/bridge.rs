//! RealtimeBridge trait definition.
//!
//! A realtime bridge delivers rows inserted into a chat's message table to
//! subscribers. Delivery is at-least-once and unordered relative to
//! concurrent writers, and a row may arrive before or after the insert call
//! that created it returns to its caller.

use std::fmt;
use std::sync::Arc;

use parley_types::error::RealtimeError;
use uuid::Uuid;

/// Callback invoked with each raw inserted row.
///
/// The payload is untyped JSON, as received from the feed; consumers are
/// responsible for validating it.
pub type InsertCallback = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Opaque token identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Port to a per-chat insert-event feed.
///
/// Implementations live in parley-infra (e.g., `BroadcastChangeFeed`).
pub trait RealtimeBridge: Send + Sync + 'static {
    /// Start delivering inserts for `chat_id` to `on_insert`.
    fn subscribe(
        &self,
        chat_id: Uuid,
        on_insert: InsertCallback,
    ) -> impl std::future::Future<Output = Result<SubscriptionHandle, RealtimeError>> + Send;

    /// Stop a subscription. Deliveries already in flight may still land.
    fn unsubscribe(
        &self,
        handle: SubscriptionHandle,
    ) -> impl std::future::Future<Output = Result<(), RealtimeError>> + Send;
}
