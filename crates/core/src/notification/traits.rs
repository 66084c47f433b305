use async_trait::async_trait;

use crate::calendar::EventId;

use super::{OutboxEntry, Result};

/// Queue of pending notifications, keyed by event id.
///
/// Enqueueing an id that is already queued replaces the entry.
#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()>;

    /// Removes the entry for an event, returning it if one was queued.
    async fn dequeue(&self, event_id: &EventId) -> Result<Option<OutboxEntry>>;

    /// Lists queued entries, oldest first.
    async fn pending(&self) -> Result<Vec<OutboxEntry>>;
}
