//! In-memory notification outbox.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tutorsync_core::calendar::EventId;
use tutorsync_core::notification::{NotificationOutbox, OutboxEntry, Result};

/// Outbox kept in process memory, one entry per event id.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    entries: Arc<RwLock<HashMap<EventId, OutboxEntry>>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationOutbox for MemoryOutbox {
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.event_id.clone(), entry);
        Ok(())
    }

    async fn dequeue(&self, event_id: &EventId) -> Result<Option<OutboxEntry>> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(event_id))
    }

    async fn pending(&self) -> Result<Vec<OutboxEntry>> {
        let entries = self.entries.read().await;
        let mut pending: Vec<OutboxEntry> = entries.values().cloned().collect();
        pending.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        Ok(pending)
    }
}
