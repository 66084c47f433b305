use std::sync::Arc;

use chrono::Utc;

use tutorsync_core::calendar::{CalendarEvent, EntityType, EventId};
use tutorsync_core::notification::{
    gate_action, GateAction, NotificationDecision, NotificationIntent, NotificationOutbox, Result,
};

/// Decides whether a mutation reaches the email outbox and applies the decision.
#[derive(Clone)]
pub struct NotificationGate {
    outbox: Arc<dyn NotificationOutbox>,
}

impl NotificationGate {
    pub fn new(outbox: Arc<dyn NotificationOutbox>) -> Self {
        Self { outbox }
    }

    pub fn outbox(&self) -> &Arc<dyn NotificationOutbox> {
        &self.outbox
    }

    pub async fn evaluate(&self, intent: &NotificationIntent) -> Result<NotificationDecision> {
        match gate_action(intent, Utc::now()) {
            GateAction::Enqueue(entry) => {
                let event_id = entry.event_id.clone();
                tracing::debug!(%event_id, kind = ?entry.kind, "Notification enqueued");
                self.outbox.enqueue(entry).await?;
                Ok(NotificationDecision::Enqueued(event_id))
            }
            GateAction::Dequeue(event_id) => {
                let removed = self.outbox.dequeue(&event_id).await?;
                tracing::debug!(%event_id, removed = removed.is_some(), "Notification dequeued");
                Ok(NotificationDecision::Dequeued(event_id))
            }
            GateAction::Skip(event_id) => {
                tracing::debug!(%event_id, "Times unchanged, notification skipped");
                Ok(NotificationDecision::Skipped(event_id))
            }
        }
    }

    pub async fn enqueue_on_create(&self, event: &CalendarEvent) -> Result<NotificationDecision> {
        self.evaluate(&NotificationIntent::Created(event.clone()))
            .await
    }

    pub async fn enqueue_on_update(
        &self,
        event: &CalendarEvent,
        previous: &CalendarEvent,
    ) -> Result<NotificationDecision> {
        self.evaluate(&NotificationIntent::Updated {
            event: event.clone(),
            previous: previous.clone(),
        })
        .await
    }

    pub async fn dequeue_on_delete(
        &self,
        collection: EntityType,
        id: &EventId,
    ) -> Result<NotificationDecision> {
        self.evaluate(&NotificationIntent::Deleted {
            collection,
            id: id.clone(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryOutbox;
    use chrono::{DateTime, Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, hour, 0, 0).unwrap()
    }

    fn gate() -> (NotificationGate, MemoryOutbox) {
        let outbox = MemoryOutbox::new();
        (NotificationGate::new(Arc::new(outbox.clone())), outbox)
    }

    #[tokio::test]
    async fn test_create_then_delete_leaves_nothing() {
        let (gate, outbox) = gate();
        let request = CalendarEvent::student_request("s@example.com", "Help", at(9), at(10));

        let decision = gate.enqueue_on_create(&request).await.unwrap();
        assert_eq!(decision, NotificationDecision::Enqueued(request.id.clone()));
        assert_eq!(outbox.pending().await.unwrap().len(), 1);

        gate.dequeue_on_delete(EntityType::StudentRequest, &request.id)
            .await
            .unwrap();
        assert!(outbox.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_time_change_does_not_enqueue() {
        let (gate, outbox) = gate();
        let previous = CalendarEvent::shift("Lesson", at(9), at(10));
        let mut renamed = previous.clone();
        renamed.title = "Renamed".to_string();

        let decision = gate.enqueue_on_update(&renamed, &previous).await.unwrap();
        assert_eq!(decision, NotificationDecision::Skipped(previous.id.clone()));
        assert!(outbox.pending().await.unwrap().is_empty());

        let mut moved = previous.clone();
        moved.start += Duration::hours(1);
        moved.end += Duration::hours(1);
        gate.enqueue_on_update(&moved, &previous).await.unwrap();
        assert_eq!(outbox.pending().await.unwrap()[0].start, at(10));
    }

    #[tokio::test]
    async fn test_availability_create_is_enqueued() {
        let (gate, outbox) = gate();
        let block = CalendarEvent::availability("t@example.com", at(9), at(17));

        let decision = gate.enqueue_on_create(&block).await.unwrap();
        assert_eq!(decision, NotificationDecision::Enqueued(block.id.clone()));
        assert_eq!(outbox.pending().await.unwrap()[0].event_id, block.id);
    }
}
