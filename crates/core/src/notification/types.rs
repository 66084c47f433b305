use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarEvent, EntityType, EventId};

/// Why an entry sits in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxKind {
    Created,
    Updated,
}

/// A pending email notification, keyed by event id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub event_id: EventId,
    pub kind: OutboxKind,
    pub collection: EntityType,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recipients: Vec<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl OutboxEntry {
    pub fn for_event(event: &CalendarEvent, kind: OutboxKind, now: DateTime<Utc>) -> Self {
        Self {
            event_id: event.id.clone(),
            kind,
            collection: event.entity_type(),
            title: event.title.clone(),
            start: event.start,
            end: event.end,
            recipients: event.attendees(),
            enqueued_at: now,
        }
    }
}

/// Notification side effect requested by a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationIntent {
    Created(CalendarEvent),
    Updated {
        event: CalendarEvent,
        previous: CalendarEvent,
    },
    Deleted {
        collection: EntityType,
        id: EventId,
    },
}

impl NotificationIntent {
    pub fn event_id(&self) -> &EventId {
        match self {
            NotificationIntent::Created(event) | NotificationIntent::Updated { event, .. } => {
                &event.id
            }
            NotificationIntent::Deleted { id, .. } => id,
        }
    }
}

/// What the gate must do with the outbox for one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    Enqueue(OutboxEntry),
    Dequeue(EventId),
    /// Times unchanged, nothing to send.
    Skip(EventId),
}

/// Outcome recorded by the gate once the outbox has been touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "event_id", rename_all = "snake_case")]
pub enum NotificationDecision {
    Enqueued(EventId),
    Dequeued(EventId),
    Skipped(EventId),
}
