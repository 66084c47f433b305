use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarDocuments, CalendarEvent, EntityType, EventId};
use crate::notification::NotificationIntent;
use crate::storage::StoreOp;

/// Scope of a move or resize applied to a recurring event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOption {
    #[default]
    This,
    ThisAndFuture,
}

/// Scope of a delete applied to a recurring event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOption {
    #[default]
    This,
    ThisAndFuture,
    All,
}

/// Materialized occurrences of `series` with index `>= from_index` to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cascade {
    pub series: EventId,
    pub from_index: u32,
}

impl Cascade {
    pub fn covers(&self, event: &CalendarEvent) -> bool {
        event.instance.as_ref().is_some_and(|instance| {
            instance.materialized
                && instance.recurring_event_id == self.series
                && instance.occurrence_index >= self.from_index
        })
    }
}

/// Meeting provider call to run once the store accepted the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingAction {
    /// Create a meeting and attach it to the event.
    Create { event_id: EventId },
    /// Move the meeting to the event's new times.
    Update {
        event_id: EventId,
        meeting_id: String,
    },
    Delete { meeting_id: String },
}

/// Every effect of one user mutation, computed before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    pub collection: EntityType,
    /// Written as a single atomic batch.
    pub ops: Vec<StoreOp>,
    pub cascade: Option<Cascade>,
    pub notifications: Vec<NotificationIntent>,
    pub meeting: Option<MeetingAction>,
}

impl MutationPlan {
    pub fn new(collection: EntityType) -> Self {
        Self {
            collection,
            ops: Vec::new(),
            cascade: None,
            notifications: Vec::new(),
            meeting: None,
        }
    }

    pub fn put(mut self, event: CalendarEvent) -> Self {
        self.ops.push(StoreOp::Put(event));
        self
    }

    pub fn delete(mut self, id: EventId) -> Self {
        self.ops.push(StoreOp::Delete(id));
        self
    }

    pub fn with_cascade(mut self, series: EventId, from_index: u32) -> Self {
        self.cascade = Some(Cascade { series, from_index });
        self
    }

    pub fn notify(mut self, intent: NotificationIntent) -> Self {
        self.notifications.push(intent);
        self
    }

    pub fn with_meeting(mut self, action: Option<MeetingAction>) -> Self {
        self.meeting = action;
        self
    }

    /// Events written by the plan.
    pub fn written(&self) -> impl Iterator<Item = &CalendarEvent> {
        self.ops.iter().filter_map(|op| match op {
            StoreOp::Put(event) => Some(event),
            StoreOp::Delete(_) => None,
        })
    }

    /// Applies the plan to local documents, cascade included.
    pub fn apply(&self, documents: &mut CalendarDocuments) {
        for op in &self.ops {
            match op {
                StoreOp::Put(event) => documents.upsert(event.clone()),
                StoreOp::Delete(id) => {
                    documents.remove(self.collection, id);
                }
            }
        }
        if let Some(cascade) = &self.cascade {
            documents
                .slice_mut(self.collection)
                .retain(|event| !cascade.covers(event));
        }
    }
}
