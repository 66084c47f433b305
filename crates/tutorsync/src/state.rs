//! Local calendar state.
//!
//! Holds the raw documents of the three collections as last seen from the
//! store, plus optimistic changes. Every read expands recurring templates on
//! the fly; only raw documents are ever stored here.

use std::collections::HashSet;

use serde::Serialize;
use tokio::sync::RwLock;

use tutorsync_core::calendar::{
    expand_events, filter_events_by_window, merge_event, sort_events_by_start,
    split_availabilities, CalendarDocuments, CalendarEvent, EntityType, EventId, ExpansionLimits,
    SplitInterval,
};
use tutorsync_core::mutation::MutationPlan;
use tutorsync_core::policy::{policy_for, visible_events, Actor, FlowToken};
use tutorsync_core::storage::TimeWindow;

/// What an actor sees: visible events plus the free part of visible availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarView {
    pub window_start: chrono::DateTime<chrono::Utc>,
    pub window_end: chrono::DateTime<chrono::Utc>,
    pub create_flow: FlowToken,
    pub events: Vec<CalendarEvent>,
    pub free_intervals: Vec<SplitInterval>,
}

#[derive(Debug)]
pub struct CalendarState {
    documents: RwLock<CalendarDocuments>,
    window: TimeWindow,
    limits: ExpansionLimits,
}

impl CalendarState {
    pub fn new(window: TimeWindow, limits: ExpansionLimits) -> Self {
        Self {
            documents: RwLock::new(CalendarDocuments::new()),
            window,
            limits,
        }
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Copy of the raw documents, used as a rollback point.
    pub async fn documents(&self) -> CalendarDocuments {
        self.documents.read().await.clone()
    }

    /// Puts back documents captured with [`CalendarState::documents`].
    pub async fn restore(&self, documents: CalendarDocuments) {
        *self.documents.write().await = documents;
    }

    /// Replaces one collection with a fresh store snapshot.
    pub async fn replace_slice(&self, collection: EntityType, events: Vec<CalendarEvent>) {
        tracing::trace!(%collection, documents = events.len(), "Slice replaced");
        self.documents
            .write()
            .await
            .replace_slice(collection, events);
    }

    /// Merges a live store snapshot into one collection.
    ///
    /// The snapshot decides which documents exist. A document held on both
    /// sides keeps the copy with the newer `updated_at`, so an older snapshot
    /// does not revert an optimistic edit still being written.
    pub async fn reconcile_slice(&self, collection: EntityType, events: Vec<CalendarEvent>) {
        let mut documents = self.documents.write().await;
        let mut kept_local = 0usize;
        let merged: Vec<CalendarEvent> = events
            .into_iter()
            .map(|stored| match documents.find(collection, &stored.id) {
                Some(local) => {
                    let result = merge_event(&stored, local);
                    if result.is_local_win() {
                        kept_local += 1;
                    }
                    result.into_event()
                }
                None => stored,
            })
            .collect();
        tracing::trace!(%collection, documents = merged.len(), kept_local, "Slice reconciled");
        documents.replace_slice(collection, merged);
    }

    /// Applies a plan optimistically.
    pub async fn apply(&self, plan: &MutationPlan) {
        plan.apply(&mut *self.documents.write().await);
    }

    pub async fn upsert(&self, events: impl IntoIterator<Item = CalendarEvent>) {
        let mut documents = self.documents.write().await;
        for event in events {
            documents.upsert(event);
        }
    }

    /// Ids of the raw documents of a collection.
    pub async fn document_ids(&self, collection: EntityType) -> HashSet<EventId> {
        self.documents
            .read()
            .await
            .slice(collection)
            .iter()
            .map(|event| event.id.clone())
            .collect()
    }

    /// Expanded events of one collection inside the window.
    pub async fn expanded(&self, collection: EntityType) -> Vec<CalendarEvent> {
        let documents = self.documents.read().await;
        expand_events(documents.slice(collection), &self.window, &self.limits)
    }

    /// Every expanded event inside the window, sorted by start.
    pub async fn calendar(&self) -> Vec<CalendarEvent> {
        let documents = self.documents.read().await;
        let expanded: Vec<CalendarEvent> = EntityType::ALL
            .iter()
            .flat_map(|collection| {
                expand_events(documents.slice(*collection), &self.window, &self.limits)
            })
            .collect();
        let mut events: Vec<CalendarEvent> = filter_events_by_window(&expanded, &self.window)
            .into_iter()
            .cloned()
            .collect();
        sort_events_by_start(&mut events);
        events
    }

    /// The calendar as seen by `actor`.
    pub async fn view(&self, actor: &Actor) -> CalendarView {
        let calendar = self.calendar().await;
        let events: Vec<CalendarEvent> = visible_events(actor, &calendar)
            .into_iter()
            .cloned()
            .collect();

        let (blocks, shifts): (Vec<CalendarEvent>, Vec<CalendarEvent>) = calendar
            .iter()
            .filter(|event| event.entity_type() != EntityType::StudentRequest)
            .cloned()
            .partition(|event| event.entity_type() == EntityType::Availability);
        let blocks: Vec<CalendarEvent> = blocks
            .into_iter()
            .filter(|block| events.iter().any(|visible| visible.id == block.id))
            .collect();

        CalendarView {
            window_start: self.window.start,
            window_end: self.window.end,
            create_flow: policy_for(actor.role).create_flow(),
            free_intervals: split_availabilities(&blocks, &shifts),
            events,
        }
    }
}
