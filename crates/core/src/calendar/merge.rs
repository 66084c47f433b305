//! Last-Write-Wins (LWW) merge strategy for calendar documents.
//!
//! Concurrent edits to the same document from two actors are reconciled by
//! keeping the copy with the more recent `updated_at`. Pure functions only.

use super::types::CalendarEvent;

/// Result of merging a local edit with the copy held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    /// The local copy should be kept (its timestamp is strictly newer).
    LocalWins(CalendarEvent),
    /// The store copy should be kept (its timestamp is the same or newer).
    StoreWins(CalendarEvent),
}

impl MergeResult {
    /// Returns the winning event.
    pub fn event(&self) -> &CalendarEvent {
        match self {
            MergeResult::LocalWins(event) | MergeResult::StoreWins(event) => event,
        }
    }

    /// Consumes the result and returns the winning event.
    pub fn into_event(self) -> CalendarEvent {
        match self {
            MergeResult::LocalWins(event) | MergeResult::StoreWins(event) => event,
        }
    }

    pub fn is_local_win(&self) -> bool {
        matches!(self, MergeResult::LocalWins(_))
    }
}

/// Merges the store copy of an event with a local copy using Last-Write-Wins.
///
/// On a timestamp tie the store copy wins so that every client converges on
/// the same document.
pub fn merge_event(stored: &CalendarEvent, local: &CalendarEvent) -> MergeResult {
    if local.updated_at > stored.updated_at {
        MergeResult::LocalWins(local.clone())
    } else {
        MergeResult::StoreWins(stored.clone())
    }
}
