//! Freezes generated occurrences into stored documents once they start.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use tutorsync_core::calendar::{
    due_for_materialization, materialize_occurrence, CalendarEvent, EntityType, EventId,
};
use tutorsync_core::storage::{EventStore, RepositoryError, StoreOp, MAX_BATCH_SIZE};

use crate::error::MaterializeError;
use crate::state::CalendarState;

/// Result of one materialization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub written: usize,
    /// Batches the store rejected. Their occurrences are retried on the next pass.
    pub failures: Vec<RepositoryError>,
}

#[derive(Clone)]
pub struct Materializer {
    store: Arc<dyn EventStore>,
    state: Arc<CalendarState>,
    batch_size: usize,
}

impl Materializer {
    pub fn new(store: Arc<dyn EventStore>, state: Arc<CalendarState>) -> Self {
        Self {
            store,
            state,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Sets the number of documents per batch, capped by the store limit.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Persists every generated occurrence that started at or before `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<MaterializeReport, MaterializeError> {
        let mut report = MaterializeReport::default();

        for collection in EntityType::ALL {
            let existing: HashSet<EventId> = self
                .store
                .get_all(collection)
                .await?
                .into_iter()
                .map(|event| event.id)
                .collect();

            let expanded = self.state.expanded(collection).await;
            let documents: Vec<CalendarEvent> = due_for_materialization(&expanded, &existing, now)
                .into_iter()
                .map(|occurrence| materialize_occurrence(occurrence, now))
                .collect();
            if documents.is_empty() {
                continue;
            }

            for chunk in documents.chunks(self.batch_size) {
                let ops: Vec<StoreOp> = chunk.iter().cloned().map(StoreOp::Put).collect();
                match self.store.batch_write(collection, &ops).await {
                    Ok(()) => {
                        report.written += chunk.len();
                        self.state.upsert(chunk.iter().cloned()).await;
                    }
                    Err(err) => {
                        tracing::warn!(
                            %collection,
                            batch = chunk.len(),
                            error = %err,
                            "Materialization batch failed"
                        );
                        report.failures.push(err);
                    }
                }
            }
        }

        if report.written > 0 {
            tracing::info!(written = report.written, "Materialized occurrences");
        }
        Ok(report)
    }
}
