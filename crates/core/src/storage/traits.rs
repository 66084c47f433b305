use async_trait::async_trait;

use crate::calendar::{CalendarEvent, EntityType, EventId};

use super::{EventQuery, Result, StoreOp, Subscription};

/// Document store holding one collection per entity type.
///
/// Series templates and materialized occurrences share a collection and are
/// told apart by their occurrence back-reference.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Gets every document in a collection.
    async fn get_all(&self, collection: EntityType) -> Result<Vec<CalendarEvent>>;

    /// Gets a single document by id.
    async fn get_event(&self, collection: EntityType, id: &EventId)
        -> Result<Option<CalendarEvent>>;

    /// Gets the documents matching every filter of the query.
    async fn query(&self, collection: EntityType, query: &EventQuery)
        -> Result<Vec<CalendarEvent>>;

    /// Adds a new document and returns its id.
    async fn add(&self, collection: EntityType, event: &CalendarEvent) -> Result<EventId>;

    /// Replaces an existing document.
    async fn update(&self, collection: EntityType, event: &CalendarEvent) -> Result<()>;

    /// Deletes a document by id.
    async fn delete(&self, collection: EntityType, id: &EventId) -> Result<()>;

    /// Applies all operations atomically. Batches above
    /// [`MAX_BATCH_SIZE`](super::MAX_BATCH_SIZE) are rejected.
    async fn batch_write(&self, collection: EntityType, ops: &[StoreOp]) -> Result<()>;

    /// Subscribes to full snapshots of a collection.
    async fn subscribe(&self, collection: EntityType) -> Result<Subscription>;
}
