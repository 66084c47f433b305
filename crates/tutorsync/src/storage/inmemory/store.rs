//! In-memory document store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use tutorsync_core::calendar::{sort_events_by_start, CalendarEvent, EntityType, EventId};
use tutorsync_core::storage::{
    EventQuery, EventStore, RepositoryError, Result, Snapshot, StoreOp, Subscription,
    MAX_BATCH_SIZE,
};

/// Channel capacity for snapshot feeds.
const CHANNEL_CAPACITY: usize = 16;

type Collection = HashMap<EventId, CalendarEvent>;

/// In-memory storage backend for development and tests.
///
/// Every write publishes a full snapshot of the touched collection to its
/// subscribers. Data is lost when the store is dropped.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<EntityType, Collection>>>,
    channels: Arc<RwLock<HashMap<EntityType, broadcast::Sender<Snapshot>>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Inserts documents into their collections, replacing same-id documents.
    pub async fn seed(&self, events: impl IntoIterator<Item = CalendarEvent>) {
        let mut touched = Vec::new();
        {
            let mut collections = self.collections.write().await;
            for event in events {
                let collection = event.entity_type();
                if !touched.contains(&collection) {
                    touched.push(collection);
                }
                collections
                    .entry(collection)
                    .or_default()
                    .insert(event.id.clone(), event);
            }
        }
        for collection in touched {
            self.publish(collection).await;
        }
    }

    /// Number of live subscriptions on a collection.
    pub async fn subscriber_count(&self, collection: EntityType) -> usize {
        self.channels
            .read()
            .await
            .get(&collection)
            .map_or(0, |sender| sender.receiver_count())
    }

    async fn snapshot(&self, collection: EntityType) -> Snapshot {
        let collections = self.collections.read().await;
        let mut events: Vec<CalendarEvent> = collections
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        sort_events_by_start(&mut events);
        Snapshot { collection, events }
    }

    /// Sends the current contents of a collection to its subscribers.
    ///
    /// The channel is dropped once nobody listens anymore.
    async fn publish(&self, collection: EntityType) {
        let sender = {
            let channels = self.channels.read().await;
            match channels.get(&collection) {
                Some(sender) => sender.clone(),
                None => return,
            }
        };

        let snapshot = self.snapshot(collection).await;
        let count = snapshot.events.len();
        if sender.send(snapshot).is_err() {
            let mut channels = self.channels.write().await;
            // Double-check after acquiring write lock
            if channels
                .get(&collection)
                .is_some_and(|sender| sender.receiver_count() == 0)
            {
                channels.remove(&collection);
                tracing::trace!(%collection, "Snapshot channel closed");
            }
            return;
        }
        tracing::trace!(%collection, documents = count, "Snapshot published");
    }

    /// Subscribes to the channel of a collection, creating it if needed.
    async fn subscribe_channel(&self, collection: EntityType) -> broadcast::Receiver<Snapshot> {
        // Try read lock first to avoid write contention
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(&collection) {
                return sender.subscribe();
            }
        }

        let mut channels = self.channels.write().await;

        // Double-check after acquiring write lock
        if let Some(sender) = channels.get(&collection) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        channels.insert(collection, sender);
        receiver
    }
}

fn not_found(collection: EntityType, id: &EventId) -> RepositoryError {
    RepositoryError::NotFound {
        collection: collection.collection_name(),
        id: id.to_string(),
    }
}

fn check_collection(collection: EntityType, event: &CalendarEvent) -> Result<()> {
    if event.entity_type() != collection {
        return Err(RepositoryError::InvalidData(format!(
            "{} document {} written to {}",
            event.entity_type(),
            event.id,
            collection
        )));
    }
    Ok(())
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn get_all(&self, collection: EntityType) -> Result<Vec<CalendarEvent>> {
        Ok(self.snapshot(collection).await.events)
    }

    async fn get_event(
        &self,
        collection: EntityType,
        id: &EventId,
    ) -> Result<Option<CalendarEvent>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: EntityType,
        query: &EventQuery,
    ) -> Result<Vec<CalendarEvent>> {
        Ok(self
            .snapshot(collection)
            .await
            .events
            .into_iter()
            .filter(|event| query.matches(event))
            .collect())
    }

    async fn add(&self, collection: EntityType, event: &CalendarEvent) -> Result<EventId> {
        check_collection(collection, event)?;
        {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection).or_default();
            if docs.contains_key(&event.id) {
                return Err(RepositoryError::AlreadyExists {
                    collection: collection.collection_name(),
                    id: event.id.to_string(),
                });
            }
            docs.insert(event.id.clone(), event.clone());
        }
        self.publish(collection).await;
        Ok(event.id.clone())
    }

    async fn update(&self, collection: EntityType, event: &CalendarEvent) -> Result<()> {
        check_collection(collection, event)?;
        {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection).or_default();
            if !docs.contains_key(&event.id) {
                return Err(not_found(collection, &event.id));
            }
            docs.insert(event.id.clone(), event.clone());
        }
        self.publish(collection).await;
        Ok(())
    }

    async fn delete(&self, collection: EntityType, id: &EventId) -> Result<()> {
        {
            let mut collections = self.collections.write().await;
            let removed = collections
                .get_mut(&collection)
                .and_then(|docs| docs.remove(id));
            if removed.is_none() {
                return Err(not_found(collection, id));
            }
        }
        self.publish(collection).await;
        Ok(())
    }

    async fn batch_write(&self, collection: EntityType, ops: &[StoreOp]) -> Result<()> {
        if ops.len() > MAX_BATCH_SIZE {
            return Err(RepositoryError::BatchTooLarge {
                size: ops.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        for op in ops {
            if let StoreOp::Put(event) = op {
                check_collection(collection, event)?;
            }
        }
        if ops.is_empty() {
            return Ok(());
        }

        {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection).or_default();
            for op in ops {
                match op {
                    StoreOp::Put(event) => {
                        docs.insert(event.id.clone(), event.clone());
                    }
                    StoreOp::Delete(id) => {
                        docs.remove(id);
                    }
                }
            }
        }
        tracing::trace!(%collection, ops = ops.len(), "Batch committed");
        self.publish(collection).await;
        Ok(())
    }

    async fn subscribe(&self, collection: EntityType) -> Result<Subscription> {
        let receiver = self.subscribe_channel(collection).await;
        // New subscribers start from the current contents.
        self.publish(collection).await;
        Ok(Subscription::new(collection, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tutorsync_core::calendar::{materialize_occurrence, OccurrenceRef};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
    }

    fn shift(id: &str, day: u32) -> CalendarEvent {
        CalendarEvent::shift("Lesson", at(day, 9), at(day, 10)).with_id(id)
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = InMemoryStore::new();
        let event = shift("s1", 6);

        let id = store.add(EntityType::Shift, &event).await.unwrap();
        assert_eq!(id.as_str(), "s1");

        let fetched = store.get_event(EntityType::Shift, &id).await.unwrap();
        assert_eq!(fetched, Some(event));
        assert!(store
            .get_event(EntityType::Availability, &id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_add_duplicate_fails() {
        let store = InMemoryStore::new();
        store.add(EntityType::Shift, &shift("s1", 6)).await.unwrap();

        let result = store.add(EntityType::Shift, &shift("s1", 7)).await;
        assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_fail() {
        let store = InMemoryStore::new();
        let event = shift("ghost", 6);

        assert!(matches!(
            store.update(EntityType::Shift, &event).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete(EntityType::Shift, &event.id).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_wrong_collection_is_rejected() {
        let store = InMemoryStore::new();
        let result = store.add(EntityType::Availability, &shift("s1", 6)).await;
        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_batch_write_is_bounded() {
        let store = InMemoryStore::new();
        let ops: Vec<StoreOp> = (0..=MAX_BATCH_SIZE)
            .map(|i| StoreOp::Put(shift(&format!("s{i}"), 6)))
            .collect();

        let result = store.batch_write(EntityType::Shift, &ops).await;
        assert_eq!(
            result,
            Err(RepositoryError::BatchTooLarge {
                size: 501,
                max: 500
            })
        );
        assert!(store.get_all(EntityType::Shift).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_write_puts_and_deletes() {
        let store = InMemoryStore::new();
        store.seed([shift("old", 6)]).await;

        let ops = vec![
            StoreOp::Delete(EventId::new("old")),
            StoreOp::Put(shift("new", 7)),
        ];
        store.batch_write(EntityType::Shift, &ops).await.unwrap();

        let ids: Vec<String> = store
            .get_all(EntityType::Shift)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[tokio::test]
    async fn test_query_by_series() {
        let store = InMemoryStore::new();
        let mut occurrence = shift("tpl_occurrence_1", 13);
        occurrence.instance = Some(OccurrenceRef {
            recurring_event_id: EventId::new("tpl"),
            occurrence_index: 1,
            materialized: false,
        });
        let occurrence = materialize_occurrence(&occurrence, at(13, 9));
        store.seed([shift("tpl", 6), occurrence.clone()]).await;

        let found = store
            .query(
                EntityType::Shift,
                &EventQuery::new().occurrences_of(EventId::new("tpl")),
            )
            .await
            .unwrap();
        assert_eq!(found, vec![occurrence]);
    }

    #[tokio::test]
    async fn test_subscribe_receives_current_and_later_snapshots() {
        let store = InMemoryStore::new();
        store.seed([shift("s1", 6)]).await;

        let mut subscription = store.subscribe(EntityType::Shift).await.unwrap();
        let first = subscription.next_snapshot().await.unwrap();
        assert_eq!(first.events.len(), 1);

        store.add(EntityType::Shift, &shift("s2", 7)).await.unwrap();
        let second = subscription.next_snapshot().await.unwrap();
        assert_eq!(second.collection, EntityType::Shift);
        assert_eq!(second.events.len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_channel() {
        let store = InMemoryStore::new();
        let subscription = store.subscribe(EntityType::Shift).await.unwrap();
        subscription.unsubscribe();

        store.add(EntityType::Shift, &shift("s1", 6)).await.unwrap();
        assert!(store.channels.read().await.is_empty());
    }
}
