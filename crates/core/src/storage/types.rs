use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::calendar::{contains_email, CalendarEvent, EntityType, EventId};

use super::TimeWindowError;

/// Maximum number of operations a store accepts in a single atomic batch.
pub const MAX_BATCH_SIZE: usize = 500;

/// A half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new window, validating that start < end.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeWindowError> {
        if start >= end {
            return Err(TimeWindowError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    /// Creates a window covering `days` whole days from midnight UTC of `from`.
    pub fn days_from(from: NaiveDate, days: u32) -> Self {
        let start = from.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + Duration::days(i64::from(days.max(1)));
        Self { start, end }
    }

    /// Creates a window for the ISO week (Monday to Sunday) containing the given date.
    pub fn week(date: NaiveDate) -> Self {
        let days_from_monday = date.weekday().num_days_from_monday();
        let monday = date - Duration::days(i64::from(days_from_monday));
        Self::days_from(monday, 7)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

/// Filters understood by [`EventStore::query`](super::EventStore::query).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Only events overlapping this window.
    pub window: Option<TimeWindow>,
    /// Only materialized occurrences of this series.
    pub series: Option<EventId>,
    /// Only events listing this email as owner or participant.
    pub involving: Option<String>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn occurrences_of(mut self, series: EventId) -> Self {
        self.series = Some(series);
        self
    }

    pub fn involving(mut self, email: impl Into<String>) -> Self {
        self.involving = Some(email.into());
        self
    }

    /// Returns true if the event satisfies every filter that is set.
    pub fn matches(&self, event: &CalendarEvent) -> bool {
        self.window
            .is_none_or(|w| w.overlaps(event.start, event.end))
            && self.series.as_ref().is_none_or(|series| {
                event
                    .instance
                    .as_ref()
                    .is_some_and(|i| &i.recurring_event_id == series)
            })
            && self
                .involving
                .as_deref()
                .is_none_or(|email| contains_email(&event.attendees(), email))
    }
}

/// A single write against one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Creates or replaces the document with the event's id.
    Put(CalendarEvent),
    /// Removes the document with this id.
    Delete(EventId),
}

impl StoreOp {
    pub fn id(&self) -> &EventId {
        match self {
            StoreOp::Put(event) => &event.id,
            StoreOp::Delete(id) => id,
        }
    }
}

/// Full contents of a collection at some point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub collection: EntityType,
    pub events: Vec<CalendarEvent>,
}

/// Live feed of full snapshots of one collection.
///
/// The consumer owns the subscription and ends it with [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    collection: EntityType,
    receiver: broadcast::Receiver<Snapshot>,
}

impl Subscription {
    pub fn new(collection: EntityType, receiver: broadcast::Receiver<Snapshot>) -> Self {
        Self {
            collection,
            receiver,
        }
    }

    pub fn collection(&self) -> EntityType {
        self.collection
    }

    /// Waits for the next snapshot. Returns `None` once the store closes the feed.
    ///
    /// Snapshots are complete, so a lagging receiver simply skips to the newest one.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Stops listening. The store drops the channel slot once no receiver remains.
    pub fn unsubscribe(self) {
        drop(self.receiver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::OccurrenceRef;
    use chrono::{TimeZone, Weekday};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_window_construction() {
        let window = TimeWindow::new(at(1, 0), at(31, 0)).unwrap();
        assert!(window.contains(at(1, 0)));
        assert!(!window.contains(at(31, 0)));
    }

    #[test]
    fn test_empty_window_is_invalid() {
        assert_eq!(
            TimeWindow::new(at(5, 0), at(5, 0)),
            Err(TimeWindowError::InvalidRange)
        );
        assert_eq!(
            TimeWindow::new(at(6, 0), at(5, 0)),
            Err(TimeWindowError::InvalidRange)
        );
    }

    #[test]
    fn test_week_factory_from_wednesday() {
        // 2025-01-08 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        let window = TimeWindow::week(date);

        assert_eq!(window.start, at(6, 0));
        assert_eq!(window.end, at(13, 0));
        assert_eq!(window.start.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_window_overlap_is_half_open() {
        let window = TimeWindow::new(at(6, 9), at(6, 17)).unwrap();
        assert!(window.overlaps(at(6, 8), at(6, 10)));
        assert!(!window.overlaps(at(6, 17), at(6, 18)));
        assert!(!window.overlaps(at(6, 7), at(6, 9)));
    }

    #[test]
    fn test_query_filters() {
        let mut occurrence = CalendarEvent::shift("Weekly", at(13, 9), at(13, 10))
            .with_staff(["tutor@example.com"])
            .with_id("tpl_occurrence_1");
        occurrence.instance = Some(OccurrenceRef {
            recurring_event_id: EventId::new("tpl"),
            occurrence_index: 1,
            materialized: true,
        });
        let other = CalendarEvent::shift("Other", at(20, 9), at(20, 10));

        let by_series = EventQuery::new().occurrences_of(EventId::new("tpl"));
        assert!(by_series.matches(&occurrence));
        assert!(!by_series.matches(&other));

        let by_email = EventQuery::new().involving("TUTOR@example.com");
        assert!(by_email.matches(&occurrence));
        assert!(!by_email.matches(&other));

        let window = TimeWindow::new(at(19, 0), at(21, 0)).unwrap();
        let by_window = EventQuery::new().in_window(window);
        assert!(by_window.matches(&other));
        assert!(!by_window.matches(&occurrence));
    }

    #[tokio::test]
    async fn test_subscription_skips_lagged_snapshots() {
        let (sender, receiver) = broadcast::channel(1);
        let mut subscription = Subscription::new(EntityType::Shift, receiver);

        for count in 0..3 {
            let events = (0..count)
                .map(|i| CalendarEvent::shift(format!("S{i}"), at(6, 9), at(6, 10)))
                .collect();
            sender
                .send(Snapshot {
                    collection: EntityType::Shift,
                    events,
                })
                .unwrap();
        }

        let snapshot = subscription.next_snapshot().await.unwrap();
        assert_eq!(snapshot.events.len(), 2);

        drop(sender);
        assert!(subscription.next_snapshot().await.is_none());
    }
}
