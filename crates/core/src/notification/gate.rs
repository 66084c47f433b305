use chrono::{DateTime, Utc};

use crate::calendar::CalendarEvent;

use super::types::{GateAction, NotificationIntent, OutboxEntry, OutboxKind};

/// Compares start and end at millisecond precision.
pub fn times_changed(event: &CalendarEvent, previous: &CalendarEvent) -> bool {
    event.start.timestamp_millis() != previous.start.timestamp_millis()
        || event.end.timestamp_millis() != previous.end.timestamp_millis()
}

/// Decides how the outbox reacts to a mutation.
pub fn gate_action(intent: &NotificationIntent, now: DateTime<Utc>) -> GateAction {
    match intent {
        NotificationIntent::Created(event) => {
            GateAction::Enqueue(OutboxEntry::for_event(event, OutboxKind::Created, now))
        }
        NotificationIntent::Updated { event, previous } if times_changed(event, previous) => {
            GateAction::Enqueue(OutboxEntry::for_event(event, OutboxKind::Updated, now))
        }
        NotificationIntent::Updated { event, .. } => GateAction::Skip(event.id.clone()),
        NotificationIntent::Deleted { id, .. } => GateAction::Dequeue(id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{EntityType, EventId};
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, hour, 0, 0).unwrap()
    }

    fn lesson() -> CalendarEvent {
        CalendarEvent::shift("Lesson", at(10), at(11))
            .with_id("s1")
            .with_staff(["tutor@example.com"])
            .with_students(["student@example.com"])
    }

    #[test]
    fn test_create_always_enqueues() {
        match gate_action(&NotificationIntent::Created(lesson()), at(8)) {
            GateAction::Enqueue(entry) => {
                assert_eq!(entry.kind, OutboxKind::Created);
                assert_eq!(entry.event_id.as_str(), "s1");
                assert_eq!(entry.recipients.len(), 2);
                assert_eq!(entry.enqueued_at, at(8));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_update_with_same_times_is_skipped() {
        let previous = lesson();
        let mut event = lesson();
        event.title = "Renamed".to_string();
        event.start += Duration::microseconds(300);

        let action = gate_action(&NotificationIntent::Updated { event, previous }, at(8));
        assert_eq!(action, GateAction::Skip(EventId::new("s1")));
    }

    #[test]
    fn test_update_with_new_times_enqueues() {
        let previous = lesson();
        let mut event = lesson();
        event.end += Duration::minutes(30);

        let action = gate_action(&NotificationIntent::Updated { event, previous }, at(8));
        assert!(matches!(action, GateAction::Enqueue(entry) if entry.kind == OutboxKind::Updated));
    }

    #[test]
    fn test_delete_dequeues() {
        let intent = NotificationIntent::Deleted {
            collection: EntityType::StudentRequest,
            id: EventId::new("r1"),
        };
        assert_eq!(gate_action(&intent, at(8)), GateAction::Dequeue(EventId::new("r1")));
    }

    #[test]
    fn test_one_millisecond_shift_enqueues() {
        let previous = lesson();
        let mut event = lesson();
        event.start += Duration::milliseconds(1);

        let action = gate_action(&NotificationIntent::Updated { event, previous }, at(8));
        assert!(matches!(action, GateAction::Enqueue(entry) if entry.kind == OutboxKind::Updated));

        let previous = lesson();
        let mut event = lesson();
        event.end -= Duration::milliseconds(1);
        assert!(times_changed(&event, &previous));
    }

    #[test]
    fn test_availability_create_enqueues() {
        let block = CalendarEvent::availability("tutor@example.com", at(9), at(17)).with_id("a1");
        match gate_action(&NotificationIntent::Created(block), at(8)) {
            GateAction::Enqueue(entry) => {
                assert_eq!(entry.event_id.as_str(), "a1");
                assert_eq!(entry.collection, EntityType::Availability);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }
}
