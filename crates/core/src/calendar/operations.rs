use crate::storage::TimeWindow;

use super::error::EventError;
use super::types::{contains_email, CalendarEvent, EventDetails};

/// Filters events that overlap a time window.
pub fn filter_events_by_window<'a>(
    events: &'a [CalendarEvent],
    window: &TimeWindow,
) -> Vec<&'a CalendarEvent> {
    events
        .iter()
        .filter(|event| window.overlaps(event.start, event.end))
        .collect()
}

/// Filters shifts that list the given tutor as staff.
pub fn shifts_staffed_by<'a>(shifts: &'a [CalendarEvent], tutor: &str) -> Vec<&'a CalendarEvent> {
    shifts
        .iter()
        .filter(|event| {
            event
                .as_shift()
                .is_some_and(|details| contains_email(&details.staff, tutor))
        })
        .collect()
}

/// Sorts events by start time, then by id for a stable order.
pub fn sort_events_by_start(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
}

/// Validates an event before it is created or changed.
pub fn validate_event(event: &CalendarEvent) -> Result<(), EventError> {
    if event.title.trim().is_empty() {
        return Err(EventError::EmptyTitle);
    }
    if event.title.len() > 200 {
        return Err(EventError::TitleTooLong);
    }
    if event.end <= event.start {
        return Err(EventError::InvalidTimeRange);
    }
    if event.is_recurring() && event.recurrence.until.is_some_and(|until| until < event.start) {
        return Err(EventError::InvalidUntil);
    }

    match &event.details {
        EventDetails::Availability(details) if details.tutor.trim().is_empty() => {
            Err(EventError::MissingTutor)
        }
        EventDetails::StudentRequest(details)
            if details.students.iter().all(|s| s.trim().is_empty()) =>
        {
            Err(EventError::MissingStudents)
        }
        _ => Ok(()),
    }
}
