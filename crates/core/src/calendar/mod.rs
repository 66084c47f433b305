mod availability;
mod error;
mod merge;
mod mock_data;
mod operations;
mod recurrence;
mod types;

pub use availability::{split_availabilities, split_availability, SplitInterval};
pub use error::EventError;
pub use merge::{merge_event, MergeResult};
pub use mock_data::{format_entity_type, generate_seed_events, Roster};
pub use operations::{
    filter_events_by_window, shifts_staffed_by, sort_events_by_start, validate_event,
};
pub use recurrence::{
    due_for_materialization, expand_events, materialize_occurrence, occurrence_at,
    occurrence_start, this_and_future_cutoff, ExpansionLimits,
};
pub use types::{
    same_email, ApprovalStatus, AvailabilityDetails, CalendarDocuments, CalendarEvent,
    Confirmation, EntityType, EventDetails, EventId, Frequency, MeetingRef, OccurrenceRef,
    Recurrence, Role, ShiftDetails, StudentRequestDetails, WorkStatus, WorkType,
};

pub(crate) use types::contains_email;
