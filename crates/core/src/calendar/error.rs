use thiserror::Error;

/// Errors that can occur when validating or planning changes to calendar events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Event title cannot be empty")]
    EmptyTitle,
    #[error("Event title too long (max 200 characters)")]
    TitleTooLong,
    #[error("End time must be after start time")]
    InvalidTimeRange,
    #[error("Recurrence end must not be before the event start")]
    InvalidUntil,
    #[error("Availability block requires a tutor")]
    MissingTutor,
    #[error("Student request requires at least one student")]
    MissingStudents,
    #[error("Series template not found: {0}")]
    SeriesNotFound(String),
    #[error("Only shifts accept participation confirmations")]
    NotAShift,
}
