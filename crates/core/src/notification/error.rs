use thiserror::Error;

/// Errors raised by a notification outbox.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutboxError {
    #[error("Outbox unavailable: {0}")]
    Unavailable(String),
    #[error("Outbox rejected entry {event_id}: {reason}")]
    Rejected { event_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, OutboxError>;
