use thiserror::Error;

use tutorsync_core::calendar::EventError;
use tutorsync_core::meeting::MeetingError;
use tutorsync_core::notification::OutboxError;
use tutorsync_core::storage::RepositoryError;

/// Errors that abort a mutation. The local state is rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("Invalid change: {0}")]
    Validation(#[from] EventError),
    #[error("Failed to persist change: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Failures of follow-up work after the store accepted a mutation.
///
/// These are reported to the caller and never undo the mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SideEffectError {
    #[error("Meeting provider failed: {0}")]
    Meeting(#[from] MeetingError),
    #[error("Notification outbox failed: {0}")]
    Notification(#[from] OutboxError),
    #[error("Cascade delete failed: {0}")]
    Cascade(RepositoryError),
    #[error("Failed to attach meeting: {0}")]
    MeetingLink(RepositoryError),
}

/// Errors that stop a materialization pass before it writes anything.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("Failed to read existing occurrences: {0}")]
    Store(#[from] RepositoryError),
}
