use thiserror::Error;

/// Errors that can occur when constructing a time window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeWindowError {
    #[error("Invalid time window: start must be before end")]
    InvalidRange,
}

/// Errors that can occur during store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{collection} document not found: {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },
    #[error("{collection} document already exists: {id}")]
    AlreadyExists {
        collection: &'static str,
        id: String,
    },
    #[error("Batch of {size} operations exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
