mod error;
mod traits;
mod types;

pub use error::{RepositoryError, Result, TimeWindowError};
pub use traits::EventStore;
pub use types::{EventQuery, Snapshot, StoreOp, Subscription, TimeWindow, MAX_BATCH_SIZE};
