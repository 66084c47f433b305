//! Email notification gating.
//!
//! Mutations describe what happened as [`NotificationIntent`]s; [`gate_action`]
//! turns each intent into an outbox operation.

mod error;
mod gate;
mod traits;
mod types;

pub use error::{OutboxError, Result};
pub use gate::{gate_action, times_changed};
pub use traits::NotificationOutbox;
pub use types::{GateAction, NotificationDecision, NotificationIntent, OutboxEntry, OutboxKind};
