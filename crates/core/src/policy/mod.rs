mod table;
mod types;

pub use table::{ownership, policy_for, Predicate, RolePolicy};
pub use types::{Actor, Capability, FlowToken, Ownership};

use crate::calendar::CalendarEvent;

/// Keeps the events visible to an actor, preserving order.
pub fn visible_events<'a>(actor: &Actor, events: &'a [CalendarEvent]) -> Vec<&'a CalendarEvent> {
    let policy = policy_for(actor.role);
    events
        .iter()
        .filter(|event| policy.allows(Capability::View, event, &actor.email))
        .collect()
}
