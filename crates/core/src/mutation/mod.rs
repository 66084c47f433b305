mod planner;
mod types;

pub use planner::{
    plan_confirmation, plan_create, plan_delete, plan_duplicate, plan_reschedule, stored_entity,
};
pub use types::{Cascade, DeleteOption, MeetingAction, MutationPlan, UpdateOption};
