use serde::{Deserialize, Serialize};

use crate::calendar::Role;

/// The acting user, as supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    pub email: String,
}

impl Actor {
    pub fn new(role: Role, email: impl Into<String>) -> Self {
        Self {
            role,
            email: email.into(),
        }
    }

    pub fn teacher(email: impl Into<String>) -> Self {
        Self::new(Role::Teacher, email)
    }

    pub fn tutor(email: impl Into<String>) -> Self {
        Self::new(Role::Tutor, email)
    }

    pub fn student(email: impl Into<String>) -> Self {
        Self::new(Role::Student, email)
    }
}

/// Actions gated by the role policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    View,
    Edit,
    Drag,
    Resize,
    Duplicate,
    Delete,
    Confirm,
}

/// Relation between an actor and an event, derived from the ownership fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The actor owns the event (tutor of a block, student of a request).
    Owner,
    /// The actor is listed on a shift as staff or student.
    Participant,
    Unrelated,
}

/// Surface the UI opens for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowToken {
    CreateShift,
    CreateAvailability,
    CreateStudentRequest,
    EditShift,
    EditAvailability,
    EditStudentRequest,
    ConfirmShift,
}
