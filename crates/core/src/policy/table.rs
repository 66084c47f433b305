//! Per-role capability table.
//!
//! Each role resolves to one static [`RolePolicy`] of plain function pointers.
//! Dispatch never inspects the entity beyond its ownership fields.

use crate::calendar::{
    contains_email, same_email, ApprovalStatus, CalendarEvent, EntityType, EventDetails, Role,
};

use super::types::{Capability, FlowToken, Ownership};

/// Predicate over `(entity, actor_email)`.
pub type Predicate = fn(&CalendarEvent, &str) -> bool;

/// Capability predicates of one role.
#[derive(Debug)]
pub struct RolePolicy {
    pub role: Role,
    pub visible: Predicate,
    pub can_edit: Predicate,
    pub can_drag: Predicate,
    pub can_resize: Predicate,
    pub can_duplicate: Predicate,
    pub can_delete: Predicate,
    pub can_confirm: Predicate,
    /// The only entity type this role may create.
    pub creatable: EntityType,
}

/// Edit/view surface per `(role, entity type, ownership)`. `None` ownership
/// matches any relation.
const EVENT_FLOWS: &[(Role, EntityType, Option<Ownership>, FlowToken)] = &[
    (Role::Teacher, EntityType::Shift, None, FlowToken::EditShift),
    (
        Role::Tutor,
        EntityType::Availability,
        Some(Ownership::Owner),
        FlowToken::EditAvailability,
    ),
    (
        Role::Tutor,
        EntityType::Shift,
        Some(Ownership::Participant),
        FlowToken::ConfirmShift,
    ),
    (
        Role::Student,
        EntityType::StudentRequest,
        Some(Ownership::Owner),
        FlowToken::EditStudentRequest,
    ),
    (
        Role::Student,
        EntityType::Shift,
        Some(Ownership::Participant),
        FlowToken::ConfirmShift,
    ),
];

fn is_shift(event: &CalendarEvent, _email: &str) -> bool {
    event.entity_type() == EntityType::Shift
}

fn is_own_availability(event: &CalendarEvent, email: &str) -> bool {
    event
        .as_availability()
        .is_some_and(|details| same_email(&details.tutor, email))
}

fn is_own_pending_request(event: &CalendarEvent, email: &str) -> bool {
    event.as_student_request().is_some_and(|details| {
        details.approval == ApprovalStatus::Pending && contains_email(&details.students, email)
    })
}

fn is_own_request(event: &CalendarEvent, email: &str) -> bool {
    event
        .as_student_request()
        .is_some_and(|details| contains_email(&details.students, email))
}

fn is_staffed_shift(event: &CalendarEvent, email: &str) -> bool {
    event
        .as_shift()
        .is_some_and(|details| contains_email(&details.staff, email))
}

fn is_attended_shift(event: &CalendarEvent, email: &str) -> bool {
    event
        .as_shift()
        .is_some_and(|details| contains_email(&details.students, email))
}

fn never(_event: &CalendarEvent, _email: &str) -> bool {
    false
}

fn tutor_visible(event: &CalendarEvent, email: &str) -> bool {
    is_own_availability(event, email) || is_staffed_shift(event, email)
}

fn student_visible(event: &CalendarEvent, email: &str) -> bool {
    is_own_request(event, email) || is_attended_shift(event, email)
}

static TEACHER_POLICY: RolePolicy = RolePolicy {
    role: Role::Teacher,
    visible: is_shift,
    can_edit: is_shift,
    can_drag: is_shift,
    can_resize: is_shift,
    can_duplicate: is_shift,
    can_delete: is_shift,
    can_confirm: never,
    creatable: EntityType::Shift,
};

static TUTOR_POLICY: RolePolicy = RolePolicy {
    role: Role::Tutor,
    visible: tutor_visible,
    can_edit: is_own_availability,
    can_drag: is_own_availability,
    can_resize: is_own_availability,
    can_duplicate: is_own_availability,
    can_delete: is_own_availability,
    can_confirm: is_staffed_shift,
    creatable: EntityType::Availability,
};

static STUDENT_POLICY: RolePolicy = RolePolicy {
    role: Role::Student,
    visible: student_visible,
    can_edit: is_own_pending_request,
    can_drag: is_own_pending_request,
    can_resize: is_own_pending_request,
    can_duplicate: is_own_pending_request,
    can_delete: is_own_pending_request,
    can_confirm: is_attended_shift,
    creatable: EntityType::StudentRequest,
};

/// Resolves the policy of a role.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use tutorsync_core::calendar::{CalendarEvent, EntityType, Role};
/// use tutorsync_core::policy::{policy_for, Capability};
///
/// let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2025, 1, 6, 17, 0, 0).unwrap();
/// let block = CalendarEvent::availability("ana@example.com", start, end);
///
/// let tutor = policy_for(Role::Tutor);
/// assert!(tutor.allows(Capability::Edit, &block, "ana@example.com"));
/// assert!(!tutor.allows(Capability::Edit, &block, "ben@example.com"));
/// assert!(tutor.can_create(EntityType::Availability));
/// ```
pub fn policy_for(role: Role) -> &'static RolePolicy {
    match role {
        Role::Teacher => &TEACHER_POLICY,
        Role::Tutor => &TUTOR_POLICY,
        Role::Student => &STUDENT_POLICY,
    }
}

/// Derives how an actor relates to an event from its ownership fields.
pub fn ownership(event: &CalendarEvent, email: &str) -> Ownership {
    match &event.details {
        EventDetails::Availability(details) if same_email(&details.tutor, email) => {
            Ownership::Owner
        }
        EventDetails::StudentRequest(details) if contains_email(&details.students, email) => {
            Ownership::Owner
        }
        EventDetails::Shift(details)
            if contains_email(&details.staff, email) || contains_email(&details.students, email) =>
        {
            Ownership::Participant
        }
        _ => Ownership::Unrelated,
    }
}

impl RolePolicy {
    /// Checks a capability for the actor's email against an event.
    pub fn allows(&self, capability: Capability, event: &CalendarEvent, email: &str) -> bool {
        let predicate = match capability {
            Capability::View => self.visible,
            Capability::Edit => self.can_edit,
            Capability::Drag => self.can_drag,
            Capability::Resize => self.can_resize,
            Capability::Duplicate => self.can_duplicate,
            Capability::Delete => self.can_delete,
            Capability::Confirm => self.can_confirm,
        };
        predicate(event, email)
    }

    pub fn can_create(&self, entity_type: EntityType) -> bool {
        self.creatable == entity_type
    }

    /// Surface used to create a new event for this role.
    pub fn create_flow(&self) -> FlowToken {
        match self.creatable {
            EntityType::Shift => FlowToken::CreateShift,
            EntityType::Availability => FlowToken::CreateAvailability,
            EntityType::StudentRequest => FlowToken::CreateStudentRequest,
        }
    }

    /// Surface used to open an existing event, or `None` if the role has none.
    pub fn event_flow(&self, event: &CalendarEvent, email: &str) -> Option<FlowToken> {
        let relation = ownership(event, email);
        EVENT_FLOWS
            .iter()
            .find(|(role, entity_type, required, _)| {
                *role == self.role
                    && *entity_type == event.entity_type()
                    && required.is_none_or(|r| r == relation)
            })
            .map(|(_, _, _, flow)| *flow)
    }
}
