use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a stored calendar document or a generated occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier for a new document.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Synthetic id of the occurrence at `index` of the series rooted at this id.
    pub fn occurrence(&self, index: u32) -> Self {
        Self(format!("{}_occurrence_{}", self.0, index))
    }

    /// Id of the split interval at `position` derived from this availability block.
    pub fn split(&self, position: usize) -> Self {
        Self(format!("{}_split_{}", self.0, position))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Actor roles known to the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Tutor,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Teacher => write!(f, "teacher"),
            Self::Tutor => write!(f, "tutor"),
            Self::Student => write!(f, "student"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "teacher" => Ok(Self::Teacher),
            "tutor" => Ok(Self::Tutor),
            "student" => Ok(Self::Student),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The category of a calendar document. Each category lives in its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Shift,
    Availability,
    StudentRequest,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [
        EntityType::Shift,
        EntityType::Availability,
        EntityType::StudentRequest,
    ];

    /// Name of the store collection holding documents of this type.
    pub fn collection_name(&self) -> &'static str {
        match self {
            EntityType::Shift => "shifts",
            EntityType::Availability => "availabilities",
            EntityType::StudentRequest => "student_requests",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// How often a template repeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    None,
    Weekly,
    Fortnightly,
}

impl Frequency {
    /// Distance between two consecutive occurrences, `None` for one-off events.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Frequency::None => None,
            Frequency::Weekly => Some(Duration::days(7)),
            Frequency::Fortnightly => Some(Duration::days(14)),
        }
    }
}

/// Recurrence rule of a template event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    #[serde(default)]
    pub frequency: Frequency,
    /// No occurrence starting after this instant is generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    /// Occurrence indices excluded from generation.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exceptions: BTreeSet<u32>,
}

impl Recurrence {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn weekly() -> Self {
        Self {
            frequency: Frequency::Weekly,
            ..Self::default()
        }
    }

    pub fn fortnightly() -> Self {
        Self {
            frequency: Frequency::Fortnightly,
            ..Self::default()
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.frequency != Frequency::None
    }
}

/// Back-reference from an occurrence to its series template.
///
/// This is a lookup key only. The template is resolved by id when needed and
/// never embedded, so editing a template leaves materialized occurrences alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceRef {
    pub recurring_event_id: EventId,
    pub occurrence_index: u32,
    /// True once the occurrence has been persisted as a standalone document.
    #[serde(default)]
    pub materialized: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    #[default]
    InPerson,
    Online,
}

/// A participant's answer to a shift invitation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    #[default]
    Pending,
    Accepted,
    Declined,
}

/// Reference to a meeting held by the external meeting provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRef {
    pub meeting_id: String,
    pub join_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDetails {
    /// Tutor emails staffing the shift.
    #[serde(default)]
    pub staff: Vec<String>,
    /// Student emails attending the shift.
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub work_status: WorkStatus,
    /// Whether the shift needs a remote meeting.
    #[serde(default)]
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub confirmations: BTreeMap<String, Confirmation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDetails {
    /// Email of the tutor offering this time.
    pub tutor: String,
    #[serde(default)]
    pub work_type: WorkType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRequestDetails {
    /// Emails of the students asking for the session.
    pub students: Vec<String>,
    #[serde(default)]
    pub approval: ApprovalStatus,
}

/// Entity-specific ownership and status fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum EventDetails {
    Shift(ShiftDetails),
    Availability(AvailabilityDetails),
    StudentRequest(StudentRequestDetails),
}

impl EventDetails {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EventDetails::Shift(_) => EntityType::Shift,
            EventDetails::Availability(_) => EntityType::Availability,
            EventDetails::StudentRequest(_) => EntityType::StudentRequest,
        }
    }
}

/// A calendar document: a one-off event, a recurring template, or an occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Set on generated and materialized occurrences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<OccurrenceRef>,
    pub details: EventDetails,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    fn build(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        details: EventDetails,
    ) -> Self {
        Self {
            id: EventId::generate(),
            title: title.into(),
            description: None,
            start,
            end,
            recurrence: Recurrence::none(),
            instance: None,
            details,
            updated_at: Utc::now(),
        }
    }

    /// Creates a new one-off shift with no staff or students.
    pub fn shift(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::build(
            title,
            start,
            end,
            EventDetails::Shift(ShiftDetails::default()),
        )
    }

    /// Creates a new one-off availability block for a tutor.
    pub fn availability(
        tutor: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self::build(
            "Available",
            start,
            end,
            EventDetails::Availability(AvailabilityDetails {
                tutor: tutor.into(),
                work_type: WorkType::default(),
            }),
        )
    }

    /// Creates a new pending student request.
    pub fn student_request(
        student: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self::build(
            title,
            start,
            end,
            EventDetails::StudentRequest(StudentRequestDetails {
                students: vec![student.into()],
                approval: ApprovalStatus::Pending,
            }),
        )
    }

    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.recurrence.until = Some(until);
        self
    }

    pub fn with_exceptions(mut self, exceptions: impl IntoIterator<Item = u32>) -> Self {
        self.recurrence.exceptions = exceptions.into_iter().collect();
        self
    }

    /// Adds tutors to the staff list. No-op for non-shift events.
    pub fn with_staff<I, S>(mut self, staff: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let EventDetails::Shift(details) = &mut self.details {
            details.staff.extend(staff.into_iter().map(Into::into));
        }
        self
    }

    /// Adds students to a shift or a student request.
    pub fn with_students<I, S>(mut self, students: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let students = students.into_iter().map(Into::into);
        match &mut self.details {
            EventDetails::Shift(details) => details.students.extend(students),
            EventDetails::StudentRequest(details) => details.students.extend(students),
            EventDetails::Availability(_) => {}
        }
        self
    }

    pub fn with_online(mut self, online: bool) -> Self {
        if let EventDetails::Shift(details) = &mut self.details {
            details.online = online;
        }
        self
    }

    pub fn with_meeting(mut self, meeting: MeetingRef) -> Self {
        if let EventDetails::Shift(details) = &mut self.details {
            details.meeting = Some(meeting);
        }
        self
    }

    pub fn with_work_type(mut self, work_type: WorkType) -> Self {
        if let EventDetails::Availability(details) = &mut self.details {
            details.work_type = work_type;
        }
        self
    }

    pub fn with_approval(mut self, approval: ApprovalStatus) -> Self {
        if let EventDetails::StudentRequest(details) = &mut self.details {
            details.approval = approval;
        }
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn entity_type(&self) -> EntityType {
        self.details.entity_type()
    }

    /// Returns true when the event carries a repeating rule. Generated
    /// occurrences copy the rule of their template.
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_recurring()
    }

    /// Returns true for the template document that defines a series.
    pub fn is_series_template(&self) -> bool {
        self.is_recurring() && !self.is_instance()
    }

    /// Returns true for generated or materialized occurrences.
    pub fn is_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Returns true for occurrences that exist only in memory.
    pub fn is_transient_instance(&self) -> bool {
        self.instance.as_ref().is_some_and(|i| !i.materialized)
    }

    pub fn is_materialized(&self) -> bool {
        self.instance.as_ref().is_some_and(|i| i.materialized)
    }

    pub fn occurrence_index(&self) -> Option<u32> {
        self.instance.as_ref().map(|i| i.occurrence_index)
    }

    /// Id of the series template: the back-reference for occurrences, the own id otherwise.
    pub fn series_id(&self) -> &EventId {
        self.instance
            .as_ref()
            .map(|i| &i.recurring_event_id)
            .unwrap_or(&self.id)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }

    pub fn as_shift(&self) -> Option<&ShiftDetails> {
        match &self.details {
            EventDetails::Shift(details) => Some(details),
            _ => None,
        }
    }

    pub fn as_shift_mut(&mut self) -> Option<&mut ShiftDetails> {
        match &mut self.details {
            EventDetails::Shift(details) => Some(details),
            _ => None,
        }
    }

    pub fn as_availability(&self) -> Option<&AvailabilityDetails> {
        match &self.details {
            EventDetails::Availability(details) => Some(details),
            _ => None,
        }
    }

    pub fn as_student_request(&self) -> Option<&StudentRequestDetails> {
        match &self.details {
            EventDetails::StudentRequest(details) => Some(details),
            _ => None,
        }
    }

    /// Meeting reference of a shift, if one has been created.
    pub fn meeting(&self) -> Option<&MeetingRef> {
        self.as_shift().and_then(|s| s.meeting.as_ref())
    }

    /// Every email attached to the event: staff, students or the owning tutor.
    pub fn attendees(&self) -> Vec<String> {
        match &self.details {
            EventDetails::Shift(details) => details
                .staff
                .iter()
                .chain(details.students.iter())
                .cloned()
                .collect(),
            EventDetails::Availability(details) => vec![details.tutor.clone()],
            EventDetails::StudentRequest(details) => details.students.clone(),
        }
    }
}

/// Compares two emails the way the calendar does (ASCII case-insensitive).
pub fn same_email(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

pub(crate) fn contains_email(list: &[String], email: &str) -> bool {
    list.iter().any(|candidate| same_email(candidate, email))
}

/// Raw documents of the three calendar collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDocuments {
    pub shifts: Vec<CalendarEvent>,
    pub availabilities: Vec<CalendarEvent>,
    pub student_requests: Vec<CalendarEvent>,
}

impl CalendarDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the three slices from a mixed list of documents.
    pub fn from_events(events: impl IntoIterator<Item = CalendarEvent>) -> Self {
        let mut documents = Self::new();
        for event in events {
            documents.slice_mut(event.entity_type()).push(event);
        }
        documents
    }

    pub fn slice(&self, entity_type: EntityType) -> &[CalendarEvent] {
        match entity_type {
            EntityType::Shift => &self.shifts,
            EntityType::Availability => &self.availabilities,
            EntityType::StudentRequest => &self.student_requests,
        }
    }

    pub fn slice_mut(&mut self, entity_type: EntityType) -> &mut Vec<CalendarEvent> {
        match entity_type {
            EntityType::Shift => &mut self.shifts,
            EntityType::Availability => &mut self.availabilities,
            EntityType::StudentRequest => &mut self.student_requests,
        }
    }

    /// Replaces a whole slice with a fresh store snapshot.
    pub fn replace_slice(&mut self, entity_type: EntityType, events: Vec<CalendarEvent>) {
        *self.slice_mut(entity_type) = events;
    }

    pub fn find(&self, entity_type: EntityType, id: &EventId) -> Option<&CalendarEvent> {
        self.slice(entity_type).iter().find(|e| &e.id == id)
    }

    /// Inserts the event or replaces the document with the same id.
    pub fn upsert(&mut self, event: CalendarEvent) {
        let slice = self.slice_mut(event.entity_type());
        match slice.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event,
            None => slice.push(event),
        }
    }

    /// Removes the document with the given id, returning it if present.
    pub fn remove(&mut self, entity_type: EntityType, id: &EventId) -> Option<CalendarEvent> {
        let slice = self.slice_mut(entity_type);
        let position = slice.iter().position(|e| &e.id == id)?;
        Some(slice.remove(position))
    }

    pub fn len(&self) -> usize {
        self.shifts.len() + self.availabilities.len() + self.student_requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
