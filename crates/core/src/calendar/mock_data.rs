//! Mock data generation for development and seeding.
//!
//! Pure functions with no side effects, usable from unit tests and from the
//! development binary.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use super::types::{CalendarEvent, EntityType, Recurrence, WorkType};

/// People the generated calendar is built around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub tutors: Vec<String>,
    pub students: Vec<String>,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            tutors: vec![
                "ana.tutor@example.com".to_string(),
                "ben.tutor@example.com".to_string(),
            ],
            students: vec![
                "cara.student@example.com".to_string(),
                "dev.student@example.com".to_string(),
                "eli.student@example.com".to_string(),
            ],
        }
    }
}

/// Generate mock calendar documents spread over the week around a center date.
///
/// Creates a realistic mix:
/// - ~40% availability blocks (every third one repeats weekly)
/// - ~40% shifts inside those blocks (every fourth one repeats weekly)
/// - ~20% pending student requests
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use tutorsync_core::calendar::{generate_seed_events, Roster};
///
/// let center = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
/// let events = generate_seed_events(&Roster::default(), center, 20);
///
/// assert_eq!(events.len(), 20);
/// ```
pub fn generate_seed_events(
    roster: &Roster,
    center_date: NaiveDate,
    count: u32,
) -> Vec<CalendarEvent> {
    let at = |offset: i64, hour: i64| -> DateTime<Utc> {
        (center_date + Duration::days(offset))
            .and_time(NaiveTime::MIN)
            .and_utc()
            + Duration::hours(hour)
    };

    let availability_count = (count * 2).div_ceil(5);
    let shift_count = (count * 2).div_ceil(5);
    let request_count = count.saturating_sub(availability_count + shift_count);
    let shift_count = shift_count.min(count.saturating_sub(availability_count));

    let mut events = Vec::with_capacity(count as usize);
    let tutor = |i: u32| -> String {
        roster
            .tutors
            .get(i as usize % roster.tutors.len().max(1))
            .cloned()
            .unwrap_or_default()
    };
    let student = |i: u32| -> String {
        roster
            .students
            .get(i as usize % roster.students.len().max(1))
            .cloned()
            .unwrap_or_default()
    };

    for i in 0..availability_count {
        let day = (i % 5) as i64 - 2;
        let work_type = if i % 2 == 0 {
            WorkType::InPerson
        } else {
            WorkType::Online
        };
        let mut block =
            CalendarEvent::availability(tutor(i), at(day, 9), at(day, 17)).with_work_type(work_type);
        if i % 3 == 0 {
            block = block.with_recurrence(Recurrence::weekly());
        }
        events.push(block);
    }

    let subjects = ["Algebra", "Essay Writing", "Chemistry", "Reading Club", "Calculus"];
    for i in 0..shift_count {
        let day = (i % 5) as i64 - 2;
        let hour = 10 + (i % 5) as i64;
        let title = subjects[i as usize % subjects.len()];
        let mut shift = CalendarEvent::shift(title, at(day, hour), at(day, hour + 1))
            .with_staff([tutor(i)])
            .with_students([student(i)])
            .with_online(i % 2 == 1);
        if i % 4 == 0 {
            shift = shift.with_recurrence(Recurrence::weekly());
        }
        events.push(shift);
    }

    for i in 0..request_count {
        let day = (i % 7) as i64 - 3;
        let hour = 15 + (i % 3) as i64;
        events.push(CalendarEvent::student_request(
            student(i),
            "Extra help",
            at(day, hour),
            at(day, hour + 1),
        ));
    }

    events
}

/// Format an entity type for human-readable display.
pub fn format_entity_type(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Shift => "shift",
        EntityType::Availability => "availability",
        EntityType::StudentRequest => "student request",
    }
}
