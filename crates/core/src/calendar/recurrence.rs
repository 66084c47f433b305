//! Expansion of recurring templates into concrete occurrences.
//!
//! Pure functions only. The expander runs on every fresh store snapshot to
//! build the in-memory calendar, and the materialization helpers decide which
//! generated occurrences must be frozen into standalone documents.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::storage::TimeWindow;

use super::types::{CalendarEvent, EventId, Frequency, OccurrenceRef, Recurrence};

/// Upper bound on the number of occurrences generated per series.
///
/// The defaults cover roughly one year whatever the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionLimits {
    pub weekly: u32,
    pub fortnightly: u32,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            weekly: 52,
            fortnightly: 26,
        }
    }
}

impl ExpansionLimits {
    /// Uses the same cap for every frequency.
    pub fn uniform(max_occurrences: u32) -> Self {
        Self {
            weekly: max_occurrences,
            fortnightly: max_occurrences,
        }
    }

    /// Maximum occurrence count (template included) for a frequency.
    pub fn cap(&self, frequency: Frequency) -> u32 {
        match frequency {
            Frequency::None => 1,
            Frequency::Weekly => self.weekly,
            Frequency::Fortnightly => self.fortnightly,
        }
    }
}

/// Start of the occurrence at `index`, ignoring exceptions and the cutoff.
///
/// Returns `None` for one-off events.
pub fn occurrence_start(template: &CalendarEvent, index: u32) -> Option<DateTime<Utc>> {
    let period = template.recurrence.frequency.period()?;
    Some(template.start + period * index as i32)
}

/// Cutoff applied to a series when it is split at an occurrence.
///
/// The series keeps every occurrence starting at least one day before the
/// split point, whatever its period.
pub fn this_and_future_cutoff(occurrence_start: DateTime<Utc>) -> DateTime<Utc> {
    occurrence_start - Duration::days(1)
}

/// Expands every series template into its occurrences.
///
/// Each template is followed immediately by the occurrences it generates in
/// `window`; the template row itself is left out once index 0 is an exception.
/// One-off events and persisted occurrences pass through unchanged.
/// A generated occurrence whose id already exists among `events` is skipped:
/// once materialized, the persisted document is authoritative.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use tutorsync_core::calendar::{expand_events, CalendarEvent, ExpansionLimits, Recurrence};
/// use tutorsync_core::storage::TimeWindow;
///
/// let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap();
/// let template = CalendarEvent::shift("Algebra", start, end)
///     .with_id("algebra")
///     .with_recurrence(Recurrence::weekly());
///
/// let window = TimeWindow::new(
///     Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
/// )
/// .unwrap();
///
/// let expanded = expand_events(&[template], &window, &ExpansionLimits::default());
/// assert_eq!(expanded.len(), 4);
/// assert_eq!(expanded[3].id.as_str(), "algebra_occurrence_3");
/// ```
pub fn expand_events(
    events: &[CalendarEvent],
    window: &TimeWindow,
    limits: &ExpansionLimits,
) -> Vec<CalendarEvent> {
    let persisted: HashSet<&EventId> = events.iter().map(|event| &event.id).collect();
    let mut expanded = Vec::with_capacity(events.len());

    for event in events {
        if !event.is_series_template() {
            expanded.push(event.clone());
            continue;
        }
        if !event.recurrence.exceptions.contains(&0) {
            expanded.push(event.clone());
        }
        let cap = limits.cap(event.recurrence.frequency);
        expanded.extend(generate_occurrences(event, window, cap, &persisted));
    }

    expanded
}

fn generate_occurrences(
    template: &CalendarEvent,
    window: &TimeWindow,
    cap: u32,
    persisted: &HashSet<&EventId>,
) -> Vec<CalendarEvent> {
    let mut occurrences = Vec::new();

    for index in 1..cap {
        if template.recurrence.exceptions.contains(&index) {
            continue;
        }
        let Some(start) = occurrence_start(template, index) else {
            break;
        };
        if template.recurrence.until.is_some_and(|until| start > until) {
            break;
        }
        if start >= window.end {
            break;
        }
        if start < window.start {
            continue;
        }

        let id = template.id.occurrence(index);
        if persisted.contains(&id) {
            continue;
        }
        occurrences.push(build_occurrence(template, id, index, start));
    }

    occurrences
}

fn build_occurrence(
    template: &CalendarEvent,
    id: EventId,
    index: u32,
    start: DateTime<Utc>,
) -> CalendarEvent {
    let mut occurrence = template.clone();
    occurrence.end = start + template.duration();
    occurrence.start = start;
    occurrence.instance = Some(OccurrenceRef {
        recurring_event_id: template.id.clone(),
        occurrence_index: index,
        materialized: false,
    });
    occurrence.id = id;
    occurrence
}

/// Rebuilds the generated occurrence at `index` of a series template.
///
/// Returns `None` for the template row, excluded indices and indices past
/// `until`. The per-frequency cap is not applied.
pub fn occurrence_at(template: &CalendarEvent, index: u32) -> Option<CalendarEvent> {
    if index == 0
        || !template.is_series_template()
        || template.recurrence.exceptions.contains(&index)
    {
        return None;
    }
    let start = occurrence_start(template, index)?;
    if template.recurrence.until.is_some_and(|until| start > until) {
        return None;
    }
    Some(build_occurrence(template, template.id.occurrence(index), index, start))
}

/// Selects generated occurrences that have started and are not persisted yet.
pub fn due_for_materialization<'a>(
    expanded: &'a [CalendarEvent],
    existing_ids: &HashSet<EventId>,
    now: DateTime<Utc>,
) -> Vec<&'a CalendarEvent> {
    expanded
        .iter()
        .filter(|event| event.is_transient_instance())
        .filter(|event| event.start <= now)
        .filter(|event| !existing_ids.contains(&event.id))
        .collect()
}

/// Turns a generated occurrence into the standalone document that gets persisted.
///
/// The recurrence rule is dropped; only the back-reference to the series remains.
pub fn materialize_occurrence(occurrence: &CalendarEvent, now: DateTime<Utc>) -> CalendarEvent {
    let mut document = occurrence.clone();
    document.recurrence = Recurrence::none();
    if let Some(instance) = document.instance.as_mut() {
        instance.materialized = true;
    }
    document.updated_at = now;
    document
}
