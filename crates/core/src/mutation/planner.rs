//! Pure planning of calendar mutations.
//!
//! A planner receives the raw documents, the entity the user acted on (a
//! one-off event, a series template, a generated occurrence or a materialized
//! one) and returns the [`MutationPlan`] describing every write. Nothing is
//! touched until the caller applies the plan.

use chrono::{DateTime, Utc};

use crate::calendar::{
    materialize_occurrence, occurrence_at, occurrence_start, same_email, this_and_future_cutoff,
    validate_event,
    ApprovalStatus, CalendarDocuments, CalendarEvent, Confirmation, EntityType, EventDetails,
    EventError, EventId, MeetingRef, Recurrence,
};
use crate::notification::NotificationIntent;

use super::types::{DeleteOption, MeetingAction, MutationPlan, UpdateOption};

/// How the acted-on entity relates to its series.
enum Target<'a> {
    /// A one-off event, or a materialized occurrence whose series is gone.
    Document,
    /// The template row, occurrence 0 of a series.
    Template,
    /// An occurrence of a stored series.
    Occurrence {
        template: &'a CalendarEvent,
        index: u32,
        /// The occurrence is a materialized document of its own.
        persisted: bool,
    },
}

fn resolve<'a>(
    documents: &'a CalendarDocuments,
    entity: &CalendarEvent,
) -> Result<Target<'a>, EventError> {
    if entity.is_series_template() {
        return Ok(Target::Template);
    }
    let Some(instance) = &entity.instance else {
        return Ok(Target::Document);
    };
    match find_template(documents, entity) {
        Some(template) => Ok(Target::Occurrence {
            template,
            index: instance.occurrence_index,
            persisted: instance.materialized,
        }),
        None if instance.materialized => Ok(Target::Document),
        None => Err(EventError::SeriesNotFound(entity.series_id().to_string())),
    }
}

/// Looks up the stored version of `entity`.
///
/// Documents are matched by id within their collection. Occurrences that
/// only exist in memory are rebuilt from their stored template. Returns
/// `None` when nothing stored backs the entity.
pub fn stored_entity(
    documents: &CalendarDocuments,
    entity: &CalendarEvent,
) -> Option<CalendarEvent> {
    if let Some(stored) = documents.find(entity.entity_type(), &entity.id) {
        return Some(stored.clone());
    }
    let index = entity.occurrence_index()?;
    let occurrence = occurrence_at(find_template(documents, entity)?, index)?;
    (occurrence.id == entity.id).then_some(occurrence)
}

fn find_template<'a>(
    documents: &'a CalendarDocuments,
    entity: &CalendarEvent,
) -> Option<&'a CalendarEvent> {
    documents
        .find(entity.entity_type(), entity.series_id())
        .filter(|template| template.is_series_template())
}

/// Copies an occurrence into a fresh document detached from its series.
///
/// The series meeting stays with the series.
fn detach(occurrence: &CalendarEvent, now: DateTime<Utc>) -> CalendarEvent {
    let mut event = occurrence.clone();
    event.id = EventId::generate();
    event.instance = None;
    event.recurrence = Recurrence::none();
    event.updated_at = now;
    if let Some(shift) = event.as_shift_mut() {
        shift.meeting = None;
    }
    event
}

fn with_exception(template: &CalendarEvent, index: u32, now: DateTime<Utc>) -> CalendarEvent {
    let mut template = template.clone();
    template.recurrence.exceptions.insert(index);
    template.updated_at = now;
    template
}

fn truncated(template: &CalendarEvent, index: u32, now: DateTime<Utc>) -> CalendarEvent {
    let split_at = occurrence_start(template, index).unwrap_or(template.start);
    let mut template = template.clone();
    template.recurrence.until = Some(this_and_future_cutoff(split_at));
    template.updated_at = now;
    template
}

/// Occurrences share the meeting of their template and never own it.
fn owned_meeting(event: &CalendarEvent) -> Option<&MeetingRef> {
    if event.is_instance() {
        return None;
    }
    event.meeting()
}

fn meeting_update(event: &CalendarEvent) -> Option<MeetingAction> {
    owned_meeting(event).map(|meeting| MeetingAction::Update {
        event_id: event.id.clone(),
        meeting_id: meeting.meeting_id.clone(),
    })
}

fn meeting_delete(event: &CalendarEvent) -> Option<MeetingAction> {
    owned_meeting(event).map(|meeting| MeetingAction::Delete {
        meeting_id: meeting.meeting_id.clone(),
    })
}

fn meeting_create(event: &CalendarEvent) -> Option<MeetingAction> {
    let shift = event.as_shift()?;
    (shift.online && shift.meeting.is_none()).then(|| MeetingAction::Create {
        event_id: event.id.clone(),
    })
}

/// Plans the creation of a new event.
pub fn plan_create(event: &CalendarEvent, now: DateTime<Utc>) -> Result<MutationPlan, EventError> {
    validate_event(event)?;
    let mut event = event.clone();
    event.instance = None;
    event.updated_at = now;

    Ok(MutationPlan::new(event.entity_type())
        .with_meeting(meeting_create(&event))
        .notify(NotificationIntent::Created(event.clone()))
        .put(event))
}

/// Plans a move or resize of `entity` to `[new_start, new_end)`.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use tutorsync_core::calendar::{expand_events, CalendarDocuments, CalendarEvent, ExpansionLimits, Recurrence};
/// use tutorsync_core::mutation::{plan_reschedule, UpdateOption};
/// use tutorsync_core::storage::TimeWindow;
///
/// let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
/// let template = CalendarEvent::shift("Algebra", start, start + Duration::hours(1))
///     .with_id("algebra")
///     .with_recurrence(Recurrence::weekly());
/// let documents = CalendarDocuments::from_events([template.clone()]);
///
/// let window = TimeWindow::new(start, start + Duration::days(28)).unwrap();
/// let expanded = expand_events(&[template], &window, &ExpansionLimits::default());
/// let third = &expanded[3];
///
/// let plan = plan_reschedule(
///     &documents,
///     third,
///     third.start + Duration::hours(2),
///     third.end + Duration::hours(2),
///     UpdateOption::ThisAndFuture,
///     Utc::now(),
/// )
/// .unwrap();
///
/// let until = plan.written().next().unwrap().recurrence.until.unwrap();
/// assert_eq!(until, Utc.with_ymd_and_hms(2025, 1, 26, 9, 0, 0).unwrap());
/// ```
pub fn plan_reschedule(
    documents: &CalendarDocuments,
    entity: &CalendarEvent,
    new_start: DateTime<Utc>,
    new_end: DateTime<Utc>,
    option: UpdateOption,
    now: DateTime<Utc>,
) -> Result<MutationPlan, EventError> {
    let collection = entity.entity_type();
    let retimed = |base: &CalendarEvent| {
        let mut event = base.clone();
        event.start = new_start;
        event.end = new_end;
        event.updated_at = now;
        event
    };

    let in_place = |entity: &CalendarEvent| -> Result<MutationPlan, EventError> {
        let updated = retimed(entity);
        validate_event(&updated)?;
        Ok(MutationPlan::new(collection)
            .with_meeting(meeting_update(&updated))
            .notify(NotificationIntent::Updated {
                event: updated.clone(),
                previous: entity.clone(),
            })
            .put(updated))
    };

    match (resolve(documents, entity)?, option) {
        (Target::Document, _)
        | (Target::Template, UpdateOption::ThisAndFuture)
        | (Target::Occurrence { persisted: true, .. }, UpdateOption::This) => in_place(entity),
        (Target::Template, UpdateOption::This) => {
            let standalone = retimed(&detach(entity, now));
            validate_event(&standalone)?;
            Ok(MutationPlan::new(collection)
                .with_meeting(meeting_create(&standalone))
                .notify(NotificationIntent::Updated {
                    event: standalone.clone(),
                    previous: entity.clone(),
                })
                .put(with_exception(entity, 0, now))
                .put(standalone))
        }
        (Target::Occurrence { template, index, .. }, UpdateOption::This) => {
            let standalone = retimed(&detach(entity, now));
            validate_event(&standalone)?;
            Ok(MutationPlan::new(collection)
                .with_meeting(meeting_create(&standalone))
                .notify(NotificationIntent::Updated {
                    event: standalone.clone(),
                    previous: entity.clone(),
                })
                .put(with_exception(template, index, now))
                .put(standalone))
        }
        (
            Target::Occurrence {
                template,
                index,
                persisted,
            },
            UpdateOption::ThisAndFuture,
        ) => {
            let mut series = retimed(&detach(entity, now));
            series.recurrence = Recurrence {
                frequency: template.recurrence.frequency,
                until: template.recurrence.until,
                exceptions: template
                    .recurrence
                    .exceptions
                    .iter()
                    .filter(|&&skipped| skipped > index)
                    .map(|skipped| skipped - index)
                    .collect(),
            };
            validate_event(&series)?;
            let mut plan = MutationPlan::new(collection)
                .with_meeting(meeting_create(&series))
                .with_cascade(template.id.clone(), index)
                .notify(NotificationIntent::Updated {
                    event: series.clone(),
                    previous: entity.clone(),
                })
                .put(truncated(template, index, now))
                .put(series);
            if persisted {
                plan = plan.delete(entity.id.clone());
            }
            Ok(plan)
        }
    }
}

/// Plans the removal of `entity` with the given scope.
pub fn plan_delete(
    documents: &CalendarDocuments,
    entity: &CalendarEvent,
    option: DeleteOption,
    now: DateTime<Utc>,
) -> Result<MutationPlan, EventError> {
    let collection = entity.entity_type();
    let deleted = |id: &EventId| NotificationIntent::Deleted {
        collection,
        id: id.clone(),
    };

    match (resolve(documents, entity)?, option) {
        // The series goes on; only its first row is hidden.
        (Target::Template, DeleteOption::This) => {
            Ok(MutationPlan::new(collection).put(with_exception(entity, 0, now)))
        }
        (Target::Template, DeleteOption::ThisAndFuture | DeleteOption::All) => {
            Ok(delete_series(entity, collection).notify(deleted(&entity.id)))
        }
        (Target::Document, _) => Ok(MutationPlan::new(collection)
            .with_meeting(meeting_delete(entity))
            .notify(deleted(&entity.id))
            .delete(entity.id.clone())),
        (
            Target::Occurrence {
                template,
                index,
                persisted,
            },
            DeleteOption::This,
        ) => {
            // A deleted materialized occurrence must not be generated again.
            let plan = MutationPlan::new(collection)
                .notify(deleted(&entity.id))
                .put(with_exception(template, index, now));
            Ok(if persisted {
                plan.delete(entity.id.clone())
            } else {
                plan
            })
        }
        (
            Target::Occurrence {
                template,
                index,
                persisted,
            },
            DeleteOption::ThisAndFuture,
        ) => {
            let plan = MutationPlan::new(collection)
                .with_cascade(template.id.clone(), index)
                .notify(deleted(&entity.id))
                .put(truncated(template, index, now));
            Ok(if persisted {
                plan.delete(entity.id.clone())
            } else {
                plan
            })
        }
        (Target::Occurrence { template, .. }, DeleteOption::All) => {
            Ok(delete_series(template, collection).notify(deleted(&template.id)))
        }
    }
}

fn delete_series(template: &CalendarEvent, collection: EntityType) -> MutationPlan {
    MutationPlan::new(collection)
        .with_meeting(meeting_delete(template))
        .with_cascade(template.id.clone(), 0)
        .delete(template.id.clone())
}

/// Plans a participant's answer to a shift invitation.
///
/// Answering a generated occurrence materializes it so the answer has a
/// document to live on.
pub fn plan_confirmation(
    entity: &CalendarEvent,
    email: &str,
    accepted: bool,
    now: DateTime<Utc>,
) -> Result<MutationPlan, EventError> {
    if entity.as_shift().is_none() {
        return Err(EventError::NotAShift);
    }

    let mut event = if entity.is_transient_instance() {
        materialize_occurrence(entity, now)
    } else {
        entity.clone()
    };
    event.updated_at = now;

    let answer = if accepted {
        Confirmation::Accepted
    } else {
        Confirmation::Declined
    };
    if let Some(shift) = event.as_shift_mut() {
        let key = shift
            .confirmations
            .keys()
            .find(|existing| same_email(existing, email))
            .cloned()
            .unwrap_or_else(|| email.to_ascii_lowercase());
        shift.confirmations.insert(key, answer);
    }

    Ok(MutationPlan::new(event.entity_type()).put(event))
}

/// Plans a standalone copy of `entity` with a new id.
///
/// The copy never recurs. Requests start over as pending; shifts lose their
/// meeting and every confirmation.
pub fn plan_duplicate(entity: &CalendarEvent, now: DateTime<Utc>) -> Result<MutationPlan, EventError> {
    let mut copy = detach(entity, now);
    match &mut copy.details {
        EventDetails::Shift(shift) => {
            shift.meeting = None;
            shift.confirmations.clear();
        }
        EventDetails::StudentRequest(request) => request.approval = ApprovalStatus::Pending,
        EventDetails::Availability(_) => {}
    }
    plan_create(&copy, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{expand_events, ExpansionLimits};
    use crate::mutation::Cascade;
    use crate::storage::{StoreOp, TimeWindow};
    use chrono::TimeZone;

    fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        at(1, 2, 12)
    }

    fn template() -> CalendarEvent {
        CalendarEvent::shift("Algebra", at(1, 6, 9), at(1, 6, 10))
            .with_id("tpl")
            .with_staff(["tutor@example.com"])
            .with_recurrence(Recurrence::weekly())
    }

    fn setup(template: CalendarEvent) -> (CalendarDocuments, Vec<CalendarEvent>) {
        let window = TimeWindow::new(at(1, 1, 0), at(3, 1, 0)).unwrap();
        let expanded = expand_events(
            std::slice::from_ref(&template),
            &window,
            &ExpansionLimits::default(),
        );
        (CalendarDocuments::from_events([template]), expanded)
    }

    fn occurrence(expanded: &[CalendarEvent], index: u32) -> &CalendarEvent {
        expanded
            .iter()
            .find(|e| e.occurrence_index() == Some(index))
            .unwrap()
    }

    fn puts(plan: &MutationPlan) -> Vec<&CalendarEvent> {
        plan.written().collect()
    }

    #[test]
    fn test_create_plan() {
        let shift = CalendarEvent::shift("New", at(1, 6, 9), at(1, 6, 10)).with_online(true);
        let plan = plan_create(&shift, now()).unwrap();

        assert_eq!(plan.collection, EntityType::Shift);
        assert_eq!(puts(&plan)[0].updated_at, now());
        assert_eq!(
            plan.meeting,
            Some(MeetingAction::Create {
                event_id: shift.id.clone()
            })
        );
        assert!(matches!(plan.notifications[0], NotificationIntent::Created(_)));
    }

    #[test]
    fn test_create_rejects_invalid_event() {
        let shift = CalendarEvent::shift("Inverted", at(1, 6, 10), at(1, 6, 9));
        assert_eq!(plan_create(&shift, now()), Err(EventError::InvalidTimeRange));
    }

    #[test]
    fn test_move_one_off_event() {
        let shift = CalendarEvent::shift("Once", at(1, 6, 9), at(1, 6, 10)).with_id("once");
        let documents = CalendarDocuments::from_events([shift.clone()]);

        let plan = plan_reschedule(
            &documents,
            &shift,
            at(1, 7, 9),
            at(1, 7, 10),
            UpdateOption::ThisAndFuture,
            now(),
        )
        .unwrap();

        let written = puts(&plan);
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id.as_str(), "once");
        assert_eq!(written[0].start, at(1, 7, 9));
        assert!(plan.cascade.is_none());
    }

    #[test]
    fn test_move_single_occurrence_detaches_it() {
        let (documents, expanded) = setup(template());
        let second = occurrence(&expanded, 2);

        let plan = plan_reschedule(
            &documents,
            second,
            at(1, 21, 14),
            at(1, 21, 15),
            UpdateOption::This,
            now(),
        )
        .unwrap();

        let written = puts(&plan);
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].id.as_str(), "tpl");
        assert!(written[0].recurrence.exceptions.contains(&2));

        let standalone = written[1];
        assert_ne!(standalone.id.as_str(), "tpl_occurrence_2");
        assert!(!standalone.is_recurring());
        assert!(!standalone.is_instance());
        assert_eq!((standalone.start, standalone.end), (at(1, 21, 14), at(1, 21, 15)));
        assert_eq!(standalone.as_shift(), second.as_shift());
    }

    #[test]
    fn test_move_this_and_future_splits_series() {
        let (documents, expanded) = setup(template().with_exceptions([2, 5, 7]));
        let third = occurrence(&expanded, 3);

        let plan = plan_reschedule(
            &documents,
            third,
            at(1, 27, 11),
            at(1, 27, 12),
            UpdateOption::ThisAndFuture,
            now(),
        )
        .unwrap();

        let written = puts(&plan);
        let old = written[0];
        assert_eq!(old.id.as_str(), "tpl");
        assert_eq!(old.recurrence.until, Some(at(1, 26, 9)));

        let new_series = written[1];
        assert!(new_series.is_series_template());
        assert_eq!(new_series.start, at(1, 27, 11));
        assert_eq!(new_series.recurrence.until, None);
        assert_eq!(
            new_series.recurrence.exceptions.iter().copied().collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert_eq!(
            plan.cascade,
            Some(Cascade {
                series: EventId::new("tpl"),
                from_index: 3
            })
        );
    }

    #[test]
    fn test_truncated_series_keeps_earlier_occurrences() {
        let (documents, expanded) = setup(template());
        let third = occurrence(&expanded, 3);
        let plan = plan_delete(&documents, third, DeleteOption::ThisAndFuture, now()).unwrap();

        let mut documents = documents;
        plan.apply(&mut documents);

        let window = TimeWindow::new(at(1, 1, 0), at(3, 1, 0)).unwrap();
        let remaining = expand_events(&documents.shifts, &window, &ExpansionLimits::default());
        let starts: Vec<_> = remaining.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![at(1, 6, 9), at(1, 13, 9), at(1, 20, 9)]);
    }

    #[test]
    fn test_move_template_row_alone_leaves_series_in_place() {
        let (mut documents, expanded) = setup(template());
        let plan = plan_reschedule(
            &documents,
            &expanded[0],
            at(1, 6, 14),
            at(1, 6, 15),
            UpdateOption::This,
            now(),
        )
        .unwrap();

        let written = puts(&plan);
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].id.as_str(), "tpl");
        assert_eq!(written[0].start, at(1, 6, 9));
        assert!(written[0].recurrence.exceptions.contains(&0));
        assert!(!written[1].is_recurring());

        plan.apply(&mut documents);
        let window = TimeWindow::new(at(1, 1, 0), at(1, 25, 0)).unwrap();
        let mut calendar = expand_events(&documents.shifts, &window, &ExpansionLimits::default());
        calendar.sort_by_key(|e| e.start);
        let starts: Vec<_> = calendar.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![at(1, 6, 14), at(1, 13, 9), at(1, 20, 9)]);
    }

    #[test]
    fn test_move_template_row_this_and_future_retimes_series() {
        let (documents, expanded) = setup(template());
        let plan = plan_reschedule(
            &documents,
            &expanded[0],
            at(1, 6, 10),
            at(1, 6, 11),
            UpdateOption::ThisAndFuture,
            now(),
        )
        .unwrap();

        let written = puts(&plan);
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id.as_str(), "tpl");
        assert_eq!(written[0].start, at(1, 6, 10));
    }

    #[test]
    fn test_detached_online_occurrence_gets_its_own_meeting() {
        let meeting = MeetingRef {
            meeting_id: "series-meeting".to_string(),
            join_url: "https://meet.example.com/series".to_string(),
        };
        let (documents, expanded) = setup(template().with_online(true).with_meeting(meeting));
        let first = occurrence(&expanded, 1);

        let plan = plan_reschedule(
            &documents,
            first,
            at(1, 14, 9),
            at(1, 14, 10),
            UpdateOption::This,
            now(),
        )
        .unwrap();

        let standalone = puts(&plan)[1];
        assert!(standalone.meeting().is_none());
        assert_eq!(
            plan.meeting,
            Some(MeetingAction::Create {
                event_id: standalone.id.clone()
            })
        );
    }

    #[test]
    fn test_reschedule_rejects_inverted_times() {
        let (documents, expanded) = setup(template());
        let result = plan_reschedule(
            &documents,
            occurrence(&expanded, 1),
            at(1, 13, 10),
            at(1, 13, 9),
            UpdateOption::This,
            now(),
        );
        assert_eq!(result, Err(EventError::InvalidTimeRange));
    }

    #[test]
    fn test_orphan_occurrence_is_rejected() {
        let (_, expanded) = setup(template());
        let result = plan_delete(
            &CalendarDocuments::new(),
            occurrence(&expanded, 1),
            DeleteOption::This,
            now(),
        );
        assert_eq!(result, Err(EventError::SeriesNotFound("tpl".to_string())));
    }

    #[test]
    fn test_delete_single_occurrence_adds_exception() {
        let (documents, expanded) = setup(template());
        let plan = plan_delete(&documents, occurrence(&expanded, 2), DeleteOption::This, now())
            .unwrap();

        assert_eq!(plan.ops.len(), 1);
        assert!(puts(&plan)[0].recurrence.exceptions.contains(&2));
        assert_eq!(plan.notifications[0].event_id().as_str(), "tpl_occurrence_2");
    }

    #[test]
    fn test_delete_template_row_alone_hides_it() {
        let (mut documents, expanded) = setup(template());
        let plan = plan_delete(&documents, &expanded[0], DeleteOption::This, now()).unwrap();
        assert!(plan.notifications.is_empty());

        plan.apply(&mut documents);
        let template = documents.find(EntityType::Shift, &EventId::new("tpl")).unwrap();
        assert!(template.recurrence.exceptions.contains(&0));

        let window = TimeWindow::new(at(1, 1, 0), at(1, 25, 0)).unwrap();
        let remaining = expand_events(&documents.shifts, &window, &ExpansionLimits::default());
        let starts: Vec<_> = remaining.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![at(1, 13, 9), at(1, 20, 9)]);
    }

    #[test]
    fn test_delete_all_removes_series_and_cascades() {
        let meeting = MeetingRef {
            meeting_id: "m-1".to_string(),
            join_url: "https://meet.example.com/m-1".to_string(),
        };
        let (documents, expanded) = setup(template().with_meeting(meeting));
        let plan = plan_delete(&documents, occurrence(&expanded, 4), DeleteOption::All, now())
            .unwrap();

        assert_eq!(plan.ops, vec![StoreOp::Delete(EventId::new("tpl"))]);
        assert_eq!(plan.cascade.as_ref().map(|c| c.from_index), Some(0));
        assert_eq!(
            plan.meeting,
            Some(MeetingAction::Delete {
                meeting_id: "m-1".to_string()
            })
        );
    }

    #[test]
    fn test_delete_materialized_occurrence() {
        let (mut documents, expanded) = setup(template());
        let persisted = materialize_occurrence(occurrence(&expanded, 1), at(1, 13, 9));
        documents.upsert(persisted.clone());

        let plan = plan_delete(&documents, &persisted, DeleteOption::This, now()).unwrap();
        plan.apply(&mut documents);

        assert!(documents.find(EntityType::Shift, &persisted.id).is_none());
        let template = documents.find(EntityType::Shift, &EventId::new("tpl")).unwrap();
        assert!(template.recurrence.exceptions.contains(&1));
    }

    #[test]
    fn test_delete_materialized_occurrence_this_and_future_truncates_series() {
        let (mut documents, expanded) = setup(template());
        let first = materialize_occurrence(occurrence(&expanded, 1), at(1, 13, 9));
        let second = materialize_occurrence(occurrence(&expanded, 2), at(1, 20, 9));
        documents.upsert(first.clone());
        documents.upsert(second);

        let plan = plan_delete(&documents, &first, DeleteOption::ThisAndFuture, now()).unwrap();
        assert_eq!(
            plan.cascade,
            Some(Cascade {
                series: EventId::new("tpl"),
                from_index: 1
            })
        );
        plan.apply(&mut documents);

        let window = TimeWindow::new(at(1, 1, 0), at(3, 1, 0)).unwrap();
        let remaining = expand_events(&documents.shifts, &window, &ExpansionLimits::default());
        let ids: Vec<&str> = remaining.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["tpl"]);
        assert_eq!(remaining[0].recurrence.until, Some(at(1, 12, 9)));
    }

    #[test]
    fn test_delete_materialized_occurrence_all_removes_series() {
        let (mut documents, expanded) = setup(template());
        let first = materialize_occurrence(occurrence(&expanded, 1), at(1, 13, 9));
        documents.upsert(first.clone());

        let plan = plan_delete(&documents, &first, DeleteOption::All, now()).unwrap();
        assert_eq!(plan.ops, vec![StoreOp::Delete(EventId::new("tpl"))]);
        assert_eq!(plan.cascade.as_ref().map(|c| c.from_index), Some(0));

        plan.apply(&mut documents);
        assert!(documents.shifts.is_empty());
    }

    #[test]
    fn test_move_materialized_occurrence_this_and_future_splits_series() {
        let (mut documents, expanded) = setup(template());
        let second = materialize_occurrence(occurrence(&expanded, 2), at(1, 20, 9));
        documents.upsert(second.clone());

        let plan = plan_reschedule(
            &documents,
            &second,
            at(1, 20, 11),
            at(1, 20, 12),
            UpdateOption::ThisAndFuture,
            now(),
        )
        .unwrap();
        assert!(plan.ops.contains(&StoreOp::Delete(second.id.clone())));

        plan.apply(&mut documents);
        let old = documents.find(EntityType::Shift, &EventId::new("tpl")).unwrap();
        assert_eq!(old.recurrence.until, Some(at(1, 19, 9)));
        assert!(documents.find(EntityType::Shift, &second.id).is_none());
        let new_series = documents
            .shifts
            .iter()
            .find(|e| e.is_series_template() && e.id.as_str() != "tpl")
            .unwrap();
        assert_eq!(new_series.start, at(1, 20, 11));
    }

    #[test]
    fn test_stored_entity_ignores_caller_fields() {
        let (mut documents, expanded) = setup(template().with_exceptions([3]));

        let mut forged = template();
        forged.title = "Forged".to_string();
        assert_eq!(stored_entity(&documents, &forged).unwrap().title, "Algebra");

        let mut stale = occurrence(&expanded, 2).clone();
        stale.start = at(1, 21, 7);
        let rebuilt = stored_entity(&documents, &stale).unwrap();
        assert_eq!(rebuilt.start, at(1, 20, 9));
        assert!(rebuilt.is_transient_instance());

        let persisted = materialize_occurrence(occurrence(&expanded, 1), at(1, 13, 9));
        documents.upsert(persisted.clone());
        assert_eq!(
            stored_entity(&documents, occurrence(&expanded, 1)),
            Some(persisted)
        );

        let mut excluded = occurrence(&expanded, 2).clone();
        excluded.id = EventId::new("tpl").occurrence(3);
        excluded.instance.as_mut().unwrap().occurrence_index = 3;
        assert!(stored_entity(&documents, &excluded).is_none());

        let unknown = CalendarEvent::shift("Unknown", at(1, 6, 9), at(1, 6, 10));
        assert!(stored_entity(&documents, &unknown).is_none());
    }

    #[test]
    fn test_apply_cascade_drops_later_materialized_occurrences() {
        let (mut documents, expanded) = setup(template());
        for index in 1..=4 {
            documents.upsert(materialize_occurrence(occurrence(&expanded, index), now()));
        }

        let plan = plan_delete(&documents, &expanded[0], DeleteOption::All, now()).unwrap();
        plan.apply(&mut documents);
        assert!(documents.shifts.is_empty());
    }

    #[test]
    fn test_confirmation_on_generated_occurrence_materializes_it() {
        let (_, expanded) = setup(template().with_students(["student@example.com"]));
        let plan =
            plan_confirmation(occurrence(&expanded, 1), "Student@Example.com", true, now()).unwrap();

        let written = puts(&plan);
        assert!(written[0].is_materialized());
        assert_eq!(written[0].id.as_str(), "tpl_occurrence_1");
        assert_eq!(
            written[0].as_shift().unwrap().confirmations.get("student@example.com"),
            Some(&Confirmation::Accepted)
        );
        assert!(plan.notifications.is_empty());
    }

    #[test]
    fn test_confirmation_requires_shift() {
        let block = CalendarEvent::availability("tutor@example.com", at(1, 6, 9), at(1, 6, 17));
        assert_eq!(
            plan_confirmation(&block, "tutor@example.com", true, now()),
            Err(EventError::NotAShift)
        );
    }

    #[test]
    fn test_duplicate_resets_request_and_series() {
        let request =
            CalendarEvent::student_request("s@example.com", "Help", at(1, 6, 9), at(1, 6, 10))
                .with_id("req")
                .with_approval(ApprovalStatus::Rejected)
                .with_recurrence(Recurrence::weekly());

        let plan = plan_duplicate(&request, now()).unwrap();
        let copy = puts(&plan)[0];

        assert_ne!(copy.id.as_str(), "req");
        assert!(!copy.is_recurring());
        assert_eq!(
            copy.as_student_request().unwrap().approval,
            ApprovalStatus::Pending
        );
        assert_eq!(copy.start, request.start);
    }
}
