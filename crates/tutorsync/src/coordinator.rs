//! Mutation coordinator.
//!
//! Every user mutation goes through the same pipeline: look up the stored
//! version of the entity, authorize it against the role policy, plan the writes, apply them to the local state, persist them
//! in one batch, then run the follow-up work (cascade deletes, notifications,
//! meeting sync). A failed persist restores the local state as it was before
//! the mutation; follow-up failures are only reported.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tutorsync_core::calendar::{
    format_entity_type, CalendarDocuments, CalendarEvent, EntityType, EventId, MeetingRef,
};
use tutorsync_core::meeting::{MeetingProvider, MeetingRequest};
use tutorsync_core::mutation::{
    plan_confirmation, plan_create, plan_delete, plan_duplicate, plan_reschedule, stored_entity,
    Cascade, DeleteOption, MeetingAction, MutationPlan, UpdateOption,
};
use tutorsync_core::notification::NotificationDecision;
use tutorsync_core::policy::{policy_for, Actor, Capability};
use tutorsync_core::storage::{EventQuery, EventStore, StoreOp, MAX_BATCH_SIZE};

use crate::error::{MutationError, SideEffectError};
use crate::notify::NotificationGate;
use crate::state::CalendarState;

/// Everything that happened while applying a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationReport {
    /// Documents written by the mutation, as finally stored.
    pub written: Vec<CalendarEvent>,
    pub deleted: Vec<EventId>,
    /// Materialized occurrences removed by a cascade.
    pub cascaded: usize,
    pub notifications: Vec<NotificationDecision>,
    /// Meeting created for a new online shift.
    pub meeting: Option<MeetingRef>,
    pub side_effect_errors: Vec<SideEffectError>,
}

impl MutationReport {
    fn from_plan(plan: &MutationPlan) -> Self {
        Self {
            written: plan.written().cloned().collect(),
            deleted: plan
                .ops
                .iter()
                .filter_map(|op| match op {
                    StoreOp::Delete(id) => Some(id.clone()),
                    StoreOp::Put(_) => None,
                })
                .collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied(MutationReport),
    /// The actor may not perform the action. Nothing changed.
    Skipped {
        action: &'static str,
        event_id: EventId,
    },
}

impl MutationOutcome {
    pub fn report(&self) -> Option<&MutationReport> {
        match self {
            MutationOutcome::Applied(report) => Some(report),
            MutationOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, MutationOutcome::Skipped { .. })
    }
}

type Result<T> = std::result::Result<T, MutationError>;

#[derive(Clone)]
pub struct MutationCoordinator {
    store: Arc<dyn EventStore>,
    state: Arc<CalendarState>,
    gate: NotificationGate,
    meetings: Arc<dyn MeetingProvider>,
    batch_size: usize,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<dyn EventStore>,
        state: Arc<CalendarState>,
        gate: NotificationGate,
        meetings: Arc<dyn MeetingProvider>,
    ) -> Self {
        Self {
            store,
            state,
            gate,
            meetings,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Sets the number of deletes per cascade batch, capped by the store limit.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn state(&self) -> &Arc<CalendarState> {
        &self.state
    }

    fn skip(&self, action: &'static str, actor: &Actor, event: &CalendarEvent) -> MutationOutcome {
        tracing::warn!(
            action,
            entity = format_entity_type(event.entity_type()),
            role = %actor.role,
            email = %actor.email,
            event_id = %event.id,
            "Mutation not allowed, ignoring"
        );
        MutationOutcome::Skipped {
            action,
            event_id: event.id.clone(),
        }
    }

    /// Loads the stored version of `entity` and checks the actor may act on it.
    ///
    /// The caller's copy only identifies the document; policy and planning
    /// both run on what the local state holds.
    async fn authorize(
        &self,
        action: &'static str,
        capability: Capability,
        actor: &Actor,
        entity: &CalendarEvent,
    ) -> std::result::Result<(CalendarDocuments, CalendarEvent), MutationOutcome> {
        let snapshot = self.state.documents().await;
        match stored_entity(&snapshot, entity) {
            Some(stored) if policy_for(actor.role).allows(capability, &stored, &actor.email) => {
                Ok((snapshot, stored))
            }
            Some(stored) => Err(self.skip(action, actor, &stored)),
            None => {
                tracing::debug!(event_id = %entity.id, "No stored document for entity");
                Err(self.skip(action, actor, entity))
            }
        }
    }

    /// Creates a new event owned by the actor.
    pub async fn create(&self, actor: &Actor, event: CalendarEvent) -> Result<MutationOutcome> {
        let policy = policy_for(actor.role);
        if !policy.can_create(event.entity_type())
            || !policy.allows(Capability::Edit, &event, &actor.email)
        {
            return Ok(self.skip("create", actor, &event));
        }

        let snapshot = self.state.documents().await;
        if snapshot.find(event.entity_type(), &event.id).is_some() {
            return Ok(self.skip("create", actor, &event));
        }
        let plan = plan_create(&event, Utc::now())?;
        self.execute(plan, snapshot).await
    }

    /// Drags an event to a new time range.
    pub async fn move_event(
        &self,
        actor: &Actor,
        entity: &CalendarEvent,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
        option: UpdateOption,
    ) -> Result<MutationOutcome> {
        let (snapshot, stored) =
            match self.authorize("move", Capability::Drag, actor, entity).await {
                Ok(found) => found,
                Err(skipped) => return Ok(skipped),
            };
        let plan = plan_reschedule(&snapshot, &stored, new_start, new_end, option, Utc::now())?;
        self.execute(plan, snapshot).await
    }

    /// Changes the start and end of an event.
    pub async fn resize(
        &self,
        actor: &Actor,
        entity: &CalendarEvent,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
        option: UpdateOption,
    ) -> Result<MutationOutcome> {
        let (snapshot, stored) =
            match self.authorize("resize", Capability::Resize, actor, entity).await {
                Ok(found) => found,
                Err(skipped) => return Ok(skipped),
            };
        let plan = plan_reschedule(&snapshot, &stored, new_start, new_end, option, Utc::now())?;
        self.execute(plan, snapshot).await
    }

    pub async fn delete(
        &self,
        actor: &Actor,
        entity: &CalendarEvent,
        option: DeleteOption,
    ) -> Result<MutationOutcome> {
        let (snapshot, stored) =
            match self.authorize("delete", Capability::Delete, actor, entity).await {
                Ok(found) => found,
                Err(skipped) => return Ok(skipped),
            };
        let plan = plan_delete(&snapshot, &stored, option, Utc::now())?;
        self.execute(plan, snapshot).await
    }

    /// Records the actor's answer to a shift invitation.
    pub async fn confirm_participation(
        &self,
        actor: &Actor,
        entity: &CalendarEvent,
        accepted: bool,
    ) -> Result<MutationOutcome> {
        let (snapshot, stored) =
            match self.authorize("confirm", Capability::Confirm, actor, entity).await {
                Ok(found) => found,
                Err(skipped) => return Ok(skipped),
            };
        let plan = plan_confirmation(&stored, &actor.email, accepted, Utc::now())?;
        self.execute(plan, snapshot).await
    }

    pub async fn duplicate(&self, actor: &Actor, entity: &CalendarEvent) -> Result<MutationOutcome> {
        let (snapshot, stored) =
            match self.authorize("duplicate", Capability::Duplicate, actor, entity).await {
                Ok(found) => found,
                Err(skipped) => return Ok(skipped),
            };
        let plan = plan_duplicate(&stored, Utc::now())?;
        self.execute(plan, snapshot).await
    }

    async fn execute(
        &self,
        plan: MutationPlan,
        snapshot: CalendarDocuments,
    ) -> Result<MutationOutcome> {
        let collection = plan.collection;
        tracing::debug!(
            %collection,
            ops = plan.ops.len(),
            cascade = plan.cascade.is_some(),
            "Applying mutation"
        );

        self.state.apply(&plan).await;
        if let Err(err) = self.store.batch_write(collection, &plan.ops).await {
            tracing::error!(%collection, error = %err, "Failed to persist mutation, rolling back");
            self.state.restore(snapshot).await;
            return Err(err.into());
        }

        let mut report = MutationReport::from_plan(&plan);

        if let Some(cascade) = &plan.cascade {
            self.cascade(collection, cascade, &mut report).await;
        }

        for intent in &plan.notifications {
            match self.gate.evaluate(intent).await {
                Ok(decision) => report.notifications.push(decision),
                Err(err) => {
                    tracing::warn!(event_id = %intent.event_id(), error = %err, "Notification outbox failed");
                    report.side_effect_errors.push(err.into());
                }
            }
        }

        if let Some(action) = &plan.meeting {
            self.sync_meeting(collection, action, &mut report).await;
        }

        Ok(MutationOutcome::Applied(report))
    }

    /// Deletes the materialized occurrences covered by a cascade.
    ///
    /// Batches are independent; a failed one leaves its rows for a later pass.
    async fn cascade(&self, collection: EntityType, cascade: &Cascade, report: &mut MutationReport) {
        let query = EventQuery::new().occurrences_of(cascade.series.clone());
        let doomed: Vec<EventId> = match self.store.query(collection, &query).await {
            Ok(events) => events
                .into_iter()
                .filter(|event| cascade.covers(event))
                .map(|event| event.id)
                .collect(),
            Err(err) => {
                tracing::error!(series = %cascade.series, error = %err, "Failed to look up occurrences");
                report.side_effect_errors.push(SideEffectError::Cascade(err));
                return;
            }
        };

        for chunk in doomed.chunks(self.batch_size) {
            let ops: Vec<StoreOp> = chunk.iter().cloned().map(StoreOp::Delete).collect();
            match self.store.batch_write(collection, &ops).await {
                Ok(()) => report.cascaded += chunk.len(),
                Err(err) => {
                    tracing::warn!(
                        series = %cascade.series,
                        batch = chunk.len(),
                        error = %err,
                        "Cascade batch failed"
                    );
                    report.side_effect_errors.push(SideEffectError::Cascade(err));
                }
            }
        }

        if !doomed.is_empty() {
            tracing::info!(
                series = %cascade.series,
                deleted = report.cascaded,
                "Cascade removed materialized occurrences"
            );
        }
    }

    async fn sync_meeting(
        &self,
        collection: EntityType,
        action: &MeetingAction,
        report: &mut MutationReport,
    ) {
        let result = match action {
            MeetingAction::Create { event_id } => {
                self.create_meeting(collection, event_id, report).await;
                return;
            }
            MeetingAction::Update {
                event_id,
                meeting_id,
            } => match report.written.iter().find(|event| &event.id == event_id) {
                Some(event) => {
                    self.meetings
                        .update(meeting_id, &MeetingRequest::for_event(event))
                        .await
                }
                None => return,
            },
            MeetingAction::Delete { meeting_id } => self.meetings.delete(meeting_id).await,
        };

        if let Err(err) = result {
            tracing::warn!(action = ?action, error = %err, "Meeting provider call failed");
            report.side_effect_errors.push(err.into());
        }
    }

    async fn create_meeting(
        &self,
        collection: EntityType,
        event_id: &EventId,
        report: &mut MutationReport,
    ) {
        let Some(position) = report.written.iter().position(|e| &e.id == event_id) else {
            return;
        };
        let request = MeetingRequest::for_event(&report.written[position]);
        let meeting = match self.meetings.create(&request).await {
            Ok(meeting) => meeting,
            Err(err) => {
                tracing::warn!(%event_id, error = %err, "Failed to create meeting");
                report.side_effect_errors.push(err.into());
                return;
            }
        };

        let linked = report.written[position].clone().with_meeting(meeting.clone());
        self.state.upsert([linked.clone()]).await;
        if let Err(err) = self.store.update(collection, &linked).await {
            tracing::error!(%event_id, error = %err, "Failed to store meeting link");
            report.side_effect_errors.push(SideEffectError::MeetingLink(err));
        }
        tracing::debug!(%event_id, meeting_id = %meeting.meeting_id, "Meeting attached");
        report.written[position] = linked;
        report.meeting = Some(meeting);
    }
}
