//! The dispatch lifecycle.

use std::sync::{Arc, OnceLock};

use chrono::Duration;
use patrol_dispatch_models::{
    ChangeEvent, ChangeKind, Dispatch, DispatchAnalytics, DispatchMode, DispatchStatus,
    NewDispatch, Officer, SlaSnapshot, VerificationOutcome,
};
use patrol_report_models::{DispatchId, OfficerId, ReportId, ReportStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::clock::Clock;
use crate::notify::ChangeNotifier;
use crate::roster::{OfficerRoster, nearest_officer};
use crate::store::{DispatchStore, TransitionGuard};
use crate::transition::Transition;
use crate::{DispatchError, StoreError, analytics};

/// Tunable dispatch parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Response-time target, accept minus dispatch.
    pub sla_seconds: i64,
    /// Oldest officer location still used for nearest-officer selection.
    pub officer_location_max_age_seconds: i64,
    /// Extra attempts for decline and cancel after losing a race.
    pub guard_retries: u32,
}

impl DispatchSettings {
    /// [`Self::officer_location_max_age_seconds`] as a duration, clamped to
    /// the representable range; negative ages count as zero.
    #[must_use]
    pub fn officer_location_max_age(&self) -> Duration {
        Duration::try_seconds(self.officer_location_max_age_seconds.max(0))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            sla_seconds: patrol_dispatch_models::DEFAULT_SLA_SECONDS,
            officer_location_max_age_seconds: 300,
            guard_retries: 3,
        }
    }
}

/// Optional creation metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDetails {
    pub dispatched_by: Option<String>,
    pub notes: Option<String>,
}

/// Runs dispatch transitions against a store, announcing each commit.
///
/// Announcements are queued and delivered in commit order by a background
/// task, spawned on the first commit, so a slow or stalled notifier never
/// holds up a transition.
pub struct DispatchCoordinator {
    store: Arc<dyn DispatchStore>,
    roster: Arc<dyn OfficerRoster>,
    notifier: Arc<dyn ChangeNotifier>,
    outbox: OnceLock<mpsc::UnboundedSender<ChangeEvent>>,
    clock: Arc<dyn Clock>,
    settings: DispatchSettings,
}

impl DispatchCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<dyn DispatchStore>,
        roster: Arc<dyn OfficerRoster>,
        notifier: Arc<dyn ChangeNotifier>,
        clock: Arc<dyn Clock>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            roster,
            notifier,
            outbox: OnceLock::new(),
            clock,
            settings,
        }
    }

    /// Parameters in effect.
    #[must_use]
    pub const fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Creates a dispatch for `report_id`.
    ///
    /// # Errors
    ///
    /// * If the report does not exist or has no assigned unit
    /// * If a targeted officer does not exist or cannot serve the unit
    /// * If the report already has a non-terminal dispatch
    pub async fn create(
        &self,
        report_id: ReportId,
        mode: DispatchMode,
    ) -> Result<Dispatch, DispatchError> {
        self.create_with(report_id, mode, CreateDetails::default())
            .await
    }

    /// [`Self::create`] with dispatcher metadata.
    ///
    /// # Errors
    ///
    /// * If the report does not exist or has no assigned unit
    /// * If a targeted officer does not exist or cannot serve the unit
    /// * If the report already has a non-terminal dispatch
    pub async fn create_with(
        &self,
        report_id: ReportId,
        mode: DispatchMode,
        details: CreateDetails,
    ) -> Result<Dispatch, DispatchError> {
        let report = self.store.report(report_id).await?;
        let unit_id = report
            .assigned_unit_id
            .ok_or(DispatchError::Unassigned { report_id })?;
        let now = self.clock.now();

        let assignee = match mode {
            DispatchMode::Broadcast => None,
            DispatchMode::Targeted { officer_id } => {
                let officer = self.officer(officer_id).await?;
                if !officer.can_serve(unit_id) {
                    return Err(DispatchError::OfficerIneligible {
                        officer_id,
                        unit_id,
                    });
                }
                Some(officer.id)
            }
            DispatchMode::Nearest => {
                let candidates = self.roster.on_duty(unit_id).await?;
                let max_age = self.settings.officer_location_max_age();
                let picked = report.valid_location().and_then(|point| {
                    nearest_officer(&candidates, point, now, max_age)
                        .map(|(officer, meters)| (officer.id, meters))
                });
                match picked {
                    Some((officer_id, meters)) => {
                        log::info!(
                            "Report {report_id}: nearest officer {officer_id} is {meters:.0}m away"
                        );
                        Some(officer_id)
                    }
                    None => {
                        log::info!(
                            "Report {report_id}: no officer with a fresh location, broadcasting"
                        );
                        None
                    }
                }
            }
        };

        let dispatch = self
            .store
            .insert_dispatch(NewDispatch {
                report_id,
                unit_id,
                status: if assignee.is_some() {
                    DispatchStatus::Assigned
                } else {
                    DispatchStatus::Pending
                },
                officer_id: assignee,
                dispatched_at: now,
                dispatched_by: details.dispatched_by,
                notes: details.notes,
            })
            .await?;

        log::info!(
            "Dispatch {} created for report {report_id} (unit={unit_id}, status={}, officer={:?})",
            dispatch.id,
            dispatch.status,
            dispatch.officer_id
        );

        let recipients = match assignee {
            Some(officer_id) => vec![officer_id],
            None => self.broadcast_recipients(&dispatch).await,
        };
        self.publish(
            ChangeEvent::new(ChangeKind::Created, None, &dispatch, now)
                .with_recipients(recipients)
                .with_report_status(Some(ReportStatus::Dispatched)),
        );

        Ok(dispatch)
    }

    /// Accepts a dispatch on behalf of `officer_id`.
    ///
    /// Exactly one of any number of concurrent accepts commits; the rest
    /// fail with [`DispatchError::AlreadyAccepted`].
    ///
    /// # Errors
    ///
    /// * If the dispatch or officer does not exist
    /// * If the dispatch was already accepted
    /// * If the officer may not accept this dispatch
    pub async fn accept(
        &self,
        dispatch_id: DispatchId,
        officer_id: OfficerId,
    ) -> Result<Dispatch, DispatchError> {
        let current = self.store.dispatch(dispatch_id).await?;
        if !current.status.is_open() {
            return Err(accept_rejection(&current, officer_id));
        }

        let officer = self.officer(officer_id).await?;
        check_acceptor(&current, &officer)?;

        let now = self.clock.now();
        let transition = Transition::Accept { officer_id, at: now };
        let report_status = transition.report_effect().map(|e| e.status);

        match self
            .store
            .compare_and_swap(dispatch_id, TransitionGuard::observed(&current), transition)
            .await
        {
            Ok(accepted) => {
                log::info!("Dispatch {dispatch_id} accepted by officer {officer_id}");
                self.publish(
                    ChangeEvent::new(ChangeKind::Accepted, Some(current.status), &accepted, now)
                        .with_report_status(report_status),
                );
                Ok(accepted)
            }
            Err(StoreError::StaleState { current }) => {
                log::info!(
                    "Dispatch {dispatch_id}: accept by officer {officer_id} lost, now {}",
                    current.status
                );
                Err(accept_rejection(&current, officer_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `accepted` → `en_route`.
    ///
    /// # Errors
    ///
    /// * If the dispatch does not exist or is not accepted
    pub async fn mark_en_route(&self, dispatch_id: DispatchId) -> Result<Dispatch, DispatchError> {
        let at = self.clock.now();
        self.transition(dispatch_id, Transition::EnRoute { at })
            .await
    }

    /// `en_route` → `arrived`.
    ///
    /// # Errors
    ///
    /// * If the dispatch does not exist or is not en route
    pub async fn mark_arrived(&self, dispatch_id: DispatchId) -> Result<Dispatch, DispatchError> {
        let at = self.clock.now();
        self.transition(dispatch_id, Transition::Arrive { at })
            .await
    }

    /// `arrived` → `completed`, propagating the outcome to the report.
    ///
    /// # Errors
    ///
    /// * If the dispatch does not exist or has not arrived
    pub async fn verify(
        &self,
        dispatch_id: DispatchId,
        outcome: VerificationOutcome,
        notes: Option<String>,
    ) -> Result<Dispatch, DispatchError> {
        let at = self.clock.now();
        self.transition(dispatch_id, Transition::Verify { outcome, notes, at })
            .await
    }

    /// Any non-terminal state → `declined`.
    ///
    /// # Errors
    ///
    /// * If the dispatch does not exist or is already terminal
    pub async fn decline(
        &self,
        dispatch_id: DispatchId,
        reason: Option<String>,
    ) -> Result<Dispatch, DispatchError> {
        let at = self.clock.now();
        let reason = reason.filter(|r| !r.trim().is_empty());
        self.transition(dispatch_id, Transition::Decline { reason, at })
            .await
    }

    /// Any non-terminal state → `cancelled`.
    ///
    /// # Errors
    ///
    /// * If `reason` is blank
    /// * If the dispatch does not exist or is already terminal
    pub async fn cancel(
        &self,
        dispatch_id: DispatchId,
        reason: impl Into<String> + Send,
    ) -> Result<Dispatch, DispatchError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DispatchError::ReasonRequired { action: "cancel" });
        }
        let at = self.clock.now();
        self.transition(dispatch_id, Transition::Cancel { reason, at })
            .await
    }

    /// Redirects an unaccepted dispatch to `officer_id`.
    ///
    /// # Errors
    ///
    /// * If the dispatch or officer does not exist
    /// * If the dispatch was already accepted or closed
    /// * If the officer cannot serve the dispatch's unit
    pub async fn reassign(
        &self,
        dispatch_id: DispatchId,
        officer_id: OfficerId,
    ) -> Result<Dispatch, DispatchError> {
        let current = self.store.dispatch(dispatch_id).await?;
        let officer = self.officer(officer_id).await?;
        if !officer.can_serve(current.unit_id) {
            return Err(DispatchError::OfficerIneligible {
                officer_id,
                unit_id: current.unit_id,
            });
        }

        self.transition_from(current, Transition::Reassign { officer_id })
            .await
    }

    /// SLA snapshot of one dispatch as of now.
    ///
    /// # Errors
    ///
    /// * If the dispatch does not exist
    pub async fn sla(&self, dispatch_id: DispatchId) -> Result<SlaSnapshot, DispatchError> {
        let dispatch = self.store.dispatch(dispatch_id).await?;
        Ok(dispatch.sla(self.clock.now(), self.settings.sla_seconds))
    }

    /// The report's non-terminal dispatch, if any.
    ///
    /// # Errors
    ///
    /// * If the store fails
    pub async fn active_dispatch(
        &self,
        report_id: ReportId,
    ) -> Result<Option<Dispatch>, DispatchError> {
        Ok(self.store.active_dispatch(report_id).await?)
    }

    /// Response metrics over every stored dispatch.
    ///
    /// # Errors
    ///
    /// * If the store fails
    pub async fn analytics(&self) -> Result<DispatchAnalytics, DispatchError> {
        let dispatches = self.store.all_dispatches().await?;
        Ok(analytics::analyze(
            &dispatches,
            self.clock.now(),
            self.settings.sla_seconds,
        ))
    }

    async fn transition(
        &self,
        dispatch_id: DispatchId,
        transition: Transition,
    ) -> Result<Dispatch, DispatchError> {
        let current = self.store.dispatch(dispatch_id).await?;
        self.transition_from(current, transition).await
    }

    /// Applies `transition` starting from the observed `current` record.
    ///
    /// Transitions that are legal from any non-terminal state re-read and
    /// retry up to `guard_retries` times when they lose a race; the others
    /// fail on the first lost race.
    async fn transition_from(
        &self,
        mut current: Dispatch,
        transition: Transition,
    ) -> Result<Dispatch, DispatchError> {
        let dispatch_id = current.id;
        let retries = if transition.retries_on_conflict() {
            self.settings.guard_retries
        } else {
            0
        };

        for attempt in 0..=retries {
            if !transition.allowed_from(current.status) {
                return Err(DispatchError::IllegalTransition {
                    action: transition.action(),
                    status: current.status,
                });
            }

            let from = current.status;
            let report_status = transition.report_effect().map(|e| e.status);
            let kind = transition.kind();

            match self
                .store
                .compare_and_swap(
                    dispatch_id,
                    TransitionGuard::observed(&current),
                    transition.clone(),
                )
                .await
            {
                Ok(updated) => {
                    log::info!("Dispatch {dispatch_id}: {from} -> {}", updated.status);
                    let mut event =
                        ChangeEvent::new(kind, Some(from), &updated, self.clock.now())
                            .with_report_status(report_status);
                    if let Transition::Reassign { officer_id } = transition {
                        event = event.with_recipients(vec![officer_id]);
                    }
                    self.publish(event);
                    return Ok(updated);
                }
                Err(StoreError::StaleState { current: latest }) => {
                    log::debug!(
                        "Dispatch {dispatch_id}: {} lost race on attempt {}, now {}",
                        transition.action(),
                        attempt + 1,
                        latest.status
                    );
                    current = *latest;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if transition.allowed_from(current.status) {
            Err(DispatchError::ConcurrentModification {
                dispatch_id,
                attempts: retries + 1,
            })
        } else {
            Err(DispatchError::IllegalTransition {
                action: transition.action(),
                status: current.status,
            })
        }
    }

    async fn officer(&self, officer_id: OfficerId) -> Result<Officer, DispatchError> {
        self.roster
            .officer(officer_id)
            .await?
            .ok_or(DispatchError::OfficerNotFound { officer_id })
    }

    async fn broadcast_recipients(&self, dispatch: &Dispatch) -> Vec<OfficerId> {
        match self.roster.on_duty(dispatch.unit_id).await {
            Ok(officers) => officers.into_iter().map(|o| o.id).collect(),
            Err(e) => {
                log::warn!(
                    "Dispatch {}: could not list on-duty officers of unit {}: {e}",
                    dispatch.id,
                    dispatch.unit_id
                );
                Vec::new()
            }
        }
    }

    fn publish(&self, event: ChangeEvent) {
        let outbox = self.outbox.get_or_init(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            tokio::spawn(deliver(self.notifier.clone(), receiver));
            sender
        });

        if let Err(mpsc::error::SendError(event)) = outbox.send(event) {
            log::warn!(
                "Dispatch {}: {} notification dropped, delivery task is gone",
                event.dispatch_id,
                event.kind
            );
        }
    }
}

async fn deliver(
    notifier: Arc<dyn ChangeNotifier>,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
) {
    while let Some(event) = events.recv().await {
        if let Err(e) = notifier.notify(&event).await {
            log::warn!(
                "Dispatch {}: {} notification failed: {e}",
                event.dispatch_id,
                event.kind
            );
        }
    }
}

/// Who may accept an open dispatch: for broadcast, any officer serving the
/// unit; for a targeted dispatch, only the assignee.
fn check_acceptor(dispatch: &Dispatch, officer: &Officer) -> Result<(), DispatchError> {
    if !officer.can_serve(dispatch.unit_id) {
        return Err(DispatchError::OfficerIneligible {
            officer_id: officer.id,
            unit_id: dispatch.unit_id,
        });
    }
    if dispatch.status == DispatchStatus::Assigned && dispatch.officer_id != Some(officer.id) {
        return Err(DispatchError::NotAssignee {
            officer_id: officer.id,
        });
    }
    Ok(())
}

fn accept_rejection(current: &Dispatch, officer_id: OfficerId) -> DispatchError {
    if current.status.is_in_progress() || current.status == DispatchStatus::Completed {
        DispatchError::AlreadyAccepted {
            dispatch_id: current.id,
        }
    } else if current.status.is_open() {
        // Reassigned away from this officer while the accept was in flight.
        DispatchError::NotAssignee { officer_id }
    } else {
        DispatchError::IllegalTransition {
            action: "accept",
            status: current.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use patrol_dispatch_models::{OfficerLocation, SlaState, TransitionOutcome};
    use patrol_report_models::{LatLng, NewReport, Report, UnitId, Validity};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{ChannelNotifier, ErrorKind, InMemoryDispatchStore, ManualClock, StaticRoster};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
    }

    fn report(id: ReportId, unit_id: Option<UnitId>) -> Report {
        let mut report = Report::new(
            id,
            NewReport {
                location: Some(LatLng::new(7.0700, 125.6100)),
                crime_types: vec!["Robbery".to_string()],
                zone_id: None,
                description: "Phone snatched outside the terminal".to_string(),
                evidence_count: 1,
                created_at: t0(),
            },
        );
        report.assigned_unit_id = unit_id;
        report
    }

    fn officer(id: OfficerId, unit_id: UnitId, on_duty: bool, lat: f64) -> Officer {
        Officer {
            id,
            unit_id,
            on_duty,
            last_location: Some(OfficerLocation {
                point: LatLng::new(lat, 125.6100),
                updated_at: t0(),
            }),
        }
    }

    struct Harness {
        coordinator: Arc<DispatchCoordinator>,
        store: Arc<InMemoryDispatchStore>,
        clock: Arc<ManualClock>,
        events: UnboundedReceiver<ChangeEvent>,
    }

    fn harness_with_store(store: Arc<dyn DispatchStore>, reports: Arc<InMemoryDispatchStore>) -> Harness {
        let roster = StaticRoster::new([
            officer(10, 1, true, 7.0710),
            officer(11, 1, true, 7.0900),
            officer(12, 1, false, 7.0700),
            officer(20, 2, true, 7.0700),
        ]);
        let (notifier, events) = ChannelNotifier::new();
        let clock = Arc::new(ManualClock::new(t0()));

        Harness {
            coordinator: Arc::new(DispatchCoordinator::new(
                store,
                Arc::new(roster),
                Arc::new(notifier),
                clock.clone(),
                DispatchSettings::default(),
            )),
            store: reports,
            clock,
            events,
        }
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryDispatchStore::with_reports([
            report(1, Some(1)),
            report(2, None),
        ]));
        harness_with_store(store.clone(), store)
    }

    async fn walk_to_arrived(h: &Harness, dispatch_id: DispatchId, officer_id: OfficerId) {
        h.coordinator.accept(dispatch_id, officer_id).await.unwrap();
        h.coordinator.mark_en_route(dispatch_id).await.unwrap();
        h.coordinator.mark_arrived(dispatch_id).await.unwrap();
    }

    #[tokio::test]
    async fn broadcast_create_notifies_on_duty_officers() {
        let mut h = harness();

        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();

        assert_eq!(dispatch.status, DispatchStatus::Pending);
        assert_eq!(dispatch.officer_id, None);
        assert_eq!(dispatch.dispatched_at, t0());
        assert_eq!(h.store.report(1).await.unwrap().status, ReportStatus::Dispatched);

        let event = h.events.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.recipients, vec![10, 11]);
        assert_eq!(event.report_status, Some(ReportStatus::Dispatched));
    }

    #[tokio::test]
    async fn duplicate_active_dispatch_rejected_until_completed() {
        let h = harness();
        let first = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();

        let err = h
            .coordinator
            .create(1, DispatchMode::Broadcast)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "This report already has an active dispatch.");
        assert_eq!(err.kind(), ErrorKind::Conflict);

        walk_to_arrived(&h, first.id, 10).await;
        h.coordinator
            .verify(first.id, VerificationOutcome::Valid, None)
            .await
            .unwrap();

        let second = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn create_requires_known_assigned_report() {
        let h = harness();

        let unassigned = h.coordinator.create(2, DispatchMode::Broadcast).await.unwrap_err();
        assert!(matches!(unassigned, DispatchError::Unassigned { report_id: 2 }));

        let missing = h.coordinator.create(99, DispatchMode::Broadcast).await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn targeted_create_checks_officer() {
        let mut h = harness();

        for (officer_id, expected) in [(12, ErrorKind::Validation), (20, ErrorKind::Validation), (77, ErrorKind::NotFound)] {
            let err = h
                .coordinator
                .create(1, DispatchMode::Targeted { officer_id })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), expected, "officer {officer_id}");
        }

        let dispatch = h
            .coordinator
            .create(1, DispatchMode::Targeted { officer_id: 11 })
            .await
            .unwrap();
        assert_eq!(dispatch.status, DispatchStatus::Assigned);
        assert_eq!(dispatch.officer_id, Some(11));
        assert_eq!(h.events.recv().await.unwrap().recipients, vec![11]);
    }

    #[tokio::test]
    async fn nearest_mode_picks_closest_fresh_officer() {
        let h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Nearest).await.unwrap();
        assert_eq!(dispatch.status, DispatchStatus::Assigned);
        assert_eq!(dispatch.officer_id, Some(10));
    }

    #[tokio::test]
    async fn nearest_mode_falls_back_to_broadcast() {
        let h = harness();
        h.clock.advance(Duration::minutes(10));

        let dispatch = h.coordinator.create(1, DispatchMode::Nearest).await.unwrap();
        assert_eq!(dispatch.status, DispatchStatus::Pending);
        assert_eq!(dispatch.officer_id, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        let dispatch_id = dispatch.id;
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let handles: Vec<_> = [10, 11]
            .into_iter()
            .map(|officer_id| {
                let coordinator = h.coordinator.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    coordinator.accept(dispatch_id, officer_id).await
                })
            })
            .collect();

        let mut wins = 0;
        let mut losses = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => losses.push(e.to_string()),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(losses, vec!["Dispatch already accepted by another officer."]);
        assert_eq!(h.store.report(1).await.unwrap().status, ReportStatus::Investigating);
    }

    #[tokio::test]
    async fn assigned_dispatch_only_accepts_assignee() {
        let h = harness();
        let dispatch = h
            .coordinator
            .create(1, DispatchMode::Targeted { officer_id: 11 })
            .await
            .unwrap();

        let err = h.coordinator.accept(dispatch.id, 10).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotAssignee { officer_id: 10 }));

        let accepted = h.coordinator.accept(dispatch.id, 11).await.unwrap();
        assert_eq!(accepted.status, DispatchStatus::Accepted);
    }

    #[tokio::test]
    async fn sla_response_time_is_accept_minus_dispatch() {
        let h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();

        h.clock.advance(Duration::seconds(95));
        h.coordinator.accept(dispatch.id, 10).await.unwrap();
        h.clock.advance(Duration::seconds(30));
        h.coordinator.mark_en_route(dispatch.id).await.unwrap();
        h.clock.advance(Duration::seconds(400));
        h.coordinator.mark_arrived(dispatch.id).await.unwrap();

        let sla = h.coordinator.sla(dispatch.id).await.unwrap();
        assert_eq!(sla.response_time_seconds, Some(95));
        assert_eq!(sla.travel_time_seconds, Some(400));
        assert_eq!(sla.within_sla, Some(true));
        assert_eq!(sla.state, SlaState::Within);
    }

    #[tokio::test]
    async fn late_accept_is_outside_sla_but_still_legal() {
        let h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();

        h.clock.advance(Duration::seconds(181));
        let open = h.coordinator.sla(dispatch.id).await.unwrap();
        assert_eq!(open.state, SlaState::Exceeded);
        assert_eq!(open.status, DispatchStatus::Pending);

        h.coordinator.accept(dispatch.id, 10).await.unwrap();
        let sla = h.coordinator.sla(dispatch.id).await.unwrap();
        assert_eq!(sla.within_sla, Some(false));
    }

    #[tokio::test]
    async fn verify_propagates_outcome_to_report() {
        let h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        walk_to_arrived(&h, dispatch.id, 10).await;

        let completed = h
            .coordinator
            .verify(
                dispatch.id,
                VerificationOutcome::Invalid,
                Some("No incident at the address".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(completed.status, DispatchStatus::Completed);
        assert_eq!(completed.completed_at, Some(t0()));
        let report = h.store.report(1).await.unwrap();
        assert_eq!(report.status, ReportStatus::Invalid);
        assert_eq!(report.validity, Validity::Invalid);
    }

    #[tokio::test]
    async fn out_of_order_steps_are_rejected() {
        let h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();

        let err = h.coordinator.mark_arrived(dispatch.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot mark arrived a dispatch that is pending");

        let outcome = TransitionOutcome::from(
            h.coordinator
                .verify(dispatch.id, VerificationOutcome::Valid, None)
                .await,
        );
        assert!(!outcome.success);
        assert_eq!(outcome.dispatch_state, None);
    }

    #[tokio::test]
    async fn decline_and_cancel_close_any_open_dispatch() {
        let h = harness();
        let first = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        h.coordinator.accept(first.id, 10).await.unwrap();

        let declined = h
            .coordinator
            .decline(first.id, Some("Vehicle breakdown".to_string()))
            .await
            .unwrap();
        assert_eq!(declined.status, DispatchStatus::Declined);
        assert_eq!(declined.decline_reason.as_deref(), Some("Vehicle breakdown"));

        let again = h.coordinator.decline(first.id, None).await.unwrap_err();
        assert!(matches!(again, DispatchError::IllegalTransition { .. }));

        let second = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        let blank = h.coordinator.cancel(second.id, "  ").await.unwrap_err();
        assert!(matches!(blank, DispatchError::ReasonRequired { .. }));

        let cancelled = h.coordinator.cancel(second.id, "Duplicate report").await.unwrap();
        assert_eq!(cancelled.status, DispatchStatus::Cancelled);
        assert!(h.coordinator.active_dispatch(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reassign_only_before_acceptance() {
        let mut h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        h.events.recv().await.unwrap();

        let reassigned = h.coordinator.reassign(dispatch.id, 11).await.unwrap();
        assert_eq!(reassigned.status, DispatchStatus::Assigned);
        assert_eq!(reassigned.officer_id, Some(11));
        let event = h.events.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Reassigned);
        assert_eq!(event.recipients, vec![11]);

        let ineligible = h.coordinator.reassign(dispatch.id, 20).await.unwrap_err();
        assert_eq!(ineligible.kind(), ErrorKind::Validation);

        h.coordinator.accept(dispatch.id, 11).await.unwrap();
        let late = h.coordinator.reassign(dispatch.id, 10).await.unwrap_err();
        assert!(matches!(late, DispatchError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_transition() {
        let h = harness();
        drop(h.events);

        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        assert!(h.coordinator.accept(dispatch.id, 10).await.is_ok());
    }

    #[test]
    fn location_max_age_saturates() {
        let huge = DispatchSettings {
            officer_location_max_age_seconds: i64::MAX,
            ..DispatchSettings::default()
        };
        assert_eq!(huge.officer_location_max_age(), Duration::MAX);

        let negative = DispatchSettings {
            officer_location_max_age_seconds: -30,
            ..DispatchSettings::default()
        };
        assert_eq!(negative.officer_location_max_age(), Duration::zero());
    }

    struct StalledNotifier;

    #[async_trait]
    impl ChangeNotifier for StalledNotifier {
        async fn notify(&self, _event: &ChangeEvent) -> Result<(), crate::NotifyError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_notifier_does_not_block_transitions() {
        let coordinator = DispatchCoordinator::new(
            Arc::new(InMemoryDispatchStore::with_reports([report(1, Some(1))])),
            Arc::new(StaticRoster::new([officer(10, 1, true, 7.0710)])),
            Arc::new(StalledNotifier),
            Arc::new(ManualClock::new(t0())),
            DispatchSettings::default(),
        );

        let dispatch = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            coordinator.create(1, DispatchMode::Broadcast),
        )
        .await
        .expect("create blocked on the notifier")
        .unwrap();

        let accepted = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            coordinator.accept(dispatch.id, 10),
        )
        .await
        .expect("accept blocked on the notifier")
        .unwrap();
        assert_eq!(accepted.status, DispatchStatus::Accepted);
    }

    #[tokio::test]
    async fn events_arrive_in_commit_order() {
        let mut h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        h.coordinator.accept(dispatch.id, 10).await.unwrap();
        h.coordinator.mark_en_route(dispatch.id).await.unwrap();

        let mut kinds = Vec::new();
        for _ in 0..3 {
            kinds.push(h.events.recv().await.unwrap().kind);
        }
        assert_eq!(
            kinds,
            vec![ChangeKind::Created, ChangeKind::Accepted, ChangeKind::EnRoute]
        );
    }

    /// Slips a concurrent `en_route` in front of the first decline.
    struct RacingStore {
        inner: Arc<InMemoryDispatchStore>,
        raced: AtomicBool,
    }

    #[async_trait]
    impl DispatchStore for RacingStore {
        async fn report(&self, report_id: ReportId) -> Result<Report, StoreError> {
            self.inner.report(report_id).await
        }

        async fn insert_dispatch(&self, new: NewDispatch) -> Result<Dispatch, StoreError> {
            self.inner.insert_dispatch(new).await
        }

        async fn dispatch(&self, dispatch_id: DispatchId) -> Result<Dispatch, StoreError> {
            self.inner.dispatch(dispatch_id).await
        }

        async fn active_dispatch(&self, report_id: ReportId) -> Result<Option<Dispatch>, StoreError> {
            self.inner.active_dispatch(report_id).await
        }

        async fn dispatches_for_report(
            &self,
            report_id: ReportId,
        ) -> Result<Vec<Dispatch>, StoreError> {
            self.inner.dispatches_for_report(report_id).await
        }

        async fn all_dispatches(&self) -> Result<Vec<Dispatch>, StoreError> {
            self.inner.all_dispatches().await
        }

        async fn compare_and_swap(
            &self,
            dispatch_id: DispatchId,
            guard: TransitionGuard,
            transition: Transition,
        ) -> Result<Dispatch, StoreError> {
            if matches!(transition, Transition::Decline { .. }) && !self.raced.swap(true, Ordering::SeqCst) {
                let current = self.inner.dispatch(dispatch_id).await?;
                self.inner
                    .compare_and_swap(
                        dispatch_id,
                        TransitionGuard::observed(&current),
                        Transition::EnRoute { at: t0() },
                    )
                    .await?;
            }
            self.inner.compare_and_swap(dispatch_id, guard, transition).await
        }
    }

    #[tokio::test]
    async fn decline_retries_after_losing_a_race() {
        let inner = Arc::new(InMemoryDispatchStore::with_reports([report(1, Some(1))]));
        let racing = Arc::new(RacingStore {
            inner: inner.clone(),
            raced: AtomicBool::new(false),
        });
        let h = harness_with_store(racing, inner);

        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        h.coordinator.accept(dispatch.id, 10).await.unwrap();

        let declined = h.coordinator.decline(dispatch.id, None).await.unwrap();
        assert_eq!(declined.status, DispatchStatus::Declined);
        assert!(declined.en_route_at.is_some());
    }

    #[tokio::test]
    async fn accept_does_not_retry_after_losing_a_race() {
        let h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        h.coordinator.cancel(dispatch.id, "Called off").await.unwrap();

        let err = h.coordinator.accept(dispatch.id, 10).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot accept a dispatch that is cancelled");
    }

    #[tokio::test]
    async fn analytics_cover_stored_dispatches() {
        let h = harness();
        let dispatch = h.coordinator.create(1, DispatchMode::Broadcast).await.unwrap();
        h.clock.advance(Duration::seconds(60));
        h.coordinator.accept(dispatch.id, 10).await.unwrap();

        let analytics = h.coordinator.analytics().await.unwrap();
        assert_eq!(analytics.total, 1);
        assert!((analytics.sla_compliance_rate - 100.0).abs() < f64::EPSILON);
        assert_eq!(analytics.avg_response_time_seconds, Some(60));
    }
}
