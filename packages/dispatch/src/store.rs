//! Dispatch persistence interface and the in-memory implementation.
//!
//! The coordinator never reads-then-writes on its own: every state change
//! goes through [`DispatchStore::compare_and_swap`], which must apply the
//! transition only if the dispatch still matches the caller's
//! [`TransitionGuard`]. That single atomic step is what makes concurrent
//! acceptance safe.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use patrol_dispatch_models::{Dispatch, DispatchStatus, NewDispatch};
use patrol_report_models::{DispatchId, OfficerId, Report, ReportId, ReportStatus};

use crate::StoreError;
use crate::transition::Transition;

/// State a conditional update expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionGuard {
    pub status: DispatchStatus,
    pub officer_id: Option<OfficerId>,
}

impl TransitionGuard {
    /// Guard matching the dispatch exactly as it was read.
    #[must_use]
    pub const fn observed(dispatch: &Dispatch) -> Self {
        Self {
            status: dispatch.status,
            officer_id: dispatch.officer_id,
        }
    }

    fn matches(&self, dispatch: &Dispatch) -> bool {
        self.status == dispatch.status && self.officer_id == dispatch.officer_id
    }
}

/// Storage for reports (read side) and dispatches.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Loads a report.
    async fn report(&self, report_id: ReportId) -> Result<Report, StoreError>;

    /// Inserts a dispatch and marks its report dispatched, atomically
    /// rejecting the insert if the report already has a non-terminal
    /// dispatch.
    async fn insert_dispatch(&self, new: NewDispatch) -> Result<Dispatch, StoreError>;

    /// Loads a dispatch.
    async fn dispatch(&self, dispatch_id: DispatchId) -> Result<Dispatch, StoreError>;

    /// The report's non-terminal dispatch, if any.
    async fn active_dispatch(&self, report_id: ReportId) -> Result<Option<Dispatch>, StoreError>;

    /// Every dispatch ever created for the report, oldest first.
    async fn dispatches_for_report(&self, report_id: ReportId)
    -> Result<Vec<Dispatch>, StoreError>;

    /// Every dispatch, oldest first.
    async fn all_dispatches(&self) -> Result<Vec<Dispatch>, StoreError>;

    /// Applies `transition` (and its report effect) only if the dispatch
    /// still matches `guard`; otherwise fails with
    /// [`StoreError::StaleState`] carrying the current record.
    async fn compare_and_swap(
        &self,
        dispatch_id: DispatchId,
        guard: TransitionGuard,
        transition: Transition,
    ) -> Result<Dispatch, StoreError>;
}

#[derive(Default)]
struct StoreState {
    reports: BTreeMap<ReportId, Report>,
    dispatches: BTreeMap<DispatchId, Dispatch>,
    next_id: DispatchId,
}

impl StoreState {
    fn active_for(&self, report_id: ReportId) -> Option<&Dispatch> {
        self.dispatches
            .values()
            .find(|d| d.report_id == report_id && !d.status.is_terminal())
    }
}

/// Process-local [`DispatchStore`] behind a single lock.
#[derive(Default)]
pub struct InMemoryDispatchStore {
    state: RwLock<StoreState>,
}

impl InMemoryDispatchStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with reports.
    #[must_use]
    pub fn with_reports(reports: impl IntoIterator<Item = Report>) -> Self {
        let state = StoreState {
            reports: reports.into_iter().map(|r| (r.id, r)).collect(),
            ..StoreState::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    /// Adds or replaces a report.
    ///
    /// # Errors
    ///
    /// * If the store lock is poisoned
    pub fn insert_report(&self, report: Report) -> Result<(), StoreError> {
        self.write()?.reports.insert(report.id, report);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state.write().map_err(|_| poisoned())
    }

    fn report_sync(&self, report_id: ReportId) -> Result<Report, StoreError> {
        self.read()?
            .reports
            .get(&report_id)
            .cloned()
            .ok_or(StoreError::ReportNotFound { report_id })
    }

    fn dispatch_sync(&self, dispatch_id: DispatchId) -> Result<Dispatch, StoreError> {
        self.read()?
            .dispatches
            .get(&dispatch_id)
            .cloned()
            .ok_or(StoreError::DispatchNotFound { dispatch_id })
    }

    fn insert_sync(&self, new: NewDispatch) -> Result<Dispatch, StoreError> {
        let mut state = self.write()?;

        if !state.reports.contains_key(&new.report_id) {
            return Err(StoreError::ReportNotFound {
                report_id: new.report_id,
            });
        }
        if let Some(active) = state.active_for(new.report_id) {
            return Err(StoreError::ActiveDispatchExists {
                report_id: new.report_id,
                dispatch_id: active.id,
            });
        }

        state.next_id += 1;
        let dispatch = Dispatch::from_new(state.next_id, new);
        state.dispatches.insert(dispatch.id, dispatch.clone());
        if let Some(report) = state.reports.get_mut(&dispatch.report_id) {
            report.status = ReportStatus::Dispatched;
        }

        Ok(dispatch)
    }

    fn compare_and_swap_sync(
        &self,
        dispatch_id: DispatchId,
        guard: TransitionGuard,
        transition: Transition,
    ) -> Result<Dispatch, StoreError> {
        let mut state = self.write()?;

        let dispatch = state
            .dispatches
            .get_mut(&dispatch_id)
            .ok_or(StoreError::DispatchNotFound { dispatch_id })?;
        if !guard.matches(dispatch) {
            return Err(StoreError::StaleState {
                current: Box::new(dispatch.clone()),
            });
        }

        let effect = transition.report_effect();
        transition.apply(dispatch);
        let updated = dispatch.clone();

        if let Some(effect) = effect
            && let Some(report) = state.reports.get_mut(&updated.report_id)
        {
            effect.apply(report);
        }

        Ok(updated)
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend {
        message: "dispatch store lock poisoned".to_string(),
    }
}

#[async_trait]
impl DispatchStore for InMemoryDispatchStore {
    async fn report(&self, report_id: ReportId) -> Result<Report, StoreError> {
        self.report_sync(report_id)
    }

    async fn insert_dispatch(&self, new: NewDispatch) -> Result<Dispatch, StoreError> {
        self.insert_sync(new)
    }

    async fn dispatch(&self, dispatch_id: DispatchId) -> Result<Dispatch, StoreError> {
        self.dispatch_sync(dispatch_id)
    }

    async fn active_dispatch(&self, report_id: ReportId) -> Result<Option<Dispatch>, StoreError> {
        Ok(self.read()?.active_for(report_id).cloned())
    }

    async fn dispatches_for_report(
        &self,
        report_id: ReportId,
    ) -> Result<Vec<Dispatch>, StoreError> {
        Ok(self
            .read()?
            .dispatches
            .values()
            .filter(|d| d.report_id == report_id)
            .cloned()
            .collect())
    }

    async fn all_dispatches(&self) -> Result<Vec<Dispatch>, StoreError> {
        Ok(self.read()?.dispatches.values().cloned().collect())
    }

    async fn compare_and_swap(
        &self,
        dispatch_id: DispatchId,
        guard: TransitionGuard,
        transition: Transition,
    ) -> Result<Dispatch, StoreError> {
        self.compare_and_swap_sync(dispatch_id, guard, transition)
    }
}
