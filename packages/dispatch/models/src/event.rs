//! Change events emitted after each committed dispatch transition.

use chrono::{DateTime, Utc};
use patrol_report_models::{DispatchId, OfficerId, ReportId, ReportStatus, UnitId};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::{Dispatch, DispatchStatus};

/// What happened to the dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Accepted,
    EnRoute,
    Arrived,
    Completed,
    Declined,
    Cancelled,
    Reassigned,
}

/// A committed transition, handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// Dispatch that changed.
    pub dispatch_id: DispatchId,
    /// Report the dispatch responds to.
    pub report_id: ReportId,
    /// Unit the dispatch belongs to.
    pub unit_id: UnitId,
    /// State before the transition; `None` on creation.
    pub from: Option<DispatchStatus>,
    /// State after the transition.
    pub to: DispatchStatus,
    /// Officer on the dispatch after the transition.
    pub officer_id: Option<OfficerId>,
    /// Officers who should be alerted.
    pub recipients: Vec<OfficerId>,
    /// New report status, when the transition changed it.
    pub report_status: Option<ReportStatus>,
    /// Commit time.
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Builds an event for `dispatch` as it stands after the transition.
    #[must_use]
    pub fn new(
        kind: ChangeKind,
        from: Option<DispatchStatus>,
        dispatch: &Dispatch,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            dispatch_id: dispatch.id,
            report_id: dispatch.report_id,
            unit_id: dispatch.unit_id,
            from,
            to: dispatch.status,
            officer_id: dispatch.officer_id,
            recipients: Vec::new(),
            report_status: None,
            at,
        }
    }

    /// Sets the officers to alert.
    #[must_use]
    pub fn with_recipients(mut self, recipients: Vec<OfficerId>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Sets the report status the transition produced.
    #[must_use]
    pub fn with_report_status(mut self, status: Option<ReportStatus>) -> Self {
        self.report_status = status;
        self
    }
}
