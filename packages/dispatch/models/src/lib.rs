#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Patrol dispatch types.
//!
//! A [`Dispatch`] records one unit's response to one report, from creation
//! through acceptance, travel and on-site verification. Its lifecycle is
//! the [`DispatchStatus`] state machine; every committed transition is
//! announced as a [`ChangeEvent`]. SLA figures are never stored, they are
//! derived on read as a [`SlaSnapshot`].

pub mod analytics;
pub mod event;
pub mod outcome;
pub mod sla;

use chrono::{DateTime, Utc};
use patrol_report_models::{
    DispatchId, LatLng, OfficerId, ReportId, ReportStatus, UnitId, Validity,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use analytics::{DispatchAnalytics, HourlyCount, OfficerPerformance};
pub use event::{ChangeEvent, ChangeKind};
pub use outcome::TransitionOutcome;
pub use sla::{SlaSnapshot, SlaState};

/// Default SLA threshold: an officer must accept within three minutes.
pub const DEFAULT_SLA_SECONDS: i64 = 180;

/// Lifecycle state of a dispatch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchStatus {
    /// Broadcast to every on-duty officer of the unit, nobody accepted yet.
    Pending,
    /// Directed at one officer who has not accepted yet.
    Assigned,
    /// An officer took the dispatch.
    Accepted,
    /// The officer is travelling to the scene.
    EnRoute,
    /// The officer is on scene.
    Arrived,
    /// On-site verification recorded.
    Completed,
    /// Turned down; the report may be dispatched again.
    Declined,
    /// Withdrawn by the dispatcher.
    Cancelled,
}

impl DispatchStatus {
    /// Returns all variants in lifecycle order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Pending,
            Self::Assigned,
            Self::Accepted,
            Self::EnRoute,
            Self::Arrived,
            Self::Completed,
            Self::Declined,
            Self::Cancelled,
        ]
    }

    /// No transition leaves a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Declined | Self::Cancelled)
    }

    /// Waiting for an officer to accept.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Assigned)
    }

    /// Accepted and not yet completed.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Accepted | Self::EnRoute | Self::Arrived)
    }
}

/// How a new dispatch picks its officer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DispatchMode {
    /// Open to every on-duty officer of the unit.
    Broadcast,
    /// Directed at one officer.
    Targeted {
        /// The officer the dispatch is directed at.
        officer_id: OfficerId,
    },
    /// Directed at the closest on-duty officer with a fresh location,
    /// falling back to broadcast when there is none.
    Nearest,
}

/// What the responding officer found on site.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationOutcome {
    /// The incident was real.
    Valid,
    /// The report was false or unfounded.
    Invalid,
}

impl VerificationOutcome {
    /// Report status after verification.
    #[must_use]
    pub const fn report_status(self) -> ReportStatus {
        match self {
            Self::Valid => ReportStatus::Verified,
            Self::Invalid => ReportStatus::Invalid,
        }
    }

    /// Report validity after verification.
    #[must_use]
    pub const fn validity(self) -> Validity {
        match self {
            Self::Valid => Validity::Valid,
            Self::Invalid => Validity::Invalid,
        }
    }
}

/// One unit's response to one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    /// Primary key.
    pub id: DispatchId,
    /// Report being responded to.
    pub report_id: ReportId,
    /// Unit the dispatch belongs to.
    pub unit_id: UnitId,
    /// Current lifecycle state.
    pub status: DispatchStatus,
    /// Assigned or accepting officer.
    #[serde(default)]
    pub officer_id: Option<OfficerId>,
    /// Creation time; the SLA clock starts here.
    pub dispatched_at: DateTime<Utc>,
    /// When an officer accepted.
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
    /// When the officer set off.
    #[serde(default)]
    pub en_route_at: Option<DateTime<Utc>>,
    /// When the officer reached the scene.
    #[serde(default)]
    pub arrived_at: Option<DateTime<Utc>>,
    /// When the outcome was recorded.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// When the dispatch was declined.
    #[serde(default)]
    pub declined_at: Option<DateTime<Utc>>,
    /// When the dispatch was cancelled.
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Dispatcher who created the record.
    #[serde(default)]
    pub dispatched_by: Option<String>,
    /// Free-form dispatcher notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Reason given on decline, if any.
    #[serde(default)]
    pub decline_reason: Option<String>,
    /// Reason given on cancel.
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    /// On-site finding, set on completion.
    #[serde(default)]
    pub outcome: Option<VerificationOutcome>,
    /// Officer notes recorded with the outcome.
    #[serde(default)]
    pub validation_notes: Option<String>,
}

/// Insert payload for a new dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDispatch {
    /// Report being responded to.
    pub report_id: ReportId,
    /// Unit the dispatch belongs to.
    pub unit_id: UnitId,
    /// [`DispatchStatus::Pending`] or [`DispatchStatus::Assigned`].
    pub status: DispatchStatus,
    /// Assignee of a targeted dispatch.
    pub officer_id: Option<OfficerId>,
    /// Creation time.
    pub dispatched_at: DateTime<Utc>,
    /// Dispatcher creating the record.
    pub dispatched_by: Option<String>,
    /// Free-form dispatcher notes.
    pub notes: Option<String>,
}

impl Dispatch {
    /// Materializes a dispatch record from its insert payload.
    #[must_use]
    pub fn from_new(id: DispatchId, new: NewDispatch) -> Self {
        Self {
            id,
            report_id: new.report_id,
            unit_id: new.unit_id,
            status: new.status,
            officer_id: new.officer_id,
            dispatched_at: new.dispatched_at,
            accepted_at: None,
            en_route_at: None,
            arrived_at: None,
            completed_at: None,
            declined_at: None,
            cancelled_at: None,
            dispatched_by: new.dispatched_by,
            notes: new.notes,
            decline_reason: None,
            cancellation_reason: None,
            outcome: None,
            validation_notes: None,
        }
    }
}

/// Last reported position of an officer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfficerLocation {
    /// Reported coordinates.
    pub point: LatLng,
    /// When the position was reported.
    pub updated_at: DateTime<Utc>,
}

/// A patrol officer as seen by dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    /// Primary key.
    pub id: OfficerId,
    /// Unit the officer belongs to.
    pub unit_id: UnitId,
    /// Whether the officer is taking dispatches.
    #[serde(default)]
    pub on_duty: bool,
    /// Most recent known position.
    #[serde(default)]
    pub last_location: Option<OfficerLocation>,
}

impl Officer {
    /// Whether this officer can take dispatches for `unit_id`.
    #[must_use]
    pub fn can_serve(&self, unit_id: UnitId) -> bool {
        self.on_duty && self.unit_id == unit_id
    }
}
