//! Dispatch error types.

use patrol_dispatch_models::{Dispatch, DispatchStatus};
use patrol_report_models::{DispatchId, OfficerId, ReportId, UnitId};
use strum_macros::{AsRefStr, Display};

/// Broad class of a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The request is not allowed in the current state.
    Validation,
    /// The request lost against existing or concurrent state.
    Conflict,
    /// A referenced record does not exist.
    NotFound,
    /// The storage backend failed.
    Store,
}

/// Rejections from the dispatch coordinator.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Report {report_id} not found")]
    ReportNotFound { report_id: ReportId },

    #[error("Dispatch {dispatch_id} not found")]
    DispatchNotFound { dispatch_id: DispatchId },

    #[error("Officer {officer_id} not found")]
    OfficerNotFound { officer_id: OfficerId },

    #[error("Report {report_id} has no assigned unit")]
    Unassigned { report_id: ReportId },

    #[error("Officer {officer_id} is not on duty for unit {unit_id}")]
    OfficerIneligible {
        officer_id: OfficerId,
        unit_id: UnitId,
    },

    #[error("Only the assigned officer can accept this dispatch")]
    NotAssignee { officer_id: OfficerId },

    #[error("Cannot {action} a dispatch that is {status}")]
    IllegalTransition {
        action: &'static str,
        status: DispatchStatus,
    },

    #[error("A reason is required to {action} a dispatch")]
    ReasonRequired { action: &'static str },

    #[error("This report already has an active dispatch.")]
    ActiveDispatchExists {
        report_id: ReportId,
        dispatch_id: DispatchId,
    },

    #[error("Dispatch already accepted by another officer.")]
    AlreadyAccepted { dispatch_id: DispatchId },

    #[error("Dispatch {dispatch_id} kept changing, gave up after {attempts} attempts")]
    ConcurrentModification {
        dispatch_id: DispatchId,
        attempts: u32,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl DispatchError {
    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ReportNotFound { .. }
            | Self::DispatchNotFound { .. }
            | Self::OfficerNotFound { .. } => ErrorKind::NotFound,
            Self::Unassigned { .. }
            | Self::OfficerIneligible { .. }
            | Self::NotAssignee { .. }
            | Self::IllegalTransition { .. }
            | Self::ReasonRequired { .. } => ErrorKind::Validation,
            Self::ActiveDispatchExists { .. }
            | Self::AlreadyAccepted { .. }
            | Self::ConcurrentModification { .. } => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Store,
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ReportNotFound { report_id } => Self::ReportNotFound { report_id },
            StoreError::DispatchNotFound { dispatch_id } => Self::DispatchNotFound { dispatch_id },
            StoreError::ActiveDispatchExists {
                report_id,
                dispatch_id,
            } => Self::ActiveDispatchExists {
                report_id,
                dispatch_id,
            },
            other => Self::Store(other),
        }
    }
}

/// Failures reported by a [`crate::DispatchStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Report {report_id} not found")]
    ReportNotFound { report_id: ReportId },

    #[error("Dispatch {dispatch_id} not found")]
    DispatchNotFound { dispatch_id: DispatchId },

    #[error("Report {report_id} already has active dispatch {dispatch_id}")]
    ActiveDispatchExists {
        report_id: ReportId,
        dispatch_id: DispatchId,
    },

    /// The conditional update found the dispatch in a different state
    /// than the caller observed.
    #[error("Dispatch {} is {}, the update expected a different state", .current.id, .current.status)]
    StaleState { current: Box<Dispatch> },

    #[error("Store backend failure: {message}")]
    Backend { message: String },
}

/// Failures from a [`crate::ChangeNotifier`]. Logged, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    Closed,

    #[error("Notification transport failure: {message}")]
    Transport { message: String },
}
