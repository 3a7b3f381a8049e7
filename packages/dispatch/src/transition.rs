//! Dispatch state transitions.
//!
//! A [`Transition`] knows which states it may start from, how it changes
//! the dispatch record, and what it does to the owning report. Stores apply
//! it under their compare-and-swap guard so the dispatch and report change
//! together.

use chrono::{DateTime, Utc};
use patrol_dispatch_models::{ChangeKind, Dispatch, DispatchStatus, VerificationOutcome};
use patrol_report_models::{OfficerId, Report, ReportStatus, Validity};

/// A requested state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Accept {
        officer_id: OfficerId,
        at: DateTime<Utc>,
    },
    EnRoute {
        at: DateTime<Utc>,
    },
    Arrive {
        at: DateTime<Utc>,
    },
    Verify {
        outcome: VerificationOutcome,
        notes: Option<String>,
        at: DateTime<Utc>,
    },
    Decline {
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    Cancel {
        reason: String,
        at: DateTime<Utc>,
    },
    Reassign {
        officer_id: OfficerId,
    },
}

/// Report fields a transition changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportEffect {
    pub status: ReportStatus,
    pub validity: Option<Validity>,
}

impl ReportEffect {
    /// Writes the effect onto `report`.
    pub fn apply(self, report: &mut Report) {
        report.status = self.status;
        if let Some(validity) = self.validity {
            report.validity = validity;
        }
    }
}

impl Transition {
    /// Verb used in rejection messages.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Accept { .. } => "accept",
            Self::EnRoute { .. } => "mark en route",
            Self::Arrive { .. } => "mark arrived",
            Self::Verify { .. } => "verify",
            Self::Decline { .. } => "decline",
            Self::Cancel { .. } => "cancel",
            Self::Reassign { .. } => "reassign",
        }
    }

    /// Event kind announced once committed.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Accept { .. } => ChangeKind::Accepted,
            Self::EnRoute { .. } => ChangeKind::EnRoute,
            Self::Arrive { .. } => ChangeKind::Arrived,
            Self::Verify { .. } => ChangeKind::Completed,
            Self::Decline { .. } => ChangeKind::Declined,
            Self::Cancel { .. } => ChangeKind::Cancelled,
            Self::Reassign { .. } => ChangeKind::Reassigned,
        }
    }

    /// State the dispatch ends up in.
    #[must_use]
    pub const fn target(&self) -> DispatchStatus {
        match self {
            Self::Accept { .. } => DispatchStatus::Accepted,
            Self::EnRoute { .. } => DispatchStatus::EnRoute,
            Self::Arrive { .. } => DispatchStatus::Arrived,
            Self::Verify { .. } => DispatchStatus::Completed,
            Self::Decline { .. } => DispatchStatus::Declined,
            Self::Cancel { .. } => DispatchStatus::Cancelled,
            Self::Reassign { .. } => DispatchStatus::Assigned,
        }
    }

    /// Whether the transition is legal from `status`.
    #[must_use]
    pub const fn allowed_from(&self, status: DispatchStatus) -> bool {
        match self {
            Self::Accept { .. } | Self::Reassign { .. } => status.is_open(),
            Self::EnRoute { .. } => matches!(status, DispatchStatus::Accepted),
            Self::Arrive { .. } => matches!(status, DispatchStatus::EnRoute),
            Self::Verify { .. } => matches!(status, DispatchStatus::Arrived),
            Self::Decline { .. } | Self::Cancel { .. } => !status.is_terminal(),
        }
    }

    /// Transitions legal from any non-terminal state retry when a
    /// concurrent legal transition moves the dispatch under them.
    #[must_use]
    pub const fn retries_on_conflict(&self) -> bool {
        matches!(self, Self::Decline { .. } | Self::Cancel { .. })
    }

    /// What committing this transition does to the report.
    #[must_use]
    pub const fn report_effect(&self) -> Option<ReportEffect> {
        match self {
            Self::Accept { .. } => Some(ReportEffect {
                status: ReportStatus::Investigating,
                validity: None,
            }),
            Self::Verify { outcome, .. } => Some(ReportEffect {
                status: outcome.report_status(),
                validity: Some(outcome.validity()),
            }),
            _ => None,
        }
    }

    /// Applies the change to `dispatch`. Does not check legality.
    pub fn apply(self, dispatch: &mut Dispatch) {
        dispatch.status = self.target();

        match self {
            Self::Accept { officer_id, at } => {
                dispatch.officer_id = Some(officer_id);
                dispatch.accepted_at = Some(at);
            }
            Self::EnRoute { at } => dispatch.en_route_at = Some(at),
            Self::Arrive { at } => dispatch.arrived_at = Some(at),
            Self::Verify { outcome, notes, at } => {
                dispatch.completed_at = Some(at);
                dispatch.outcome = Some(outcome);
                dispatch.validation_notes = notes;
            }
            Self::Decline { reason, at } => {
                dispatch.declined_at = Some(at);
                dispatch.decline_reason = reason;
            }
            Self::Cancel { reason, at } => {
                dispatch.cancelled_at = Some(at);
                dispatch.cancellation_reason = Some(reason);
            }
            Self::Reassign { officer_id } => dispatch.officer_id = Some(officer_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use patrol_dispatch_models::NewDispatch;

    use super::*;

    fn pending() -> Dispatch {
        Dispatch::from_new(
            1,
            NewDispatch {
                report_id: 1,
                unit_id: 1,
                status: DispatchStatus::Pending,
                officer_id: None,
                dispatched_at: Utc::now(),
                dispatched_by: None,
                notes: None,
            },
        )
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        let now = Utc::now();
        let transitions = [
            Transition::Accept { officer_id: 1, at: now },
            Transition::EnRoute { at: now },
            Transition::Arrive { at: now },
            Transition::Verify {
                outcome: VerificationOutcome::Valid,
                notes: None,
                at: now,
            },
            Transition::Decline { reason: None, at: now },
            Transition::Cancel {
                reason: "duplicate".to_string(),
                at: now,
            },
            Transition::Reassign { officer_id: 2 },
        ];

        for status in DispatchStatus::all().iter().filter(|s| s.is_terminal()) {
            for transition in &transitions {
                assert!(!transition.allowed_from(*status), "{transition:?} from {status}");
            }
        }
    }

    #[test]
    fn happy_path_is_linear() {
        let now = Utc::now();
        assert!(Transition::Accept { officer_id: 1, at: now }.allowed_from(DispatchStatus::Assigned));
        assert!(Transition::EnRoute { at: now }.allowed_from(DispatchStatus::Accepted));
        assert!(!Transition::EnRoute { at: now }.allowed_from(DispatchStatus::Pending));
        assert!(!Transition::Arrive { at: now }.allowed_from(DispatchStatus::Accepted));
        assert!(!Transition::Accept { officer_id: 1, at: now }.allowed_from(DispatchStatus::Accepted));
    }

    #[test]
    fn accept_stamps_officer_and_time() {
        let now = Utc::now();
        let mut dispatch = pending();
        Transition::Accept { officer_id: 7, at: now }.apply(&mut dispatch);

        assert_eq!(dispatch.status, DispatchStatus::Accepted);
        assert_eq!(dispatch.officer_id, Some(7));
        assert_eq!(dispatch.accepted_at, Some(now));
    }

    #[test]
    fn verify_records_outcome_and_report_effect() {
        let now = Utc::now();
        let verify = Transition::Verify {
            outcome: VerificationOutcome::Invalid,
            notes: Some("Nobody on scene".to_string()),
            at: now,
        };
        assert_eq!(
            verify.report_effect(),
            Some(ReportEffect {
                status: ReportStatus::Invalid,
                validity: Some(Validity::Invalid),
            })
        );

        let mut dispatch = pending();
        verify.apply(&mut dispatch);
        assert_eq!(dispatch.status, DispatchStatus::Completed);
        assert_eq!(dispatch.outcome, Some(VerificationOutcome::Invalid));
        assert_eq!(dispatch.validation_notes.as_deref(), Some("Nobody on scene"));
    }
}
