//! Wire shape of a transition result.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Dispatch, DispatchStatus};

/// Result of a dispatch transition as returned to external callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// Whether the transition committed.
    pub success: bool,
    /// Status after a successful transition.
    pub dispatch_state: Option<DispatchStatus>,
    /// Human-readable rejection reason.
    pub error_reason: Option<String>,
}

impl<E: Display> From<Result<Dispatch, E>> for TransitionOutcome {
    fn from(result: Result<Dispatch, E>) -> Self {
        match result {
            Ok(dispatch) => Self {
                success: true,
                dispatch_state: Some(dispatch.status),
                error_reason: None,
            },
            Err(e) => Self {
                success: false,
                dispatch_state: None,
                error_reason: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::NewDispatch;

    #[test]
    fn failure_carries_reason() {
        let outcome: TransitionOutcome =
            Err::<Dispatch, _>("Dispatch already accepted by another officer.").into();
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_reason.as_deref(),
            Some("Dispatch already accepted by another officer.")
        );
    }

    #[test]
    fn success_carries_state() {
        let dispatch = Dispatch::from_new(
            1,
            NewDispatch {
                report_id: 1,
                unit_id: 1,
                status: DispatchStatus::Assigned,
                officer_id: Some(2),
                dispatched_at: Utc::now(),
                dispatched_by: None,
                notes: None,
            },
        );
        let outcome = TransitionOutcome::from(Ok::<_, String>(dispatch));
        assert!(outcome.success);
        assert_eq!(outcome.dispatch_state, Some(DispatchStatus::Assigned));
    }
}
