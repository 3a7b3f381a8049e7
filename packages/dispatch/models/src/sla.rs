//! SLA read model.
//!
//! Breach is informational: nothing here changes dispatch state.

use chrono::{DateTime, Utc};
use patrol_report_models::DispatchId;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::{Dispatch, DispatchStatus};

/// Where a dispatch stands against the response-time target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SlaState {
    /// Accepted within the threshold.
    Within,
    /// Accepted late, or still open past the threshold.
    Exceeded,
    /// Still open and inside the threshold.
    Open,
    /// Closed without ever being accepted.
    NotApplicable,
}

/// SLA figures for one dispatch, derived at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaSnapshot {
    /// Dispatch the figures belong to.
    pub dispatch_id: DispatchId,
    /// Lifecycle state at read time.
    pub status: DispatchStatus,
    /// `accepted_at - dispatched_at`.
    pub response_time_seconds: Option<i64>,
    /// `arrived_at - en_route_at`.
    pub travel_time_seconds: Option<i64>,
    /// `completed_at - arrived_at`.
    pub completion_time_seconds: Option<i64>,
    /// Response time within the threshold; `None` until accepted.
    pub within_sla: Option<bool>,
    /// Overall SLA standing.
    pub state: SlaState,
    /// Seconds left before an open dispatch breaches, negative once it has.
    pub time_remaining_seconds: Option<i64>,
}

fn seconds_between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<i64> {
    Some(end?.signed_duration_since(start?).num_seconds())
}

impl Dispatch {
    /// Derives the SLA snapshot as of `now` against `threshold_seconds`.
    #[must_use]
    pub fn sla(&self, now: DateTime<Utc>, threshold_seconds: i64) -> SlaSnapshot {
        let response = seconds_between(Some(self.dispatched_at), self.accepted_at);
        let within_sla = response.map(|seconds| seconds <= threshold_seconds);

        let (state, time_remaining) = match within_sla {
            Some(true) => (SlaState::Within, None),
            Some(false) => (SlaState::Exceeded, None),
            None if self.status.is_open() => {
                let remaining = threshold_seconds
                    .saturating_sub(now.signed_duration_since(self.dispatched_at).num_seconds());
                let state = if remaining < 0 {
                    SlaState::Exceeded
                } else {
                    SlaState::Open
                };
                (state, Some(remaining))
            }
            None => (SlaState::NotApplicable, None),
        };

        SlaSnapshot {
            dispatch_id: self.id,
            status: self.status,
            response_time_seconds: response,
            travel_time_seconds: seconds_between(self.en_route_at, self.arrived_at),
            completion_time_seconds: seconds_between(self.arrived_at, self.completed_at),
            within_sla,
            state,
            time_remaining_seconds: time_remaining,
        }
    }
}
