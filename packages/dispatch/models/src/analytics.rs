//! Aggregate response metrics over a set of dispatches.

use std::collections::BTreeMap;

use patrol_report_models::OfficerId;
use serde::{Deserialize, Serialize};

use crate::DispatchStatus;

/// Response metrics for a dispatch set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchAnalytics {
    /// Dispatches in the set.
    pub total: usize,
    /// Count per lifecycle state.
    pub by_status: BTreeMap<DispatchStatus, usize>,
    /// Percentage of accepted dispatches that met the SLA, one decimal;
    /// `0.0` when nothing was accepted.
    pub sla_compliance_rate: f64,
    /// Mean accept latency over accepted dispatches, rounded.
    pub avg_response_time_seconds: Option<i64>,
    /// Mean en-route to arrival time, rounded.
    pub avg_travel_time_seconds: Option<i64>,
    /// Mean arrival to completion time, rounded.
    pub avg_completion_time_seconds: Option<i64>,
    /// One entry per officer, ordered by officer id.
    pub officer_performance: Vec<OfficerPerformance>,
    /// Creation counts per hour, hours without dispatches omitted.
    pub hourly_distribution: Vec<HourlyCount>,
}

/// Per-officer slice of [`DispatchAnalytics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerPerformance {
    /// `None` groups dispatches nobody has taken.
    pub officer_id: Option<OfficerId>,
    /// Dispatches held by the officer.
    pub total: usize,
    /// Of those, how many reached `completed`.
    pub completed: usize,
    /// Mean accept latency, rounded.
    pub avg_response_time_seconds: Option<i64>,
    /// Same rule as [`DispatchAnalytics::sla_compliance_rate`].
    pub sla_compliance_rate: f64,
}

/// Dispatches created in one hour of the day (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyCount {
    /// Hour of day, `0..=23`.
    pub hour: u32,
    /// Dispatches created in that hour.
    pub count: usize,
}
