//! Response metrics over a dispatch set.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use patrol_dispatch_models::{
    Dispatch, DispatchAnalytics, DispatchStatus, HourlyCount, OfficerPerformance, SlaSnapshot,
};
use patrol_report_models::OfficerId;

/// Computes [`DispatchAnalytics`] for `dispatches` as of `now`.
#[must_use]
pub fn analyze(dispatches: &[Dispatch], now: DateTime<Utc>, sla_seconds: i64) -> DispatchAnalytics {
    let snapshots: Vec<SlaSnapshot> = dispatches.iter().map(|d| d.sla(now, sla_seconds)).collect();

    let mut by_status: BTreeMap<DispatchStatus, usize> = BTreeMap::new();
    for dispatch in dispatches {
        *by_status.entry(dispatch.status).or_default() += 1;
    }

    let mut per_officer: BTreeMap<Option<OfficerId>, Vec<(&Dispatch, &SlaSnapshot)>> =
        BTreeMap::new();
    for (dispatch, snapshot) in dispatches.iter().zip(&snapshots) {
        per_officer
            .entry(dispatch.officer_id)
            .or_default()
            .push((dispatch, snapshot));
    }

    let officer_performance = per_officer
        .into_iter()
        .map(|(officer_id, group)| {
            let group_snapshots: Vec<&SlaSnapshot> = group.iter().map(|(_, s)| *s).collect();
            OfficerPerformance {
                officer_id,
                total: group.len(),
                completed: group
                    .iter()
                    .filter(|(d, _)| d.status == DispatchStatus::Completed)
                    .count(),
                avg_response_time_seconds: average(
                    group_snapshots.iter().filter_map(|s| s.response_time_seconds),
                ),
                sla_compliance_rate: compliance_rate(group_snapshots.iter().copied()),
            }
        })
        .collect();

    let mut hours: BTreeMap<u32, usize> = BTreeMap::new();
    for dispatch in dispatches {
        *hours.entry(dispatch.dispatched_at.hour()).or_default() += 1;
    }

    DispatchAnalytics {
        total: dispatches.len(),
        by_status,
        sla_compliance_rate: compliance_rate(snapshots.iter()),
        avg_response_time_seconds: average(snapshots.iter().filter_map(|s| s.response_time_seconds)),
        avg_travel_time_seconds: average(snapshots.iter().filter_map(|s| s.travel_time_seconds)),
        avg_completion_time_seconds: average(
            snapshots.iter().filter_map(|s| s.completion_time_seconds),
        ),
        officer_performance,
        hourly_distribution: hours
            .into_iter()
            .map(|(hour, count)| HourlyCount { hour, count })
            .collect(),
    }
}

/// Percentage of accepted dispatches within SLA, rounded to one decimal.
#[allow(clippy::cast_precision_loss)]
fn compliance_rate<'a>(snapshots: impl Iterator<Item = &'a SlaSnapshot>) -> f64 {
    let (met, judged) = snapshots
        .filter_map(|s| s.within_sla)
        .fold((0_usize, 0_usize), |(met, judged), within| {
            (met + usize::from(within), judged + 1)
        });

    if judged == 0 {
        return 0.0;
    }
    (met as f64 / judged as f64 * 1000.0).round() / 10.0
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn average(values: impl Iterator<Item = i64>) -> Option<i64> {
    let (sum, count) = values.fold((0_i64, 0_i64), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return None;
    }
    Some((sum as f64 / count as f64).round() as i64)
}
