//! Subcommand bodies, kept free of file and terminal I/O.

use chrono::{DateTime, Utc};
use patrol_dispatch::analytics::analyze;
use patrol_dispatch_models::{Dispatch, DispatchAnalytics, SlaSnapshot};
use patrol_jurisdiction::{JurisdictionResolver, RejectedZone, ZoneCatalog};
use patrol_report_models::{NewReport, Report, ReportId};
use patrol_urgency::{SortOrder, UrgencyScorer};
use serde::Serialize;

/// Renders the catalog as a fixed-width table.
pub fn zone_table(catalog: &dyn ZoneCatalog, rejected: &[RejectedZone]) -> Vec<String> {
    let mut lines = vec![
        format!("{:<8} {:<8} {:<9} NAME", "ID", "UNIT", "VERTICES"),
        "-".repeat(50),
    ];

    for zone in catalog.zones() {
        lines.push(format!(
            "{:<8} {:<8} {:<9} {}",
            zone.id,
            zone.unit_id.map_or_else(|| "-".to_string(), |u| u.to_string()),
            zone.polygon
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.vertices().len().to_string()),
            zone.name.as_deref().unwrap_or(""),
        ));
    }

    if !rejected.is_empty() {
        lines.push(String::new());
        lines.push(format!("{} rejected zone row(s):", rejected.len()));
        for row in rejected {
            match row.id {
                Some(id) => lines.push(format!("  zone {id}: {}", row.reason)),
                None => lines.push(format!("  row {}: {}", row.row, row.reason)),
            }
        }
    }

    lines
}

/// Turns submissions into routed, scored reports. Ids are assigned from 1
/// in input order; submissions naming an unknown zone are dropped.
pub fn intake(
    catalog: &dyn ZoneCatalog,
    resolver: &JurisdictionResolver,
    scorer: &UrgencyScorer,
    submissions: Vec<NewReport>,
    now: DateTime<Utc>,
) -> Vec<Report> {
    let mut reports = Vec::with_capacity(submissions.len());

    for (id, submission) in (1 as ReportId..).zip(submissions) {
        let mut report = Report::new(id, submission);
        if let Err(e) = resolver.assign(catalog, &mut report) {
            log::warn!("Skipping submission {id}: {e}");
            continue;
        }
        scorer.score(&report, now).apply_to(&mut report);
        reports.push(report);
    }

    log::info!(
        "Intake: {} report(s) accepted, {} assigned to a unit",
        reports.len(),
        reports.iter().filter(|r| r.assigned_unit_id.is_some()).count()
    );

    reports
}

/// Rescores `reports` as of `now` and orders them for triage.
pub fn score(scorer: &UrgencyScorer, reports: &mut [Report], order: SortOrder, now: DateTime<Utc>) {
    for report in reports.iter_mut() {
        scorer.score(&*report, now).apply_to(report);
    }
    order.sort(reports);
}

/// SLA snapshots plus aggregate metrics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaReport {
    pub snapshots: Vec<SlaSnapshot>,
    pub analytics: DispatchAnalytics,
}

pub fn sla(dispatches: &[Dispatch], now: DateTime<Utc>, sla_seconds: i64) -> SlaReport {
    SlaReport {
        snapshots: dispatches.iter().map(|d| d.sla(now, sla_seconds)).collect(),
        analytics: analyze(dispatches, now, sla_seconds),
    }
}
