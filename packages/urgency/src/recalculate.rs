//! Batch rescoring of stored reports.
//!
//! Used after scoring rules or settings change. Only the stored score
//! fields (`urgency_score`, `urgency_tier`, `is_focus`,
//! `has_sufficient_info`) are touched.

use chrono::{DateTime, Utc};
use patrol_report_models::Report;
use serde::Serialize;

use crate::{ProgressCallback, UrgencyScorer};

/// Reports between progress log lines.
const LOG_EVERY: usize = 50;

/// Counts from one rescoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecalculationSummary {
    /// Reports scored.
    pub processed: usize,
    /// Reports whose stored score fields changed.
    pub changed: usize,
}

/// Rescores every report in `reports` as of `now`.
pub fn recalculate_all(
    scorer: &UrgencyScorer,
    reports: &mut [Report],
    now: DateTime<Utc>,
    progress: &dyn ProgressCallback,
) -> RecalculationSummary {
    log::info!("Starting urgency score recalculation for {} reports", reports.len());
    progress.set_total(reports.len() as u64);
    progress.set_message("Rescoring reports".to_string());

    let mut summary = RecalculationSummary::default();

    for report in reports.iter_mut() {
        let assessment = scorer.score(&*report, now);
        if assessment.apply_to(report) {
            summary.changed += 1;
        }
        summary.processed += 1;
        progress.inc(1);

        if summary.processed % LOG_EVERY == 0 {
            log::info!("Processed {} reports...", summary.processed);
        }
    }

    log::info!(
        "Recalculation complete: {} processed, {} changed",
        summary.processed,
        summary.changed
    );
    progress.finish(format!(
        "{} reports rescored, {} changed",
        summary.processed, summary.changed
    ));

    summary
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use chrono::TimeZone;
    use patrol_crime_models::UrgencyTier;
    use patrol_report_models::{NewReport, ReportStatus};

    use super::*;
    use crate::NullProgress;

    struct Counting {
        total: AtomicU64,
        done: AtomicU64,
    }

    impl ProgressCallback for Counting {
        fn set_total(&self, total: u64) {
            self.total.store(total, Ordering::Relaxed);
        }
        fn inc(&self, delta: u64) {
            self.done.fetch_add(delta, Ordering::Relaxed);
        }
        fn set_message(&self, _msg: String) {}
        fn finish(&self, _msg: String) {}
    }

    fn stored(id: i64, tokens: &[&str]) -> Report {
        Report::new(
            id,
            NewReport {
                location: None,
                crime_types: tokens.iter().map(ToString::to_string).collect(),
                zone_id: None,
                description: String::new(),
                evidence_count: 0,
                created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            },
        )
    }

    #[test]
    fn rescoring_updates_only_score_fields() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut reports = vec![stored(1, &["Murder"]), stored(2, &["Other"])];
        reports[0].status = ReportStatus::Investigating;
        reports[0].assigned_unit_id = Some(4);

        let summary = recalculate_all(&UrgencyScorer::default(), &mut reports, now, &NullProgress);

        assert_eq!(summary, RecalculationSummary { processed: 2, changed: 1 });
        assert_eq!(reports[0].urgency_score, 100);
        assert_eq!(reports[0].urgency_tier, UrgencyTier::Critical);
        assert!(reports[0].is_focus);
        assert_eq!(reports[0].status, ReportStatus::Investigating);
        assert_eq!(reports[0].assigned_unit_id, Some(4));
    }

    #[test]
    fn second_pass_changes_nothing() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let scorer = UrgencyScorer::default();
        let mut reports = vec![stored(1, &["Robbery"]), stored(2, &["Theft"])];

        recalculate_all(&scorer, &mut reports, now, &NullProgress);
        let again = recalculate_all(&scorer, &mut reports, now, &NullProgress);

        assert_eq!(again.changed, 0);
    }

    #[test]
    fn reports_progress_per_report() {
        let progress = Counting {
            total: AtomicU64::new(0),
            done: AtomicU64::new(0),
        };
        let mut reports: Vec<Report> = (0..3).map(|id| stored(id, &["Fraud"])).collect();

        recalculate_all(&UrgencyScorer::default(), &mut reports, Utc::now(), &progress);

        assert_eq!(progress.total.load(Ordering::Relaxed), 3);
        assert_eq!(progress.done.load(Ordering::Relaxed), 3);
    }
}
