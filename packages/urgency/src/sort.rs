//! Triage orderings for report lists.

use std::cmp::Ordering;

use patrol_report_models::Report;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How a report list is ordered for triage.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortOrder {
    /// Highest score first, newest first among equals.
    #[default]
    MostUrgent,
    /// Focus crimes first, then highest score, then newest.
    MostSevere,
    /// Reports lacking detail first, then highest score, then newest.
    NeedsInfo,
    /// Newest first.
    Newest,
}

impl SortOrder {
    /// Returns all variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::MostUrgent, Self::MostSevere, Self::NeedsInfo, Self::Newest]
    }

    /// Compares two reports under this order.
    #[must_use]
    pub fn compare(self, a: &Report, b: &Report) -> Ordering {
        let by_score = || b.urgency_score.cmp(&a.urgency_score);
        let by_newest = || b.created_at.cmp(&a.created_at);

        match self {
            Self::MostUrgent => by_score().then_with(by_newest),
            Self::MostSevere => b
                .is_focus
                .cmp(&a.is_focus)
                .then_with(by_score)
                .then_with(by_newest),
            Self::NeedsInfo => a
                .has_sufficient_info
                .cmp(&b.has_sufficient_info)
                .then_with(by_score)
                .then_with(by_newest),
            Self::Newest => by_newest(),
        }
    }

    /// Sorts `reports` in place. Stable, so ties keep their input order.
    pub fn sort(self, reports: &mut [Report]) {
        reports.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use patrol_report_models::NewReport;

    use super::*;

    fn report(id: i64, score: u8, focus: bool, sufficient: bool, age_minutes: i64) -> Report {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
            - Duration::minutes(age_minutes);
        let mut report = Report::new(
            id,
            NewReport {
                location: None,
                crime_types: Vec::new(),
                zone_id: None,
                description: String::new(),
                evidence_count: 0,
                created_at,
            },
        );
        report.urgency_score = score;
        report.is_focus = focus;
        report.has_sufficient_info = sufficient;
        report
    }

    fn ids(reports: &[Report]) -> Vec<i64> {
        reports.iter().map(|r| r.id).collect()
    }

    fn fixture() -> Vec<Report> {
        vec![
            report(1, 50, true, true, 30),
            report(2, 100, false, true, 10),
            report(3, 50, false, false, 5),
            report(4, 75, true, false, 60),
        ]
    }

    #[test]
    fn most_urgent_orders_by_score_then_newest() {
        let mut reports = fixture();
        SortOrder::MostUrgent.sort(&mut reports);
        assert_eq!(ids(&reports), vec![2, 4, 3, 1]);
    }

    #[test]
    fn most_severe_puts_focus_crimes_first() {
        let mut reports = fixture();
        SortOrder::MostSevere.sort(&mut reports);
        assert_eq!(ids(&reports), vec![4, 1, 2, 3]);
    }

    #[test]
    fn needs_info_puts_insufficient_reports_first() {
        let mut reports = fixture();
        SortOrder::NeedsInfo.sort(&mut reports);
        assert_eq!(ids(&reports), vec![4, 3, 2, 1]);
    }

    #[test]
    fn newest_ignores_score() {
        let mut reports = fixture();
        SortOrder::Newest.sort(&mut reports);
        assert_eq!(ids(&reports), vec![3, 2, 1, 4]);
    }

    #[test]
    fn parses_kebab_case_names() {
        assert_eq!("needs-info".parse::<SortOrder>().unwrap(), SortOrder::NeedsInfo);
        assert_eq!(SortOrder::MostSevere.to_string(), "most-severe");
        assert_eq!(SortOrder::all().len(), 4);
    }
}
