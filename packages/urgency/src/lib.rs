#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Urgency scoring for incident reports.
//!
//! A report's score starts from the base score of its most urgent crime
//! tier (see [`UrgencyTier`]) and then picks up bonuses for attached
//! evidence and for being recent, capped at 100. Alongside the score the
//! scorer flags focus crimes and whether the report carries enough detail
//! to act on. Scoring is pure: the same report at the same instant always
//! yields the same [`UrgencyAssessment`].

pub mod progress;
pub mod recalculate;
pub mod sort;

use chrono::{DateTime, Duration, Utc};
use patrol_crime_models::{UrgencyTier, is_focus_crime};
use patrol_report_models::{LatLng, NewReport, Report};
use serde::{Deserialize, Serialize};

pub use progress::{NullProgress, ProgressCallback};
pub use recalculate::{RecalculationSummary, recalculate_all};
pub use sort::SortOrder;

/// Maximum urgency score.
pub const MAX_SCORE: u8 = 100;

/// Tunable scoring parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencySettings {
    /// Added when the report has at least one evidence attachment.
    pub evidence_bonus: u8,
    /// Added when the report is younger than the recency window.
    pub recency_bonus: u8,
    /// Width of the recency window.
    pub recency_window_minutes: i64,
    /// Minimum description length, in characters, for a report to count
    /// as actionable.
    pub min_description_chars: usize,
}

impl UrgencySettings {
    /// The recency window as a duration. Negative widths give an empty
    /// window and widths past the representable range saturate.
    #[must_use]
    pub fn recency_window(&self) -> Duration {
        Duration::try_minutes(self.recency_window_minutes.max(0)).unwrap_or(Duration::MAX)
    }
}

impl Default for UrgencySettings {
    fn default() -> Self {
        Self {
            evidence_bonus: 10,
            recency_bonus: 5,
            recency_window_minutes: 60,
            min_description_chars: 20,
        }
    }
}

/// The fields scoring reads from a report.
pub trait Scorable {
    /// Crime-type tokens.
    fn crime_types(&self) -> &[String];
    /// Free-text description.
    fn description(&self) -> &str;
    /// Number of evidence attachments.
    fn evidence_count(&self) -> u32;
    /// Incident location.
    fn location(&self) -> Option<LatLng>;
    /// Submission timestamp.
    fn created_at(&self) -> DateTime<Utc>;
}

impl Scorable for Report {
    fn crime_types(&self) -> &[String] {
        &self.crime_types
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn evidence_count(&self) -> u32 {
        self.evidence_count
    }

    fn location(&self) -> Option<LatLng> {
        self.location
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Scorable for NewReport {
    fn crime_types(&self) -> &[String] {
        &self.crime_types
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn evidence_count(&self) -> u32 {
        self.evidence_count
    }

    fn location(&self) -> Option<LatLng> {
        self.location
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Result of scoring one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgencyAssessment {
    /// Score in `0..=100`.
    pub score: u8,
    /// Most urgent tier across all tokens.
    pub tier: UrgencyTier,
    /// Whether any token is a focus crime.
    pub is_focus: bool,
    /// Whether the report is detailed enough to act on.
    pub has_sufficient_info: bool,
}

impl UrgencyAssessment {
    /// Writes the assessment onto `report`. Returns `true` if any stored
    /// field changed.
    pub fn apply_to(&self, report: &mut Report) -> bool {
        let changed = report.urgency_score != self.score
            || report.urgency_tier != self.tier
            || report.is_focus != self.is_focus
            || report.has_sufficient_info != self.has_sufficient_info;

        report.urgency_score = self.score;
        report.urgency_tier = self.tier;
        report.is_focus = self.is_focus;
        report.has_sufficient_info = self.has_sufficient_info;

        changed
    }
}

/// Scores reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrgencyScorer {
    settings: UrgencySettings,
}

impl UrgencyScorer {
    /// Creates a scorer with the given settings.
    #[must_use]
    pub const fn new(settings: UrgencySettings) -> Self {
        Self { settings }
    }

    /// Scoring parameters in effect.
    #[must_use]
    pub const fn settings(&self) -> &UrgencySettings {
        &self.settings
    }

    /// Scores a report as of `now`.
    ///
    /// A report created after `now` (clock skew) still counts as recent.
    #[must_use]
    pub fn score(&self, report: &dyn Scorable, now: DateTime<Utc>) -> UrgencyAssessment {
        let tokens = report.crime_types();
        let tier = UrgencyTier::for_tokens(tokens);

        for token in tokens {
            log::debug!("Token {token:?} classified as {}", UrgencyTier::for_token(token));
        }

        let mut score = tier.base_score();
        if report.evidence_count() > 0 {
            score = score.saturating_add(self.settings.evidence_bonus);
        }
        if now.signed_duration_since(report.created_at()) < self.settings.recency_window() {
            score = score.saturating_add(self.settings.recency_bonus);
        }

        UrgencyAssessment {
            score: score.min(MAX_SCORE),
            tier,
            is_focus: tokens.iter().any(|t| is_focus_crime(t)),
            has_sufficient_info: self.has_sufficient_info(report),
        }
    }

    fn has_sufficient_info(&self, report: &dyn Scorable) -> bool {
        report.description().chars().count() >= self.settings.min_description_chars
            && report.location().is_some_and(|p| p.is_valid())
    }
}
