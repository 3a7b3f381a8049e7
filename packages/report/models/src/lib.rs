#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident report types.
//!
//! These types describe a citizen-submitted report as it moves through
//! intake (jurisdiction resolution and urgency scoring) and dispatch. They
//! are storage-agnostic: report CRUD lives outside this workspace and hands
//! rows over in these shapes.

use chrono::{DateTime, Utc};
use patrol_crime_models::UrgencyTier;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Report primary key.
pub type ReportId = i64;
/// Zone (barangay) primary key.
pub type ZoneId = i64;
/// Responsible operational unit (police station) primary key.
pub type UnitId = i64;
/// Patrol officer primary key.
pub type OfficerId = i64;
/// Patrol dispatch primary key.
pub type DispatchId = i64;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    /// Creates a new coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns `true` if this looks like a real location.
    ///
    /// Rejects non-finite values, values outside the WGS84 ranges, and the
    /// `(0, 0)` placeholder that mobile clients send when location access
    /// was denied.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && !(self.lat == 0.0 && self.lng == 0.0)
    }
}

/// Lifecycle status of a report as seen by the public.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportStatus {
    /// Submitted, not yet dispatched.
    Pending,
    /// A patrol dispatch has been created.
    Dispatched,
    /// An officer accepted the dispatch.
    Investigating,
    /// The responding officer verified the report as valid.
    Verified,
    /// The responding officer marked the report as invalid.
    Invalid,
}

/// Outcome of on-site verification.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Validity {
    /// Nobody has been on site yet.
    #[default]
    Unverified,
    /// Confirmed by the responding officer.
    Valid,
    /// Found to be false or unfounded.
    Invalid,
}

/// Report-creation input, as received from the submission endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    /// Where the incident happened, if the reporter shared it.
    #[serde(default)]
    pub location: Option<LatLng>,
    /// Crime-type tokens picked by the reporter.
    #[serde(default)]
    pub crime_types: Vec<String>,
    /// Zone explicitly chosen by the caller, overriding geofencing.
    #[serde(default)]
    pub zone_id: Option<ZoneId>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Number of evidence attachments (photos, video).
    #[serde(default)]
    pub evidence_count: u32,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

/// A stored report with its intake results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Primary key.
    pub id: ReportId,
    /// Incident location, if known.
    #[serde(default)]
    pub location: Option<LatLng>,
    /// Crime-type tokens.
    #[serde(default)]
    pub crime_types: Vec<String>,
    /// Explicit zone supplied at submission.
    #[serde(default)]
    pub zone_id: Option<ZoneId>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Number of evidence attachments.
    #[serde(default)]
    pub evidence_count: u32,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Unit responsible for the report; `None` means unassigned and only
    /// visible to top-level oversight.
    #[serde(default)]
    pub assigned_unit_id: Option<UnitId>,
    /// Urgency score in `0..=100`.
    #[serde(default = "default_score")]
    pub urgency_score: u8,
    /// Tier the score was derived from.
    #[serde(default = "default_tier")]
    pub urgency_tier: UrgencyTier,
    /// Whether the report mentions a focus crime.
    #[serde(default)]
    pub is_focus: bool,
    /// Whether the report carries enough detail to act on.
    #[serde(default)]
    pub has_sufficient_info: bool,
    /// Public lifecycle status.
    #[serde(default = "default_status")]
    pub status: ReportStatus,
    /// Verification outcome.
    #[serde(default)]
    pub validity: Validity,
}

const fn default_score() -> u8 {
    UrgencyTier::Low.base_score()
}

const fn default_tier() -> UrgencyTier {
    UrgencyTier::Low
}

const fn default_status() -> ReportStatus {
    ReportStatus::Pending
}

impl Report {
    /// Builds an unassigned, unscored report from creation input.
    ///
    /// Intake fills in the assignment and urgency fields afterwards.
    #[must_use]
    pub fn new(id: ReportId, input: NewReport) -> Self {
        Self {
            id,
            location: input.location,
            crime_types: input.crime_types,
            zone_id: input.zone_id,
            description: input.description,
            evidence_count: input.evidence_count,
            created_at: input.created_at,
            assigned_unit_id: None,
            urgency_score: default_score(),
            urgency_tier: default_tier(),
            is_focus: false,
            has_sufficient_info: false,
            status: ReportStatus::Pending,
            validity: Validity::Unverified,
        }
    }

    /// Returns the location if it is usable for geofencing.
    #[must_use]
    pub fn valid_location(&self) -> Option<LatLng> {
        self.location.filter(LatLng::is_valid)
    }
}
