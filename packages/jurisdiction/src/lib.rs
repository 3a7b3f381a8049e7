#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Jurisdiction resolution for incoming reports.
//!
//! Decides which operational unit owns a report. The rules are applied in
//! order and the first one that applies wins:
//!
//! 1. A cybercrime token routes to the dedicated cybercrime unit, ignoring
//!    location entirely.
//! 2. An explicit zone chosen by the reporter routes to that zone's unit.
//! 3. The first zone in catalog order whose boundary contains the report
//!    location routes to its unit.
//! 4. Otherwise the report is left unassigned.
//!
//! Every decision is logged and returned as a [`ResolutionAudit`].

pub mod catalog;

use patrol_report_models::{LatLng, NewReport, Report, UnitId, ZoneId};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

pub use catalog::{RejectedZone, Zone, ZoneCatalog, ZoneRecord, ZoneTable};

/// Errors from jurisdiction resolution and catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum JurisdictionError {
    /// The caller named a zone that is not in the catalog.
    #[error("Zone {zone_id} not found")]
    ZoneNotFound {
        /// The unknown zone id.
        zone_id: ZoneId,
    },

    /// Catalog file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog JSON is invalid.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog TOML is invalid.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// The inputs resolution looks at.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionRequest<'a> {
    /// Crime-type tokens.
    pub crime_types: &'a [String],
    /// Zone explicitly chosen by the caller.
    pub zone_id: Option<ZoneId>,
    /// Report location.
    pub location: Option<LatLng>,
}

impl<'a> From<&'a NewReport> for ResolutionRequest<'a> {
    fn from(report: &'a NewReport) -> Self {
        Self {
            crime_types: &report.crime_types,
            zone_id: report.zone_id,
            location: report.location,
        }
    }
}

impl<'a> From<&'a Report> for ResolutionRequest<'a> {
    fn from(report: &'a Report) -> Self {
        Self {
            crime_types: &report.crime_types,
            zone_id: report.zone_id,
            location: report.location,
        }
    }
}

/// Which rule decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionBasis {
    /// A cybercrime token was present.
    Cybercrime,
    /// The caller supplied a zone id.
    ExplicitZone,
    /// A zone boundary contained the location.
    Geofence,
    /// No rule produced a zone.
    Unmatched,
}

/// Why a report ended up without a zone match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnmatchedReason {
    /// Coordinates absent, non-finite, out of range or the `(0, 0)`
    /// placeholder.
    MissingCoordinates,
    /// Valid coordinates outside every routable zone.
    NoContainingZone,
}

/// Audit record of one resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionAudit {
    /// Rule that decided the outcome.
    pub basis: ResolutionBasis,
    /// Matched zone, if any.
    pub zone_id: Option<ZoneId>,
    /// Resulting unit; `None` leaves the report unassigned.
    pub unit_id: Option<UnitId>,
    /// Coordinates as received.
    pub location: Option<LatLng>,
    /// Set when `basis` is [`ResolutionBasis::Unmatched`].
    pub unmatched_reason: Option<UnmatchedReason>,
}

impl ResolutionAudit {
    fn unmatched(location: Option<LatLng>, reason: UnmatchedReason) -> Self {
        Self {
            basis: ResolutionBasis::Unmatched,
            zone_id: None,
            unit_id: None,
            location,
            unmatched_reason: Some(reason),
        }
    }

    fn log(&self) {
        let coords = self
            .location
            .map_or_else(|| "none".to_string(), |p| format!("{},{}", p.lat, p.lng));

        match self.basis {
            ResolutionBasis::Unmatched => log::info!(
                "Jurisdiction unmatched at {coords}: {}",
                self.unmatched_reason
                    .map_or_else(String::new, |reason| reason.to_string())
            ),
            basis => log::info!(
                "Jurisdiction resolved by {basis} at {coords}: zone={:?} unit={:?}",
                self.zone_id,
                self.unit_id
            ),
        }
    }
}

/// Routes reports to the responsible unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JurisdictionResolver {
    cybercrime_unit_id: Option<UnitId>,
}

impl JurisdictionResolver {
    /// Creates a resolver. Without a cybercrime unit, cybercrime reports
    /// stay unassigned.
    #[must_use]
    pub const fn new(cybercrime_unit_id: Option<UnitId>) -> Self {
        Self { cybercrime_unit_id }
    }

    /// Resolves the responsible unit, `None` meaning unassigned.
    ///
    /// # Errors
    ///
    /// * If the request names a zone id that is not in `catalog`
    pub fn resolve(
        &self,
        catalog: &dyn ZoneCatalog,
        request: ResolutionRequest<'_>,
    ) -> Result<Option<UnitId>, JurisdictionError> {
        Ok(self.resolve_with_audit(catalog, request)?.unit_id)
    }

    /// Resolves the responsible unit and returns the full audit record.
    ///
    /// # Errors
    ///
    /// * If the request names a zone id that is not in `catalog`
    pub fn resolve_with_audit(
        &self,
        catalog: &dyn ZoneCatalog,
        request: ResolutionRequest<'_>,
    ) -> Result<ResolutionAudit, JurisdictionError> {
        let audit = self.decide(catalog, request)?;
        audit.log();
        Ok(audit)
    }

    /// Resolves `report` and stores the result in its `assigned_unit_id`.
    ///
    /// # Errors
    ///
    /// * If the report names a zone id that is not in `catalog`
    pub fn assign(
        &self,
        catalog: &dyn ZoneCatalog,
        report: &mut Report,
    ) -> Result<ResolutionAudit, JurisdictionError> {
        let audit = self.resolve_with_audit(catalog, ResolutionRequest::from(&*report))?;
        report.assigned_unit_id = audit.unit_id;
        Ok(audit)
    }

    fn decide(
        &self,
        catalog: &dyn ZoneCatalog,
        request: ResolutionRequest<'_>,
    ) -> Result<ResolutionAudit, JurisdictionError> {
        if request
            .crime_types
            .iter()
            .any(|token| patrol_crime_models::is_cybercrime(token))
        {
            if self.cybercrime_unit_id.is_none() {
                log::warn!("Cybercrime report received but no cybercrime unit is configured");
            }
            return Ok(ResolutionAudit {
                basis: ResolutionBasis::Cybercrime,
                zone_id: None,
                unit_id: self.cybercrime_unit_id,
                location: request.location,
                unmatched_reason: None,
            });
        }

        if let Some(zone_id) = request.zone_id {
            let zone = catalog
                .zone(zone_id)
                .ok_or(JurisdictionError::ZoneNotFound { zone_id })?;
            return Ok(ResolutionAudit {
                basis: ResolutionBasis::ExplicitZone,
                zone_id: Some(zone.id),
                unit_id: zone.unit_id,
                location: request.location,
                unmatched_reason: None,
            });
        }

        let Some(point) = request.location.filter(LatLng::is_valid) else {
            return Ok(ResolutionAudit::unmatched(
                request.location,
                UnmatchedReason::MissingCoordinates,
            ));
        };

        Ok(catalog.locate(point).map_or_else(
            || ResolutionAudit::unmatched(request.location, UnmatchedReason::NoContainingZone),
            |zone| ResolutionAudit {
                basis: ResolutionBasis::Geofence,
                zone_id: Some(zone.id),
                unit_id: zone.unit_id,
                location: request.location,
                unmatched_reason: None,
            },
        ))
    }
}
