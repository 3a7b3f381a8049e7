//! Zone catalog: the read-only set of zones a report can be routed to.
//!
//! Raw rows come in as [`ZoneRecord`]s with the boundary still encoded.
//! [`ZoneTable`] converts each row on its own, so a row with a wrongly
//! typed field is skipped without losing the rest of the catalog. Every
//! boundary is decoded exactly once; rows whose boundary does not decode
//! stay addressable by id, and the rest are indexed for point lookups.

use std::collections::HashMap;
use std::path::Path;

use patrol_report_models::{LatLng, UnitId, ZoneId};
use patrol_spatial::{Polygon, PolygonIndex, decode_polygon};
use serde::{Deserialize, Serialize};

use crate::JurisdictionError;

/// A zone row as stored, boundary not yet decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Primary key.
    pub id: ZoneId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Encoded boundary: either a JSON string blob or an inline array/object.
    #[serde(default)]
    pub boundary: Option<serde_json::Value>,
    /// Responsible unit.
    #[serde(default)]
    pub unit_id: Option<UnitId>,
}

impl ZoneRecord {
    fn boundary_payload(&self) -> Option<String> {
        match self.boundary.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A zone with its boundary decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    /// Primary key.
    pub id: ZoneId,
    /// Display name.
    pub name: Option<String>,
    /// Decoded boundary; `None` when missing or rejected.
    pub polygon: Option<Polygon>,
    /// Responsible unit.
    pub unit_id: Option<UnitId>,
}

impl Zone {
    /// Whether this zone takes part in geofence matching.
    #[must_use]
    pub const fn is_routable(&self) -> bool {
        self.polygon.is_some() && self.unit_id.is_some()
    }
}

/// A catalog row that was skipped, or whose boundary could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedZone {
    /// Zero-based position of the row in the catalog document.
    pub row: usize,
    /// Zone primary key, when the row carried a readable one.
    pub id: Option<ZoneId>,
    /// Why the row or its boundary was rejected.
    pub reason: String,
}

/// Read-only access to the zone catalog.
pub trait ZoneCatalog: Send + Sync {
    /// Looks up a zone by id.
    fn zone(&self, id: ZoneId) -> Option<&Zone>;

    /// All zones in catalog order.
    fn zones(&self) -> &[Zone];

    /// The first zone in catalog order that has both a polygon and a unit
    /// and whose polygon contains `point`.
    fn locate(&self, point: LatLng) -> Option<&Zone> {
        self.zones().iter().find(|zone| {
            zone.unit_id.is_some() && zone.polygon.as_ref().is_some_and(|p| p.contains(point))
        })
    }
}

/// In-memory zone catalog.
pub struct ZoneTable {
    zones: Vec<Zone>,
    by_id: HashMap<ZoneId, usize>,
    index: PolygonIndex<usize>,
    rejected: Vec<RejectedZone>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCatalog {
    Rows(Vec<serde_json::Value>),
    File {
        #[serde(default)]
        zones: Vec<serde_json::Value>,
    },
}

#[derive(Deserialize)]
struct TomlCatalog {
    #[serde(default)]
    zones: Vec<toml::Value>,
}

/// Converts raw rows one at a time, recording the ones that do not fit
/// [`ZoneRecord`].
fn convert_rows<V, E: std::fmt::Display>(
    rows: Vec<V>,
    id_of: impl Fn(&V) -> Option<ZoneId>,
    convert: impl Fn(V) -> Result<ZoneRecord, E>,
) -> (Vec<(usize, ZoneRecord)>, Vec<RejectedZone>) {
    let mut records = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for (row, value) in rows.into_iter().enumerate() {
        let id = id_of(&value);
        match convert(value) {
            Ok(record) => records.push((row, record)),
            Err(e) => {
                match id {
                    Some(id) => log::warn!("Zone {id}: row skipped: {e}"),
                    None => log::warn!("Zone row {row}: skipped: {e}"),
                }
                rejected.push(RejectedZone {
                    row,
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }

    (records, rejected)
}

impl ZoneTable {
    /// Builds the table from raw rows, in the order given.
    ///
    /// Rows whose boundary fails to decode are recorded in
    /// [`Self::rejected`] and kept without a polygon. Rows repeating an
    /// earlier id are dropped.
    #[must_use]
    pub fn from_records(records: Vec<ZoneRecord>) -> Self {
        Self::build(records.into_iter().enumerate().collect(), Vec::new())
    }

    fn build(records: Vec<(usize, ZoneRecord)>, mut rejected: Vec<RejectedZone>) -> Self {
        let mut zones = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());

        for (row, record) in records {
            if by_id.contains_key(&record.id) {
                log::warn!("Skipping duplicate zone id {}", record.id);
                rejected.push(RejectedZone {
                    row,
                    id: Some(record.id),
                    reason: "duplicate zone id".to_string(),
                });
                continue;
            }

            let polygon = match record.boundary_payload() {
                Some(payload) => match decode_polygon(&payload) {
                    Ok(polygon) => Some(polygon),
                    Err(e) => {
                        log::warn!("Zone {}: boundary skipped: {e}", record.id);
                        rejected.push(RejectedZone {
                            row,
                            id: Some(record.id),
                            reason: e.to_string(),
                        });
                        None
                    }
                },
                None => None,
            };

            by_id.insert(record.id, zones.len());
            zones.push(Zone {
                id: record.id,
                name: record.name,
                polygon,
                unit_id: record.unit_id,
            });
        }

        rejected.sort_by_key(|r| r.row);

        let index = PolygonIndex::new(
            zones
                .iter()
                .enumerate()
                .filter(|(_, zone)| zone.unit_id.is_some())
                .filter_map(|(position, zone)| {
                    zone.polygon.clone().map(|polygon| (polygon, position))
                })
                .collect(),
        );

        log::info!(
            "Loaded {} zones ({} routable, {} rejected rows)",
            zones.len(),
            index.len(),
            rejected.len()
        );

        Self {
            zones,
            by_id,
            index,
            rejected,
        }
    }

    /// Parses a JSON catalog: either a bare array of rows or an object
    /// with a `zones` array. Rows that do not fit [`ZoneRecord`] are
    /// recorded in [`Self::rejected`].
    ///
    /// # Errors
    ///
    /// * If the text is not a valid catalog document
    pub fn from_json_str(json: &str) -> Result<Self, JurisdictionError> {
        let rows = match serde_json::from_str::<JsonCatalog>(json)? {
            JsonCatalog::Rows(zones) | JsonCatalog::File { zones } => zones,
        };
        let (records, rejected) = convert_rows(
            rows,
            |value| value.get("id").and_then(serde_json::Value::as_i64),
            serde_json::from_value::<ZoneRecord>,
        );
        Ok(Self::build(records, rejected))
    }

    /// Parses a TOML catalog with a `[[zones]]` array. Rows that do not fit
    /// [`ZoneRecord`] are recorded in [`Self::rejected`].
    ///
    /// # Errors
    ///
    /// * If the text is not a valid catalog document
    pub fn from_toml_str(toml_str: &str) -> Result<Self, JurisdictionError> {
        let file: TomlCatalog = toml::de::from_str(toml_str)?;
        let (records, rejected) = convert_rows(
            file.zones,
            |value| value.get("id").and_then(toml::Value::as_integer),
            |value| value.try_into::<ZoneRecord>(),
        );
        Ok(Self::build(records, rejected))
    }

    /// Loads a catalog file; `.toml` files are read as TOML, anything else
    /// as JSON.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If the file is not a valid catalog document
    pub fn load(path: &Path) -> Result<Self, JurisdictionError> {
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml")) {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }

    /// Rows whose boundary was skipped.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedZone] {
        &self.rejected
    }
}

impl ZoneCatalog for ZoneTable {
    fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.by_id.get(&id).map(|&position| &self.zones[position])
    }

    fn zones(&self) -> &[Zone] {
        &self.zones
    }

    fn locate(&self, point: LatLng) -> Option<&Zone> {
        self.index
            .first_containing(point)
            .map(|&position| &self.zones[position])
    }
}
