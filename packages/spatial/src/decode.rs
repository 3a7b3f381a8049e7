//! Decoding of stored boundary payloads into [`Polygon`]s.
//!
//! Zone boundaries were written by several generations of tooling, so a
//! stored payload is one of:
//!
//! * a list of `{"lat": .., "lng": ..}` objects,
//! * a bare `GeoJSON` ring of `[lng, lat]` pairs,
//! * a `GeoJSON` `Polygon` geometry (or a `Feature` wrapping one), of which
//!   only the outer ring is used.
//!
//! Payloads are decoded once when a catalog is loaded, never per lookup.

use geojson::GeoJson;
use patrol_report_models::LatLng;
use serde::Deserialize;

use crate::Polygon;

/// Errors produced while decoding a boundary payload.
#[derive(Debug, thiserror::Error)]
pub enum PolygonError {
    /// The payload was empty or whitespace.
    #[error("Boundary payload is empty")]
    Empty,

    /// The payload is not valid JSON in any accepted shape.
    #[error("Invalid boundary JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is JSON but not valid `GeoJSON`.
    #[error("Invalid GeoJSON: {message}")]
    GeoJson {
        /// Description of what went wrong.
        message: String,
    },

    /// The `GeoJSON` is valid but not a polygon.
    #[error("Unsupported geometry type: {kind}")]
    UnsupportedGeometry {
        /// Name of the geometry that was found.
        kind: &'static str,
    },

    /// Fewer than three vertices.
    #[error("Boundary has {count} vertices, at least 3 are required")]
    TooFewVertices {
        /// Number of vertices found.
        count: usize,
    },

    /// A vertex has a NaN or infinite coordinate.
    #[error("Boundary vertex {index} has a non-finite coordinate")]
    NonFiniteVertex {
        /// Zero-based vertex position.
        index: usize,
    },

    /// A vertex lies outside the WGS84 latitude/longitude ranges.
    #[error("Boundary vertex {index} is out of range (lat {lat}, lng {lng})")]
    VertexOutOfRange {
        /// Zero-based vertex position.
        index: usize,
        /// Decoded latitude.
        lat: f64,
        /// Decoded longitude.
        lng: f64,
    },
}

// `Pairs` must come first: serde lets a struct deserialize from a sequence,
// so `[lng, lat]` would otherwise match `Objects` positionally.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRing {
    Pairs(Vec<[f64; 2]>),
    Objects(Vec<RawVertex>),
}

#[derive(Deserialize)]
struct RawVertex {
    lat: f64,
    #[serde(alias = "lon", alias = "long")]
    lng: f64,
}

/// Decodes a stored boundary payload.
///
/// # Errors
///
/// Returns [`PolygonError`] if the payload is not one of the accepted
/// shapes, is not a polygon, has fewer than three vertices, or contains a
/// non-finite or out-of-range coordinate.
pub fn decode_polygon(raw: &str) -> Result<Polygon, PolygonError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PolygonError::Empty);
    }

    let vertices = if trimmed.starts_with('{') {
        decode_geojson(trimmed)?
    } else {
        decode_ring(trimmed)?
    };

    if vertices.len() < 3 {
        return Err(PolygonError::TooFewVertices {
            count: vertices.len(),
        });
    }
    if let Some(index) = vertices
        .iter()
        .position(|v| !v.lat.is_finite() || !v.lng.is_finite())
    {
        return Err(PolygonError::NonFiniteVertex { index });
    }
    if let Some((index, vertex)) = vertices
        .iter()
        .enumerate()
        .find(|(_, v)| !(-90.0..=90.0).contains(&v.lat) || !(-180.0..=180.0).contains(&v.lng))
    {
        return Err(PolygonError::VertexOutOfRange {
            index,
            lat: vertex.lat,
            lng: vertex.lng,
        });
    }

    Ok(Polygon::new(vertices))
}

fn decode_ring(raw: &str) -> Result<Vec<LatLng>, PolygonError> {
    let ring: RawRing = serde_json::from_str(raw)?;

    Ok(match ring {
        RawRing::Objects(vertices) => vertices
            .into_iter()
            .map(|v| LatLng::new(v.lat, v.lng))
            .collect(),
        RawRing::Pairs(pairs) => pairs
            .into_iter()
            .map(|[lng, lat]| LatLng::new(lat, lng))
            .collect(),
    })
}

fn decode_geojson(raw: &str) -> Result<Vec<LatLng>, PolygonError> {
    let geojson: GeoJson = raw.parse().map_err(|e: geojson::Error| PolygonError::GeoJson {
        message: e.to_string(),
    })?;

    let geometry = match geojson {
        GeoJson::Geometry(geometry) => geometry,
        GeoJson::Feature(feature) => {
            feature
                .geometry
                .ok_or(PolygonError::UnsupportedGeometry {
                    kind: "Feature without geometry",
                })?
        }
        GeoJson::FeatureCollection(_) => {
            return Err(PolygonError::UnsupportedGeometry {
                kind: "FeatureCollection",
            });
        }
    };

    let geometry: geo::Geometry<f64> =
        geometry
            .try_into()
            .map_err(|e: geojson::Error| PolygonError::GeoJson {
                message: e.to_string(),
            })?;

    match geometry {
        geo::Geometry::Polygon(polygon) => Ok(polygon
            .exterior()
            .coords()
            .map(|c| LatLng::new(c.y, c.x))
            .collect()),
        other => Err(PolygonError::UnsupportedGeometry {
            kind: geometry_kind(&other),
        }),
    }
}

const fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
