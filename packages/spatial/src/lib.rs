#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point-in-polygon matching for zone geofences.
//!
//! [`contains`] is the even-odd ray-casting test every geofence decision
//! goes through. [`Polygon`] wraps a decoded vertex list with its bounding
//! rectangle, and [`PolygonIndex`] puts many polygons in an R-tree while
//! keeping "first polygon in catalog order wins" semantics.

pub mod decode;

use geo::{BoundingRect, Coord, LineString, Rect};
use patrol_report_models::LatLng;
use rstar::{AABB, RTree, RTreeObject};

pub use decode::{PolygonError, decode_polygon};

/// Even-odd ray-casting point-in-polygon test.
///
/// For every edge (wrapping from the last vertex back to the first) the
/// `inside` flag toggles when exactly one endpoint's longitude is above the
/// point's longitude and the point's latitude is less than the edge's
/// latitude at the point's longitude.
///
/// Polygons with fewer than 3 vertices never contain anything. Points
/// exactly on an edge get whatever the half-open comparison yields.
#[must_use]
pub fn contains(point: LatLng, polygon: &[LatLng]) -> bool {
    let count = polygon.len();
    if count < 3 {
        return false;
    }

    let mut inside = false;
    for (i, current) in polygon.iter().enumerate() {
        let previous = &polygon[(i + count - 1) % count];

        if (current.lng > point.lng) != (previous.lng > point.lng) {
            let intercept = (previous.lat - current.lat) * (point.lng - current.lng)
                / (previous.lng - current.lng)
                + current.lat;
            if point.lat < intercept {
                inside = !inside;
            }
        }
    }

    inside
}

/// A decoded zone boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<LatLng>,
    bounds: Option<Rect<f64>>,
}

impl Polygon {
    /// Wraps an ordered vertex list and computes its bounding rectangle.
    #[must_use]
    pub fn new(vertices: Vec<LatLng>) -> Self {
        let ring: LineString<f64> = vertices
            .iter()
            .map(|v| Coord { x: v.lng, y: v.lat })
            .collect();
        let bounds = ring.bounding_rect();

        Self { vertices, bounds }
    }

    /// The ordered vertex list.
    #[must_use]
    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    /// Tests whether `point` lies inside this polygon.
    ///
    /// Points strictly outside the bounding rectangle are rejected before
    /// the ray cast, which would also reject them.
    #[must_use]
    pub fn contains(&self, point: LatLng) -> bool {
        let Some(bounds) = self.bounds else {
            return false;
        };

        let (min, max) = (bounds.min(), bounds.max());
        if point.lng < min.x || point.lng > max.x || point.lat < min.y || point.lat > max.y {
            return false;
        }

        contains(point, &self.vertices)
    }

    /// R-tree envelope in `[lng, lat]` order, `None` for an empty polygon.
    fn envelope(&self) -> Option<AABB<[f64; 2]>> {
        self.bounds
            .map(|r| AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]))
    }
}

/// Position of a polygon in the index, stored in the R-tree.
struct IndexEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Polygons with attached values, searchable by point.
///
/// Lookups return the value of the *earliest inserted* polygon that
/// contains the point, so callers keep catalog-order precedence for
/// overlapping polygons while only ray-casting the candidates whose
/// envelopes intersect the point.
pub struct PolygonIndex<T> {
    entries: Vec<(Polygon, T)>,
    tree: RTree<IndexEntry>,
}

impl<T> PolygonIndex<T> {
    /// Builds the index. Insertion order is lookup precedence.
    #[must_use]
    pub fn new(entries: Vec<(Polygon, T)>) -> Self {
        let indexed: Vec<IndexEntry> = entries
            .iter()
            .enumerate()
            .filter_map(|(position, (polygon, _))| {
                polygon
                    .envelope()
                    .map(|envelope| IndexEntry { position, envelope })
            })
            .collect();

        log::debug!(
            "Indexed {} of {} polygons into spatial index",
            indexed.len(),
            entries.len()
        );

        Self {
            entries,
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Returns the value of the first polygon, in insertion order, that
    /// contains `point`.
    #[must_use]
    pub fn first_containing(&self, point: LatLng) -> Option<&T> {
        let query_env = AABB::from_point([point.lng, point.lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| entry.position)
            .filter(|&position| self.entries[position].0.contains(point))
            .min()
            .map(|position| &self.entries[position].1)
    }

    /// Number of polygons in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index holds no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
