//! Officer roster access and nearest-officer selection.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use geo::{Distance, Haversine, Point};
use patrol_dispatch_models::Officer;
use patrol_report_models::{LatLng, OfficerId, UnitId};

use crate::StoreError;

/// Read access to officers.
#[async_trait]
pub trait OfficerRoster: Send + Sync {
    /// Looks up one officer.
    async fn officer(&self, officer_id: OfficerId) -> Result<Option<Officer>, StoreError>;

    /// On-duty officers of a unit.
    async fn on_duty(&self, unit_id: UnitId) -> Result<Vec<Officer>, StoreError>;
}

/// Roster held in memory, updatable at runtime.
#[derive(Default)]
pub struct StaticRoster {
    officers: RwLock<BTreeMap<OfficerId, Officer>>,
}

impl StaticRoster {
    /// Creates a roster from a fixed officer list.
    #[must_use]
    pub fn new(officers: impl IntoIterator<Item = Officer>) -> Self {
        Self {
            officers: RwLock::new(officers.into_iter().map(|o| (o.id, o)).collect()),
        }
    }

    /// Adds or replaces an officer.
    ///
    /// # Errors
    ///
    /// * If the roster lock is poisoned
    pub fn upsert(&self, officer: Officer) -> Result<(), StoreError> {
        self.officers
            .write()
            .map_err(|_| poisoned())?
            .insert(officer.id, officer);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<OfficerId, Officer>>, StoreError> {
        self.officers.read().map_err(|_| poisoned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend {
        message: "officer roster lock poisoned".to_string(),
    }
}

#[async_trait]
impl OfficerRoster for StaticRoster {
    async fn officer(&self, officer_id: OfficerId) -> Result<Option<Officer>, StoreError> {
        Ok(self.read()?.get(&officer_id).cloned())
    }

    async fn on_duty(&self, unit_id: UnitId) -> Result<Vec<Officer>, StoreError> {
        Ok(self
            .read()?
            .values()
            .filter(|o| o.can_serve(unit_id))
            .cloned()
            .collect())
    }
}

/// Great-circle distance in meters.
#[must_use]
pub fn distance_meters(a: LatLng, b: LatLng) -> f64 {
    Haversine.distance(Point::new(a.lng, a.lat), Point::new(b.lng, b.lat))
}

/// Picks the officer closest to `point` among those whose last location is
/// no older than `max_age` at `now`. Ties go to the earlier officer in
/// `officers`.
#[must_use]
pub fn nearest_officer(
    officers: &[Officer],
    point: LatLng,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Option<(&Officer, f64)> {
    officers
        .iter()
        .filter_map(|officer| {
            let location = officer.last_location?;
            if now.signed_duration_since(location.updated_at) > max_age
                || !location.point.is_valid()
            {
                return None;
            }
            Some((officer, distance_meters(point, location.point)))
        })
        .fold(None, |best, candidate| match best {
            Some((_, best_distance)) if best_distance <= candidate.1 => best,
            _ => Some(candidate),
        })
}
