//! Driver profiles and locations.

use common::{DriverId, UserId};
use serde::{Deserialize, Serialize};

/// A delivery driver linked to a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub user_id: UserId,
    pub available: bool,
    pub vehicle_type: String,
    pub license_plate: String,
    pub location: Option<GeoPoint>,
}

impl Driver {
    pub fn new(
        user_id: UserId,
        vehicle_type: impl Into<String>,
        license_plate: impl Into<String>,
    ) -> Self {
        Self {
            id: DriverId::new(),
            user_id,
            available: false,
            vehicle_type: vehicle_type.into(),
            license_plate: license_plate.into(),
            location: None,
        }
    }
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Returns `None` if either coordinate is out of range or not finite.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
        let lng_ok = lng.is_finite() && (-180.0..=180.0).contains(&lng);
        (lat_ok && lng_ok).then_some(Self { lat, lng })
    }
}
