//! Geographic primitives: coordinates, great-circle distance and bearing.
//!
//! Distances use the haversine formula on a spherical earth of radius
//! [`EARTH_RADIUS_KM`]. The checked entry points ([`calculate_distance`],
//! [`initial_bearing`]) reject out-of-range input with [`InputError`]; the
//! unchecked [`haversine_km`] kernel is for data that was already validated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean earth radius used by the spherical approximation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Invalid caller input. Never produced by environmental failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
    #[error("geofence radius {0} must be a finite, non-negative number of metres")]
    Radius(f64),
    #[error("cannot parse coordinate from {0:?}, expected \"lat,lng\"")]
    Parse(String),
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that both components are finite and inside their ranges.
    pub fn validate(&self) -> Result<(), InputError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(InputError::Latitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(InputError::Longitude(self.longitude));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// GeoJSON / OSRM ordering.
    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = InputError;

    /// Parses `"lat,lng"` and validates the result.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| InputError::Parse(s.to_string()))?;
        let latitude = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| InputError::Parse(s.to_string()))?;
        let longitude = lng
            .trim()
            .parse::<f64>()
            .map_err(|_| InputError::Parse(s.to_string()))?;
        let coordinate = Coordinate::new(latitude, longitude);
        coordinate.validate()?;
        Ok(coordinate)
    }
}

/// Great-circle distance in kilometres, without input validation.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Great-circle distance in kilometres between two validated coordinates.
///
/// Symmetric in its arguments and exactly zero when `a == b`.
pub fn calculate_distance(a: Coordinate, b: Coordinate) -> Result<f64, InputError> {
    a.validate()?;
    b.validate()?;
    Ok(haversine_km(a, b))
}

/// Initial bearing (forward azimuth) from `from` towards `to`, in degrees
/// clockwise from true north, normalized into `[0, 360)`.
pub fn initial_bearing(from: Coordinate, to: Coordinate) -> Result<f64, InputError> {
    from.validate()?;
    to.validate()?;
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    Ok(x.atan2(y).to_degrees().rem_euclid(360.0))
}
