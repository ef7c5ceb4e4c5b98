use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, Coordinate};
use crate::position::PositionSample;

/// Average city speed used whenever a better figure is not available.
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 40.0;

/// Below this the reported speed is GPS jitter, not movement.
const MIN_MOVING_SPEED_MPS: f64 = 1.0;
const MIN_SPEED_KMH: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EtaEstimate {
    pub remaining_distance_km: f64,
    pub remaining_minutes: f64,
    pub arrival_at: DateTime<Utc>,
}

/// Straight-line ETA from a sample to `target`.
///
/// Uses the sample's own speed while the device is moving, otherwise
/// `fallback_speed_kmh`.
pub fn estimate_eta(
    sample: &PositionSample,
    target: Coordinate,
    fallback_speed_kmh: f64,
) -> EtaEstimate {
    let remaining_distance_km = haversine_km(sample.coordinate, target);
    let speed_kmh = match sample.speed_mps {
        Some(mps) if mps > MIN_MOVING_SPEED_MPS => mps * 3.6,
        _ => fallback_speed_kmh,
    }
    .max(MIN_SPEED_KMH);

    let remaining_minutes = remaining_distance_km / speed_kmh * 60.0;
    let arrival_at =
        sample.captured_at + chrono::Duration::milliseconds((remaining_minutes * 60_000.0) as i64);

    EtaEstimate {
        remaining_distance_km,
        remaining_minutes,
        arrival_at,
    }
}
