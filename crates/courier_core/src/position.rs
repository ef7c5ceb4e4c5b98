use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Coordinate;

/// One fix reported by a location provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius in metres.
    pub accuracy_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, accuracy_m: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            accuracy_m: accuracy_m.max(0.0),
            speed_mps: None,
            heading_deg: None,
            captured_at,
        }
    }

    /// Negative or non-finite speeds are treated as unknown.
    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = (speed_mps.is_finite() && speed_mps >= 0.0).then_some(speed_mps);
        self
    }

    /// Heading is normalized into `[0, 360)`; non-finite values are dropped.
    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = heading_deg
            .is_finite()
            .then(|| heading_deg.rem_euclid(360.0));
        self
    }

    /// Time elapsed since capture. Fixes stamped in the future count as fresh.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.captured_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) <= max_age
    }
}

/// What a location provider reports on each watch tick.
pub type PositionUpdate = Result<PositionSample, LocationError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationErrorKind {
    PermissionDenied,
    Timeout,
    #[serde(alias = "position_unavailable")]
    Unavailable,
}

impl fmt::Display for LocationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocationErrorKind::PermissionDenied => "permission_denied",
            LocationErrorKind::Timeout => "timeout",
            LocationErrorKind::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Environmental location failure. Informational: tracking keeps running.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct LocationError {
    pub kind: LocationErrorKind,
    pub message: String,
}

impl LocationError {
    pub fn new(kind: LocationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(LocationErrorKind::PermissionDenied, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(LocationErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(LocationErrorKind::Unavailable, message)
    }
}
