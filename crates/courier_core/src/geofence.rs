//! Circular pickup/delivery zones and proximity classification.

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, Coordinate, InputError};

/// Radius used for order zones when none is configured.
pub const DEFAULT_GEOFENCE_RADIUS_M: f64 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeofenceZone {
    pub center: Coordinate,
    pub radius_m: f64,
}

impl GeofenceZone {
    pub fn new(center: Coordinate, radius_m: f64) -> Result<Self, InputError> {
        center.validate()?;
        if !radius_m.is_finite() || radius_m < 0.0 {
            return Err(InputError::Radius(radius_m));
        }
        Ok(Self { center, radius_m })
    }

    /// Inclusive: a point exactly `radius_m` away is inside.
    pub fn contains(&self, point: Coordinate) -> bool {
        haversine_km(point, self.center) * 1000.0 <= self.radius_m
    }
}

pub fn is_within_geofence(current: Coordinate, zone: &GeofenceZone) -> bool {
    zone.contains(current)
}

/// Where a driver stands relative to the order's zones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    AtPickup,
    AtDelivery,
    #[default]
    InTransit,
}

/// Pickup is checked before delivery, so overlapping zones resolve to
/// [`Proximity::AtPickup`].
pub fn classify_proximity(
    current: Coordinate,
    pickup: Option<&GeofenceZone>,
    delivery: Option<&GeofenceZone>,
) -> Proximity {
    if pickup.is_some_and(|zone| zone.contains(current)) {
        Proximity::AtPickup
    } else if delivery.is_some_and(|zone| zone.contains(current)) {
        Proximity::AtDelivery
    } else {
        Proximity::InTransit
    }
}

/// The zones of one delivery order, fixed for the lifetime of a tracking session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderZones {
    pub pickup: Option<GeofenceZone>,
    pub delivery: Option<GeofenceZone>,
}

impl OrderZones {
    /// Build same-radius zones around the order's pickup and delivery points.
    pub fn around(
        pickup: Option<Coordinate>,
        delivery: Option<Coordinate>,
        radius_m: f64,
    ) -> Result<Self, InputError> {
        Ok(Self {
            pickup: pickup.map(|c| GeofenceZone::new(c, radius_m)).transpose()?,
            delivery: delivery.map(|c| GeofenceZone::new(c, radius_m)).transpose()?,
        })
    }

    pub fn classify(&self, current: Coordinate) -> Proximity {
        classify_proximity(current, self.pickup.as_ref(), self.delivery.as_ref())
    }

    /// Where the driver should head next: pickup until it has been reached,
    /// then delivery.
    pub fn target_for(&self, proximity: Proximity, picked_up: bool) -> Option<Coordinate> {
        let pickup = self.pickup.map(|z| z.center);
        let delivery = self.delivery.map(|z| z.center);
        match proximity {
            Proximity::AtPickup | Proximity::AtDelivery => delivery.or(pickup),
            Proximity::InTransit if picked_up => delivery.or(pickup),
            Proximity::InTransit => pickup.or(delivery),
        }
    }
}
