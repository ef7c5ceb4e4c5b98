//! Client-side geo engine for delivery tracking: distances and bearings,
//! pickup/delivery geofences, a best-effort location tracker, and scored
//! route quotes with a guaranteed direct-line fallback.

pub mod config;
pub mod eta;
pub mod geo;
pub mod geofence;
pub mod position;
pub mod routing;
pub mod session;
pub mod tracker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::{CourierConfig, RoutingConfig, TrackerConfig};
pub use geo::{calculate_distance, initial_bearing, Coordinate, InputError};
pub use geofence::{classify_proximity, is_within_geofence, GeofenceZone, OrderZones, Proximity};
pub use position::{LocationError, LocationErrorKind, PositionSample, PositionUpdate};
pub use routing::{RouteOptions, RouteQuote, RouteQuoteService, RouteStep, VehicleProfile};
pub use session::{DeliveryTrackingSession, SessionEvent};
pub use tracker::{LocationFeed, LocationTracker, Subscription};
