//! Test helpers shared by unit and integration tests.
//!
//! Fixed coordinates, sample builders, and in-memory stand-ins for the
//! backend sink and route providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::geo::Coordinate;
use crate::position::PositionSample;
use crate::routing::{RouteFetchError, RouteOptions, RouteProvider, RouteResult, RouteStep};
use crate::tracker::{LocationSink, SinkError};

pub const CASABLANCA: Coordinate = Coordinate::new(33.5731, -7.5898);
pub const RABAT: Coordinate = Coordinate::new(33.9716, -6.8498);

/// Loopback port with nothing listening; connections are refused immediately.
pub const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:9";

/// A fresh fix at `coordinate` with 5 m accuracy.
pub fn sample_at(coordinate: Coordinate) -> PositionSample {
    PositionSample::new(coordinate, 5.0, Utc::now())
}

/// `coordinate` moved `meters` due north.
pub fn north_of(coordinate: Coordinate, meters: f64) -> Coordinate {
    let dlat = (meters / 1000.0 / crate::geo::EARTH_RADIUS_KM).to_degrees();
    Coordinate::new(coordinate.latitude + dlat, coordinate.longitude)
}

/// Sink that stores every pushed sample.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pushed: Arc<Mutex<Vec<PositionSample>>>,
}

impl RecordingSink {
    pub fn pushed(&self) -> Vec<PositionSample> {
        self.pushed.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LocationSink for RecordingSink {
    async fn push(&self, sample: &PositionSample) -> Result<(), SinkError> {
        if let Ok(mut pushed) = self.pushed.lock() {
            pushed.push(sample.clone());
        }
        Ok(())
    }
}

/// Provider that always fails and counts its calls.
#[derive(Clone, Default)]
pub struct FailingRouteProvider {
    calls: Arc<AtomicUsize>,
}

impl FailingRouteProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteProvider for FailingRouteProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn route(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
        _options: &RouteOptions,
    ) -> Result<RouteResult, RouteFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RouteFetchError::Status(503))
    }
}

/// Provider that answers with a fixed route and counts its calls.
#[derive(Clone)]
pub struct StaticRouteProvider {
    name: String,
    route: RouteResult,
    calls: Arc<AtomicUsize>,
}

impl StaticRouteProvider {
    pub fn new(name: &str, distance_km: f64, duration_minutes: f64) -> Self {
        Self {
            name: name.to_string(),
            route: RouteResult {
                polyline: vec![CASABLANCA, RABAT],
                distance_km,
                duration_minutes,
                steps: vec![RouteStep {
                    instruction: "Start your journey".to_string(),
                    distance_m: distance_km * 1000.0,
                    coordinate: Some(CASABLANCA),
                }],
            },
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteProvider for StaticRouteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn route(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
        _options: &RouteOptions,
    ) -> Result<RouteResult, RouteFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.route.clone())
    }
}

/// Provider that never answers.
pub struct HangingRouteProvider;

#[async_trait]
impl RouteProvider for HangingRouteProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn route(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
        _options: &RouteOptions,
    ) -> Result<RouteResult, RouteFetchError> {
        std::future::pending().await
    }
}
