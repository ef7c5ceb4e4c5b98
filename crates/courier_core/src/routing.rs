//! Route quotes: pluggable providers behind an ordered fallback chain.
//!
//! Implementations of [`RouteProvider`]:
//!
//! - **`DirectLineRouteProvider`**: great-circle line at a fixed average speed. Never fails.
//! - **`OsrmRouteProvider`** (feature `osrm`): calls an OSRM HTTP endpoint.
//! - **`CachedRouteProvider`**: LRU + TTL wrapper around any other provider.
//!
//! [`RouteQuoteService`] walks its providers in order and, when all of them
//! fail, synthesizes a direct-line quote so callers always get a usable route.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::eta::DEFAULT_AVERAGE_SPEED_KMH;
use crate::geo::{haversine_km, Coordinate, InputError};

pub mod error;
#[cfg(feature = "osrm")]
pub mod osrm;
pub mod scoring;

pub use error::RouteFetchError;
pub use scoring::{select_best_route, RouteScoring};

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleProfile {
    #[default]
    Car,
    Bike,
    Scooter,
    Van,
}

impl VehicleProfile {
    /// OSRM routing profile for this vehicle.
    pub fn osrm_profile(self) -> &'static str {
        match self {
            VehicleProfile::Car | VehicleProfile::Van => "driving",
            VehicleProfile::Bike | VehicleProfile::Scooter => "cycling",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteOptions {
    pub vehicle_profile: VehicleProfile,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub instruction: String,
    pub distance_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
}

/// Raw route as returned by a provider, before scoring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub polyline: Vec<Coordinate>,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub steps: Vec<RouteStep>,
}

/// A scored route snapshot. Replaced wholesale on refresh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteQuote {
    pub polyline: Vec<Coordinate>,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub steps: Vec<RouteStep>,
    pub score: u8,
    /// Name of the provider that produced the route.
    pub provider: String,
    /// True when every provider failed and the quote was synthesized.
    pub fallback: bool,
}

/// Routing backend. Implementations must be `Send + Sync` so one service can
/// be shared between tracking sessions.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Compute a route between two validated coordinates.
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        options: &RouteOptions,
    ) -> Result<RouteResult, RouteFetchError>;
}

// ---------------------------------------------------------------------------
// Direct-line provider (always available)
// ---------------------------------------------------------------------------

pub struct DirectLineRouteProvider {
    average_speed_kmh: f64,
}

impl Default for DirectLineRouteProvider {
    fn default() -> Self {
        Self::new(DEFAULT_AVERAGE_SPEED_KMH)
    }
}

impl DirectLineRouteProvider {
    pub const NAME: &'static str = "direct_line";

    pub fn new(average_speed_kmh: f64) -> Self {
        let average_speed_kmh = if average_speed_kmh.is_finite() && average_speed_kmh > 0.0 {
            average_speed_kmh
        } else {
            DEFAULT_AVERAGE_SPEED_KMH
        };
        Self { average_speed_kmh }
    }

    pub fn plan(&self, origin: Coordinate, destination: Coordinate) -> RouteResult {
        let distance_km = haversine_km(origin, destination);
        RouteResult {
            polyline: vec![origin, destination],
            distance_km,
            duration_minutes: distance_km / self.average_speed_kmh * 60.0,
            steps: vec![RouteStep {
                instruction: "Navigate to destination".to_string(),
                distance_m: distance_km * 1000.0,
                coordinate: Some(destination),
            }],
        }
    }
}

#[async_trait]
impl RouteProvider for DirectLineRouteProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        _options: &RouteOptions,
    ) -> Result<RouteResult, RouteFetchError> {
        Ok(self.plan(origin, destination))
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

/// Cache key precision: 1e-5 degrees is roughly one metre.
const CACHE_KEY_SCALE: f64 = 1e5;

type CacheKey = (i64, i64, i64, i64, VehicleProfile);

fn cache_key(origin: Coordinate, destination: Coordinate, options: &RouteOptions) -> CacheKey {
    let q = |v: f64| (v * CACHE_KEY_SCALE).round() as i64;
    (
        q(origin.latitude),
        q(origin.longitude),
        q(destination.latitude),
        q(destination.longitude),
        options.vehicle_profile,
    )
}

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// The key is directional and includes the vehicle profile. Entries older
/// than `ttl` are refetched; failures are never cached.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<CacheKey, (Instant, RouteResult)>>,
    ttl: Duration,
}

impl CachedRouteProvider {
    pub fn new(inner: Box<dyn RouteProvider>, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RouteProvider for CachedRouteProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        options: &RouteOptions,
    ) -> Result<RouteResult, RouteFetchError> {
        let key = cache_key(origin, destination, options);

        // Fast path: fresh cache hit
        if let Ok(mut cache) = self.cache.lock() {
            match cache.get(&key) {
                Some((stored_at, route)) if stored_at.elapsed() <= self.ttl => {
                    return Ok(route.clone());
                }
                Some(_) => {
                    cache.pop(&key);
                }
                None => {}
            }
        }

        let route = self.inner.route(origin, destination, options).await?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, (Instant::now(), route.clone()));
        }
        Ok(route)
    }
}

// ---------------------------------------------------------------------------
// Quote service
// ---------------------------------------------------------------------------

pub struct RouteQuoteService {
    providers: Vec<Box<dyn RouteProvider>>,
    fallback: DirectLineRouteProvider,
    scoring: RouteScoring,
    request_timeout: Duration,
}

impl RouteQuoteService {
    pub fn new(
        providers: Vec<Box<dyn RouteProvider>>,
        scoring: RouteScoring,
        request_timeout: Duration,
        fallback_speed_kmh: f64,
    ) -> Self {
        Self {
            providers,
            fallback: DirectLineRouteProvider::new(fallback_speed_kmh),
            scoring,
            request_timeout,
        }
    }

    /// A service with no external providers: every quote is a direct line.
    pub fn direct_line_only() -> Self {
        let config = RoutingConfig::default();
        let request_timeout = config.request_timeout();
        Self::new(
            Vec::new(),
            config.scoring,
            request_timeout,
            config.fallback_speed_kmh,
        )
    }

    pub fn scoring(&self) -> &RouteScoring {
        &self.scoring
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch the best available route.
    ///
    /// Providers are tried in order, each bounded by the request timeout.
    /// When all fail the direct-line quote is returned. Only invalid input
    /// coordinates produce an error.
    pub async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        options: RouteOptions,
    ) -> Result<RouteQuote, InputError> {
        origin.validate()?;
        destination.validate()?;

        for provider in &self.providers {
            debug!(provider = provider.name(), %origin, %destination, "requesting route");
            let request = provider.route(origin, destination, &options);
            let attempt = tokio::time::timeout(self.request_timeout, request)
                .await
                .unwrap_or(Err(RouteFetchError::Timeout));
            match attempt {
                Ok(route) => return Ok(self.quote(route, provider.name(), false)),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "route provider failed");
                }
            }
        }

        if !self.providers.is_empty() {
            warn!(%origin, %destination, "all route providers failed, using direct line");
        }
        let route = self.fallback.plan(origin, destination);
        Ok(self.quote(route, DirectLineRouteProvider::NAME, true))
    }

    /// Score a quote from its distance and duration.
    pub fn score_route(&self, quote: &RouteQuote) -> u8 {
        self.scoring.score(quote.distance_km, quote.duration_minutes)
    }

    fn quote(&self, route: RouteResult, provider: &str, fallback: bool) -> RouteQuote {
        RouteQuote {
            score: self.scoring.score(route.distance_km, route.duration_minutes),
            polyline: route.polyline,
            distance_km: route.distance_km,
            duration_minutes: route.duration_minutes,
            steps: route.steps,
            provider: provider.to_string(),
            fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// Factory: build the service from configuration
// ---------------------------------------------------------------------------

/// Which routing backend to use for one link of the chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteProviderKind {
    /// Great-circle line, zero external dependencies.
    DirectLine,
    /// OSRM HTTP endpoint (e.g. `"http://localhost:5000"`).
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
}

/// Construct one provider from its descriptor. HTTP providers are wrapped in
/// a [`CachedRouteProvider`] when caching is enabled.
pub fn build_route_provider(
    kind: &RouteProviderKind,
    config: &RoutingConfig,
) -> Result<Box<dyn RouteProvider>, RouteFetchError> {
    match kind {
        RouteProviderKind::DirectLine => Ok(Box::new(DirectLineRouteProvider::new(
            config.fallback_speed_kmh,
        ))),

        #[cfg(feature = "osrm")]
        RouteProviderKind::Osrm { endpoint } => {
            let inner = Box::new(osrm::OsrmRouteProvider::new(
                endpoint,
                config.request_timeout(),
            )?);
            if config.cache_capacity == 0 {
                Ok(inner)
            } else {
                Ok(Box::new(CachedRouteProvider::new(
                    inner,
                    config.cache_capacity,
                    config.cache_ttl(),
                )))
            }
        }
    }
}

/// Build the full service. Providers that cannot be constructed are skipped
/// with a warning; the direct-line fallback is always present.
pub fn build_route_service(config: &RoutingConfig) -> RouteQuoteService {
    let providers = config
        .providers
        .iter()
        .filter_map(|kind| match build_route_provider(kind, config) {
            Ok(provider) => Some(provider),
            Err(err) => {
                warn!(?kind, error = %err, "skipping route provider");
                None
            }
        })
        .collect();

    RouteQuoteService::new(
        providers,
        config.scoring.clone(),
        config.request_timeout(),
        config.fallback_speed_kmh,
    )
}
