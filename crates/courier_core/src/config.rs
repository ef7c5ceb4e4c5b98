//! Runtime configuration. Every section has working defaults and can be
//! loaded from JSON with missing fields filled in.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eta::DEFAULT_AVERAGE_SPEED_KMH;
use crate::geofence::DEFAULT_GEOFENCE_RADIUS_M;
use crate::routing::{RouteProviderKind, RouteScoring};

/// Location acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Ask the platform for its most precise fix source.
    pub high_accuracy: bool,
    /// Upper bound on a one-shot position request.
    pub position_timeout_secs: u64,
    /// Oldest cached fix a continuous watch may report.
    pub watch_max_age_secs: u64,
    /// Oldest cached fix a one-shot request accepts.
    pub one_shot_max_age_secs: u64,
    /// Interval for pushing the latest sample to the backend. `None` disables it.
    pub push_interval_secs: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            position_timeout_secs: 10,
            watch_max_age_secs: 30,
            one_shot_max_age_secs: 60,
            push_interval_secs: Some(30),
        }
    }
}

impl TrackerConfig {
    pub fn position_timeout(&self) -> Duration {
        Duration::from_secs(self.position_timeout_secs.max(1))
    }

    pub fn watch_max_age(&self) -> Duration {
        Duration::from_secs(self.watch_max_age_secs)
    }

    pub fn one_shot_max_age(&self) -> Duration {
        Duration::from_secs(self.one_shot_max_age_secs)
    }

    pub fn push_interval(&self) -> Option<Duration> {
        self.push_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Route provider chain and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Providers tried in order before the direct-line fallback.
    pub providers: Vec<RouteProviderKind>,
    /// Per-provider request timeout.
    pub request_timeout_secs: u64,
    /// Number of cached quotes per provider. 0 disables caching.
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    /// Speed assumed by the direct-line fallback and by ETA estimates.
    pub fallback_speed_kmh: f64,
    pub scoring: RouteScoring,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            request_timeout_secs: 8,
            cache_capacity: 256,
            cache_ttl_secs: 60,
            fallback_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            scoring: RouteScoring::default(),
        }
    }
}

#[cfg(feature = "osrm")]
fn default_providers() -> Vec<RouteProviderKind> {
    vec![RouteProviderKind::Osrm {
        endpoint: "https://router.project-osrm.org".to_string(),
    }]
}

#[cfg(not(feature = "osrm"))]
fn default_providers() -> Vec<RouteProviderKind> {
    Vec::new()
}

impl RoutingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    pub radius_m: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_GEOFENCE_RADIUS_M,
        }
    }
}

/// Delivery backend that receives periodic location pushes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Full URL of the current-location endpoint. `None` disables pushing.
    pub location_url: Option<String>,
    pub bearer_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(5).max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub tracker: TrackerConfig,
    pub routing: RoutingConfig,
    pub geofence: GeofenceConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CourierConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
