use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::config::TrackerConfig;
use crate::position::PositionUpdate;

/// Options forwarded to the platform, mirroring the geolocation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the platform may answer with.
    pub maximum_age: Duration,
}

impl PositionOptions {
    pub fn for_watch(config: &TrackerConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: config.position_timeout(),
            maximum_age: config.watch_max_age(),
        }
    }

    pub fn for_one_shot(config: &TrackerConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: config.position_timeout(),
            maximum_age: config.one_shot_max_age(),
        }
    }
}

/// Identifies one platform watch. Unique per provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// A live platform subscription: every fix or failure arrives on `updates`
/// until the watch is cleared.
#[derive(Debug)]
pub struct PositionWatch {
    pub id: WatchId,
    pub updates: mpsc::UnboundedReceiver<PositionUpdate>,
}

/// Platform location source.
///
/// Each call to [`watch_position`](LocationProvider::watch_position) opens an
/// independent watch with its own channel; [`clear_watch`](LocationProvider::clear_watch)
/// must close that channel so no further updates are delivered on it.
pub trait LocationProvider: Send + Sync {
    fn watch_position(&self, options: &PositionOptions) -> PositionWatch;

    /// Idempotent; unknown ids are ignored.
    fn clear_watch(&self, id: WatchId);

    /// One-shot request. Resolves once with a fix or an error; a dropped
    /// sender means the provider gave up.
    fn current_position(&self, options: &PositionOptions) -> oneshot::Receiver<PositionUpdate>;
}
