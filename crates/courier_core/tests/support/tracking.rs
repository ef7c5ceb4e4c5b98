use std::sync::Arc;
use std::time::Duration;

use courier_core::config::TrackerConfig;
use courier_core::position::PositionUpdate;
use courier_core::tracker::{LocationFeed, LocationTracker};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(1);

/// Tracker config without the periodic backend push.
pub fn quiet_config() -> TrackerConfig {
    TrackerConfig {
        push_interval_secs: None,
        ..TrackerConfig::default()
    }
}

pub fn tracker_on(feed: &LocationFeed) -> LocationTracker {
    LocationTracker::new(Arc::new(feed.clone()), quiet_config())
}

/// A listener that forwards every update into a channel.
pub fn channel_listener() -> (
    impl Fn(&PositionUpdate) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<PositionUpdate>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = move |update: &PositionUpdate| {
        let _ = tx.send(update.clone());
    };
    (callback, rx)
}

pub async fn next_update(rx: &mut mpsc::UnboundedReceiver<PositionUpdate>) -> PositionUpdate {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("update should arrive")
        .expect("channel open")
}

/// Yield to the runtime until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition should become true");
}
