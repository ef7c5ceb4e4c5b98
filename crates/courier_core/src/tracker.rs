//! Location tracker: one platform watch per tracker, observer-style listeners,
//! and an optional periodic push of the latest sample to the backend.
//!
//! Every `start_tracking` opens a new *session* identified by a generation
//! number. Updates are only delivered while their session's generation is the
//! current one, so a superseded or stopped session can never reach a listener
//! again, even if its dispatch task is still draining its channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::position::{LocationError, PositionSample, PositionUpdate};

pub mod feed;
pub mod provider;
pub mod sink;

pub use feed::LocationFeed;
pub use provider::{LocationProvider, PositionOptions, PositionWatch, WatchId};
pub use sink::{LocationSink, SinkError};

#[cfg(feature = "backend-sink")]
pub use sink::HttpLocationSink;

pub type PositionCallback = Arc<dyn Fn(&PositionUpdate) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Session {
    generation: u64,
    watch: WatchId,
    listeners: Vec<(ListenerId, PositionCallback)>,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct TrackerState {
    generation: u64,
    next_listener: u64,
    session: Option<Session>,
    latest: Option<PositionSample>,
    last_error: Option<LocationError>,
    /// Thread currently running listeners, if any.
    dispatching_on: Option<ThreadId>,
}

struct TrackerInner {
    provider: Arc<dyn LocationProvider>,
    sink: Option<Arc<dyn LocationSink>>,
    config: TrackerConfig,
    state: Mutex<TrackerState>,
    /// Held for the whole listener loop of one update.
    delivery: Mutex<()>,
}

impl TrackerInner {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Detach the current session. Bumping the generation here is what stops
    /// delivery; teardown only releases resources.
    fn take_session(&self) -> Option<Session> {
        let mut state = self.lock();
        state.generation += 1;
        state.session.take()
    }

    fn teardown(&self, session: Session) {
        self.provider.clear_watch(session.watch);
        for task in &session.tasks {
            task.abort();
        }
        debug!(
            generation = session.generation,
            watch = session.watch.0,
            "tracking session closed"
        );
    }

    fn stop(&self) {
        if let Some(session) = self.take_session() {
            self.teardown(session);
        }
        self.wait_for_delivery();
    }

    /// Block until listeners running on another thread have returned. A
    /// listener stopping its own tracker does not wait for itself.
    fn wait_for_delivery(&self) {
        let own_thread = self.lock().dispatching_on == Some(thread::current().id());
        if !own_thread {
            drop(self.delivery.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    fn is_listening(&self, generation: u64, listener: ListenerId) -> bool {
        self.lock().session.as_ref().is_some_and(|s| {
            s.generation == generation && s.listeners.iter().any(|(id, _)| *id == listener)
        })
    }

    fn record_sample(&self, sample: &PositionSample) {
        let mut state = self.lock();
        let newer = state
            .latest
            .as_ref()
            .map_or(true, |latest| latest.captured_at <= sample.captured_at);
        if newer {
            state.latest = Some(sample.clone());
        }
        state.last_error = None;
    }

    /// Returns `false` once the session is no longer current.
    fn deliver(&self, generation: u64, update: PositionUpdate) -> bool {
        let listeners = {
            let mut state = self.lock();
            let listeners = match state.session.as_ref() {
                Some(session) if session.generation == generation => session.listeners.clone(),
                _ => return false,
            };
            match &update {
                Ok(sample) => {
                    state.latest = Some(sample.clone());
                    state.last_error = None;
                }
                Err(err) => {
                    warn!(kind = %err.kind, message = %err.message, "location update failed");
                    state.last_error = Some(err.clone());
                }
            }
            listeners
        };

        let _delivering = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        self.lock().dispatching_on = Some(thread::current().id());

        // A listener may stop the tracker or unsubscribe another listener.
        for (id, callback) in listeners {
            if self.is_listening(generation, id) {
                callback(&update);
            }
        }
        self.lock().dispatching_on = None;
        true
    }
}

async fn dispatch_updates(
    inner: Weak<TrackerInner>,
    generation: u64,
    mut updates: mpsc::UnboundedReceiver<PositionUpdate>,
) {
    while let Some(update) = updates.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.deliver(generation, update) {
            break;
        }
    }
    debug!(generation, "position dispatch finished");
}

async fn push_latest(
    inner: Weak<TrackerInner>,
    generation: u64,
    sink: Arc<dyn LocationSink>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let sample = {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if !inner.is_current(generation) {
                break;
            }
            let latest = inner.lock().latest.clone();
            latest
        };
        let Some(sample) = sample else {
            continue;
        };
        match sink.push(&sample).await {
            Ok(()) => debug!(at = %sample.coordinate, "pushed location"),
            Err(err) => warn!(error = %err, "failed to push location"),
        }
    }
}

/// Handle to one listener registration.
#[derive(Debug)]
pub struct Subscription {
    inner: Weak<TrackerInner>,
    generation: u64,
    listener: ListenerId,
}

impl Subscription {
    pub fn listener_id(&self) -> ListenerId {
        self.listener
    }

    /// True while the listener is registered on the current session.
    pub fn is_active(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.is_listening(self.generation, self.listener))
    }

    /// Remove this listener. The session keeps running for other listeners.
    /// Returns whether anything was removed.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut state = inner.lock();
        let removed = match state.session.as_mut() {
            Some(session) if session.generation == self.generation => {
                let before = session.listeners.len();
                session.listeners.retain(|(id, _)| *id != self.listener);
                session.listeners.len() != before
            }
            _ => false,
        };
        removed
    }
}

/// Cheap handle that can stop a tracker from inside its own callbacks.
#[derive(Clone)]
pub struct StopHandle {
    inner: Weak<TrackerInner>,
}

impl StopHandle {
    pub fn stop(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.stop();
        }
    }
}

/// Best-effort stream of the device position.
///
/// Owned by whichever component composes it; dropping the tracker stops it.
/// `start_tracking` and `add_listener` spawn onto the ambient Tokio runtime
/// and must be called from within one.
pub struct LocationTracker {
    inner: Arc<TrackerInner>,
}

impl LocationTracker {
    pub fn new(provider: Arc<dyn LocationProvider>, config: TrackerConfig) -> Self {
        Self::build(provider, None, config)
    }

    /// Tracker that also pushes the latest sample to `sink` every
    /// `config.push_interval()` while tracking.
    pub fn with_sink(
        provider: Arc<dyn LocationProvider>,
        sink: Arc<dyn LocationSink>,
        config: TrackerConfig,
    ) -> Self {
        Self::build(provider, Some(sink), config)
    }

    fn build(
        provider: Arc<dyn LocationProvider>,
        sink: Option<Arc<dyn LocationSink>>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                provider,
                sink,
                config,
                state: Mutex::new(TrackerState::default()),
                delivery: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Begin continuous tracking with `callback` as the first listener.
    ///
    /// Any existing session is torn down first, so exactly one platform watch
    /// is open afterwards and earlier listeners never fire again.
    pub fn start_tracking<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PositionUpdate) + Send + Sync + 'static,
    {
        let inner = &self.inner;
        inner.stop();

        let watch = inner
            .provider
            .watch_position(&PositionOptions::for_watch(&inner.config));
        let watch_id = watch.id;

        let (subscription, displaced) = {
            let mut state = inner.lock();
            state.generation += 1;
            let generation = state.generation;
            let listener = ListenerId(state.next_listener);
            state.next_listener += 1;

            let mut tasks = vec![tokio::spawn(dispatch_updates(
                Arc::downgrade(inner),
                generation,
                watch.updates,
            ))];
            if let (Some(sink), Some(period)) = (inner.sink.clone(), inner.config.push_interval())
            {
                tasks.push(tokio::spawn(push_latest(
                    Arc::downgrade(inner),
                    generation,
                    sink,
                    period,
                )));
            }

            let callback: PositionCallback = Arc::new(callback);
            let displaced = state.session.replace(Session {
                generation,
                watch: watch_id,
                listeners: vec![(listener, callback)],
                tasks,
            });
            (
                Subscription {
                    inner: Arc::downgrade(inner),
                    generation,
                    listener,
                },
                displaced,
            )
        };

        // Only reachable when another thread started tracking concurrently.
        if let Some(previous) = displaced {
            inner.teardown(previous);
        }
        debug!(
            generation = subscription.generation,
            watch = watch_id.0,
            "tracking started"
        );
        subscription
    }

    /// Register another listener on the running session. `None` when not tracking.
    pub fn add_listener<F>(&self, callback: F) -> Option<Subscription>
    where
        F: Fn(&PositionUpdate) + Send + Sync + 'static,
    {
        let mut state = self.inner.lock();
        let listener = ListenerId(state.next_listener);
        let session = state.session.as_mut()?;
        let generation = session.generation;
        session.listeners.push((listener, Arc::new(callback)));
        state.next_listener += 1;
        Some(Subscription {
            inner: Arc::downgrade(&self.inner),
            generation,
            listener,
        })
    }

    /// Idempotent. Clears the platform watch, cancels the push timer and
    /// releases every listener; nothing is delivered after this returns.
    ///
    /// A listener running on another thread is allowed to finish first, so
    /// a listener must not block on a thread that is stopping its tracker.
    pub fn stop_tracking(&self) {
        self.inner.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    pub fn latest_sample(&self) -> Option<PositionSample> {
        self.inner.lock().latest.clone()
    }

    /// Most recent location failure, cleared by the next good fix.
    pub fn last_error(&self) -> Option<LocationError> {
        self.inner.lock().last_error.clone()
    }

    /// One-shot position request.
    ///
    /// The latest sample is reused while it is younger than the one-shot
    /// staleness tolerance. Otherwise the provider is asked, and the request
    /// resolves with a `timeout` error if it does not answer in time.
    pub async fn get_current_position(&self) -> Result<PositionSample, LocationError> {
        let options = PositionOptions::for_one_shot(&self.inner.config);
        if let Some(sample) = self
            .latest_sample()
            .filter(|sample| sample.is_fresh(Utc::now(), options.maximum_age))
        {
            return Ok(sample);
        }

        let request = self.inner.provider.current_position(&options);
        let update = match tokio::time::timeout(options.timeout, request).await {
            Ok(Ok(update)) => update,
            Ok(Err(_)) => Err(LocationError::unavailable(
                "location provider dropped the request",
            )),
            Err(_) => Err(LocationError::timeout(format!(
                "no position within {}s",
                options.timeout.as_secs()
            ))),
        };

        match &update {
            Ok(sample) => self.inner.record_sample(sample),
            Err(err) => {
                warn!(kind = %err.kind, message = %err.message, "position request failed");
                self.inner.lock().last_error = Some(err.clone());
            }
        }
        update
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        self.inner.stop();
    }
}
