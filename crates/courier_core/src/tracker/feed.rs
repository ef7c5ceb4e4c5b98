//! In-process [`LocationProvider`] driven by the host.
//!
//! Whatever actually produces fixes (a device bridge, a replay file, a test)
//! pushes them into a [`LocationFeed`]; trackers subscribe to it exactly as
//! they would to a platform geolocation service.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::provider::{LocationProvider, PositionOptions, PositionWatch, WatchId};
use crate::position::{LocationError, PositionSample, PositionUpdate};

#[derive(Default)]
struct FeedState {
    next_watch: u64,
    watches: Vec<(WatchId, mpsc::UnboundedSender<PositionUpdate>)>,
    pending: Vec<oneshot::Sender<PositionUpdate>>,
    last_fix: Option<PositionSample>,
    permission_denied: bool,
}

/// Cloning yields another handle to the same feed.
#[derive(Clone, Default)]
pub struct LocationFeed {
    state: Arc<Mutex<FeedState>>,
}

const DENIED_MESSAGE: &str = "location permission denied";

impl LocationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a fix to every open watch and every pending one-shot request.
    pub fn publish(&self, sample: PositionSample) {
        let mut state = self.lock();
        state.last_fix = Some(sample.clone());
        state
            .watches
            .retain(|(_, tx)| tx.send(Ok(sample.clone())).is_ok());
        for waiter in state.pending.drain(..) {
            let _ = waiter.send(Ok(sample.clone()));
        }
    }

    /// Report a failure to every open watch and every pending request.
    pub fn fail(&self, error: LocationError) {
        let mut state = self.lock();
        state
            .watches
            .retain(|(_, tx)| tx.send(Err(error.clone())).is_ok());
        for waiter in state.pending.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    /// Revoke permission: open watches and pending requests get a
    /// `permission_denied` error, new requests fail immediately.
    pub fn deny_permission(&self) {
        self.lock().permission_denied = true;
        self.fail(LocationError::permission_denied(DENIED_MESSAGE));
    }

    pub fn grant_permission(&self) {
        self.lock().permission_denied = false;
    }

    /// One-shot requests still waiting for a fix. Requests whose caller gave
    /// up are not counted.
    pub fn pending_requests(&self) -> usize {
        let mut state = self.lock();
        state.pending.retain(|tx| !tx.is_closed());
        state.pending.len()
    }

    /// Number of watches whose subscriber is still listening.
    pub fn active_watches(&self) -> usize {
        let mut state = self.lock();
        state.watches.retain(|(_, tx)| !tx.is_closed());
        state.watches.len()
    }
}

impl LocationProvider for LocationFeed {
    fn watch_position(&self, _options: &PositionOptions) -> PositionWatch {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let id = WatchId(state.next_watch);
        state.next_watch += 1;

        if state.permission_denied {
            let _ = tx.send(Err(LocationError::permission_denied(DENIED_MESSAGE)));
        }
        state.watches.push((id, tx));
        debug!(watch = id.0, "location watch opened");
        PositionWatch { id, updates: rx }
    }

    fn clear_watch(&self, id: WatchId) {
        let mut state = self.lock();
        let before = state.watches.len();
        state.watches.retain(|(watch, _)| *watch != id);
        if state.watches.len() != before {
            debug!(watch = id.0, "location watch cleared");
        }
    }

    fn current_position(&self, options: &PositionOptions) -> oneshot::Receiver<PositionUpdate> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();

        if state.permission_denied {
            let _ = tx.send(Err(LocationError::permission_denied(DENIED_MESSAGE)));
            return rx;
        }

        let cached = state
            .last_fix
            .as_ref()
            .filter(|fix| fix.is_fresh(Utc::now(), options.maximum_age))
            .cloned();
        match cached {
            Some(fix) => {
                let _ = tx.send(Ok(fix));
            }
            None => {
                // Callers that timed out have dropped their receivers.
                state.pending.retain(|waiter| !waiter.is_closed());
                state.pending.push(tx);
            }
        }
        rx
    }
}
