//! Delivery tracking session: composes a [`LocationTracker`], the order's
//! geofences and a [`RouteQuoteService`] into one event stream for a
//! driver-facing screen.
//!
//! The session keeps one current route and re-plans it whenever the target
//! changes (pickup until the driver has been at pickup, delivery afterwards).
//! Older route requests that finish late are discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::eta::{estimate_eta, EtaEstimate};
use crate::geo::{Coordinate, InputError};
use crate::geofence::{OrderZones, Proximity};
use crate::position::{LocationError, PositionSample};
use crate::routing::{RouteOptions, RouteQuote, RouteQuoteService};
use crate::tracker::LocationTracker;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Position(PositionSample),
    LocationFailed(LocationError),
    ProximityChanged {
        from: Option<Proximity>,
        to: Proximity,
    },
    Eta(EtaEstimate),
    RouteReady(RouteQuote),
}

pub type EventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

#[derive(Default)]
struct SessionState {
    proximity: Option<Proximity>,
    picked_up: bool,
    route: Option<RouteQuote>,
    route_target: Option<Coordinate>,
    route_request: u64,
    eta: Option<EtaEstimate>,
}

struct SessionContext {
    routes: Arc<RouteQuoteService>,
    zones: OrderZones,
    options: RouteOptions,
    fallback_speed_kmh: f64,
    state: Mutex<SessionState>,
    events: Mutex<Option<EventCallback>>,
}

impl SessionContext {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        let callback = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    /// Classify a fix and update proximity and ETA. Returns the route target
    /// when it differs from the one the current route was planned for.
    fn observe(&self, sample: &PositionSample) -> Option<Coordinate> {
        let proximity = self.zones.classify(sample.coordinate);
        let (previous, target, replan) = {
            let mut state = self.lock();
            let previous = state.proximity.replace(proximity);
            if proximity == Proximity::AtPickup {
                state.picked_up = true;
            }
            let target = self.zones.target_for(proximity, state.picked_up);
            let replan = target.filter(|t| state.route_target != Some(*t));
            (previous, target, replan)
        };

        if previous != Some(proximity) {
            debug!(?previous, ?proximity, "proximity changed");
            self.emit(SessionEvent::ProximityChanged {
                from: previous,
                to: proximity,
            });
        }

        if let Some(target) = target {
            let eta = estimate_eta(sample, target, self.fallback_speed_kmh);
            self.lock().eta = Some(eta.clone());
            self.emit(SessionEvent::Eta(eta));
        }
        replan
    }
}

/// Fetch a route and install it unless a newer request has been issued meanwhile.
async fn plan_route(
    ctx: Arc<SessionContext>,
    origin: Coordinate,
    target: Coordinate,
) -> Result<RouteQuote, InputError> {
    let request = {
        let mut state = ctx.lock();
        state.route_request += 1;
        state.route_target = Some(target);
        state.route_request
    };

    let quote = ctx.routes.fetch_route(origin, target, ctx.options).await?;

    let current = {
        let mut state = ctx.lock();
        if state.route_request == request {
            state.route = Some(quote.clone());
            true
        } else {
            false
        }
    };
    if current {
        ctx.emit(SessionEvent::RouteReady(quote.clone()));
    } else {
        debug!(request, "discarding superseded route");
    }
    Ok(quote)
}

fn handle_sample(ctx: &Arc<SessionContext>, sample: &PositionSample) {
    if !sample.coordinate.is_valid() {
        ctx.emit(SessionEvent::LocationFailed(LocationError::unavailable(
            format!("provider reported invalid coordinate {}", sample.coordinate),
        )));
        return;
    }
    ctx.emit(SessionEvent::Position(sample.clone()));

    if let Some(target) = ctx.observe(sample) {
        let ctx = Arc::clone(ctx);
        let origin = sample.coordinate;
        tokio::spawn(async move {
            if let Err(err) = plan_route(ctx, origin, target).await {
                warn!(error = %err, "route refresh rejected");
            }
        });
    }
}

pub struct DeliveryTrackingSession {
    tracker: LocationTracker,
    ctx: Arc<SessionContext>,
}

impl DeliveryTrackingSession {
    pub fn new(
        tracker: LocationTracker,
        routes: Arc<RouteQuoteService>,
        zones: OrderZones,
        options: RouteOptions,
        fallback_speed_kmh: f64,
    ) -> Self {
        Self {
            tracker,
            ctx: Arc::new(SessionContext {
                routes,
                zones,
                options,
                fallback_speed_kmh,
                state: Mutex::new(SessionState::default()),
                events: Mutex::new(None),
            }),
        }
    }

    /// Take an initial fix, plan the first route, then track continuously.
    ///
    /// A failed initial fix is reported as [`SessionEvent::LocationFailed`]
    /// and tracking starts anyway. Errors are reserved for invalid order
    /// coordinates.
    pub async fn start<F>(&self, on_event: F) -> Result<(), InputError>
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        *self
            .ctx
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(on_event));

        match self.tracker.get_current_position().await {
            Ok(sample) if sample.coordinate.is_valid() => {
                self.ctx.emit(SessionEvent::Position(sample.clone()));
                if let Some(target) = self.ctx.observe(&sample) {
                    plan_route(Arc::clone(&self.ctx), sample.coordinate, target).await?;
                }
            }
            Ok(sample) => self.ctx.emit(SessionEvent::LocationFailed(
                LocationError::unavailable(format!(
                    "provider reported invalid coordinate {}",
                    sample.coordinate
                )),
            )),
            Err(err) => self.ctx.emit(SessionEvent::LocationFailed(err)),
        }

        let ctx = Arc::clone(&self.ctx);
        self.tracker.start_tracking(move |update| match update {
            Ok(sample) => handle_sample(&ctx, sample),
            Err(err) => ctx.emit(SessionEvent::LocationFailed(err.clone())),
        });
        Ok(())
    }

    /// Re-plan from the latest fix toward the current target, replacing the
    /// current route. `None` without a fix or a target.
    pub async fn refresh_route(&self) -> Result<Option<RouteQuote>, InputError> {
        let Some(sample) = self.tracker.latest_sample() else {
            return Ok(None);
        };
        let target = {
            let state = self.ctx.lock();
            let proximity = state.proximity.unwrap_or_default();
            self.ctx.zones.target_for(proximity, state.picked_up)
        };
        match target {
            Some(target) => plan_route(Arc::clone(&self.ctx), sample.coordinate, target)
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// Stop tracking and silence all further events, including route
    /// requests still in flight.
    pub fn stop(&self) {
        self.tracker.stop_tracking();
        *self
            .ctx
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn tracker(&self) -> &LocationTracker {
        &self.tracker
    }

    pub fn proximity(&self) -> Option<Proximity> {
        self.ctx.lock().proximity
    }

    pub fn current_route(&self) -> Option<RouteQuote> {
        self.ctx.lock().route.clone()
    }

    pub fn eta(&self) -> Option<EtaEstimate> {
        self.ctx.lock().eta.clone()
    }
}

impl Drop for DeliveryTrackingSession {
    fn drop(&mut self) {
        self.stop();
    }
}
