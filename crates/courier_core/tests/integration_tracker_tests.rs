mod support;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_core::config::TrackerConfig;
use courier_core::position::{LocationError, LocationErrorKind, PositionSample};
use courier_core::test_helpers::{sample_at, RecordingSink, CASABLANCA, RABAT};
use courier_core::tracker::{LocationFeed, LocationSink, LocationTracker, SinkError};

use support::tracking::{channel_listener, next_update, tracker_on, wait_until};

#[tokio::test]
async fn restarting_keeps_a_single_watch() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);

    let first_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&first_calls);
    let first = tracker.start_tracking(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let (callback, mut updates) = channel_listener();
    let second = tracker.start_tracking(callback);

    assert_eq!(feed.active_watches(), 1);
    assert!(!first.is_active());
    assert!(second.is_active());

    feed.publish(sample_at(CASABLANCA));
    let update = next_update(&mut updates).await.unwrap();
    assert_eq!(update.coordinate, CASABLANCA);
    assert_eq!(first_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stop_is_idempotent_and_silences_listeners() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);
    let (callback, mut updates) = channel_listener();
    tracker.start_tracking(callback);

    feed.publish(sample_at(CASABLANCA));
    next_update(&mut updates).await.unwrap();

    tracker.stop_tracking();
    tracker.stop_tracking();
    assert!(!tracker.is_tracking());
    assert_eq!(feed.active_watches(), 0);

    feed.publish(sample_at(RABAT));
    tokio::task::yield_now().await;
    assert!(updates.try_recv().is_err());
    assert_eq!(tracker.latest_sample().unwrap().coordinate, CASABLANCA);
}

#[tokio::test]
async fn stop_from_inside_a_callback() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);
    let stop = tracker.stop_handle();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    tracker.start_tracking(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        stop.stop();
    });
    let (later, mut later_updates) = channel_listener();
    tracker.add_listener(later).unwrap();

    feed.publish(sample_at(CASABLANCA));
    wait_until(|| !tracker.is_tracking()).await;

    feed.publish(sample_at(RABAT));
    tokio::task::yield_now().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(later_updates.try_recv().is_err());
    assert_eq!(feed.active_watches(), 0);
}

#[tokio::test]
async fn errors_are_reported_and_tracking_continues() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);
    let (callback, mut updates) = channel_listener();
    tracker.start_tracking(callback);

    feed.fail(LocationError::unavailable("signal lost"));
    let err = next_update(&mut updates).await.unwrap_err();
    assert_eq!(err.kind, LocationErrorKind::Unavailable);
    assert_eq!(tracker.last_error().map(|e| e.kind), Some(LocationErrorKind::Unavailable));
    assert!(tracker.is_tracking());

    feed.publish(sample_at(RABAT));
    assert!(next_update(&mut updates).await.is_ok());
    assert!(tracker.last_error().is_none());
}

#[tokio::test]
async fn unsubscribed_listener_stops_receiving() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);
    let (main, mut main_updates) = channel_listener();
    let (extra, mut extra_updates) = channel_listener();
    tracker.start_tracking(main);
    let extra = tracker.add_listener(extra).unwrap();

    assert!(extra.unsubscribe());
    feed.publish(sample_at(CASABLANCA));
    next_update(&mut main_updates).await.unwrap();
    assert!(extra_updates.try_recv().is_err());
}

#[tokio::test]
async fn add_listener_requires_a_running_session() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);
    assert!(tracker.add_listener(|_| {}).is_none());
}

#[tokio::test]
async fn dropping_the_tracker_clears_the_watch() {
    let feed = LocationFeed::new();
    {
        let tracker = tracker_on(&feed);
        tracker.start_tracking(|_| {});
        assert_eq!(feed.active_watches(), 1);
    }
    assert_eq!(feed.active_watches(), 0);
}

#[tokio::test]
async fn current_position_reports_permission_denied() {
    let feed = LocationFeed::new();
    feed.deny_permission();
    let tracker = tracker_on(&feed);

    let err = tokio::time::timeout(Duration::from_secs(1), tracker.get_current_position())
        .await
        .expect("denied request resolves immediately")
        .unwrap_err();
    assert_eq!(err.kind, LocationErrorKind::PermissionDenied);
    assert_eq!(tracker.last_error().map(|e| e.kind), Some(LocationErrorKind::PermissionDenied));
}

#[tokio::test(start_paused = true)]
async fn current_position_times_out() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);

    let err = tracker.get_current_position().await.unwrap_err();
    assert_eq!(err.kind, LocationErrorKind::Timeout);
}

#[tokio::test]
async fn current_position_answers_from_a_fresh_fix() {
    let feed = LocationFeed::new();
    feed.publish(sample_at(RABAT));
    let tracker = tracker_on(&feed);

    let sample = tracker.get_current_position().await.unwrap();
    assert_eq!(sample.coordinate, RABAT);
    assert_eq!(tracker.latest_sample().unwrap().coordinate, RABAT);
}

#[tokio::test]
async fn late_fix_resolves_pending_request() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);

    let publisher = feed.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        publisher.publish(sample_at(CASABLANCA));
    });
    let sample = tracker.get_current_position().await.unwrap();
    assert_eq!(sample.coordinate, CASABLANCA);
}

#[tokio::test(start_paused = true)]
async fn latest_sample_is_pushed_until_stopped() {
    let feed = LocationFeed::new();
    let sink = RecordingSink::default();
    let tracker = LocationTracker::with_sink(
        Arc::new(feed.clone()),
        Arc::new(sink.clone()),
        TrackerConfig {
            push_interval_secs: Some(30),
            ..TrackerConfig::default()
        },
    );
    let (callback, mut updates) = channel_listener();
    tracker.start_tracking(callback);

    feed.publish(sample_at(CASABLANCA));
    next_update(&mut updates).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;
    let pushed = sink.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].coordinate, CASABLANCA);

    tracker.stop_tracking();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(sink.pushed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn nothing_is_pushed_without_a_fix() {
    let feed = LocationFeed::new();
    let sink = RecordingSink::default();
    let tracker = LocationTracker::with_sink(
        Arc::new(feed.clone()),
        Arc::new(sink.clone()),
        TrackerConfig::default(),
    );
    tracker.start_tracking(|_| {});

    tokio::time::sleep(Duration::from_secs(95)).await;
    assert!(sink.pushed().is_empty());
}

/// Sink that rejects every push with a server error.
#[derive(Clone, Default)]
struct RejectingSink {
    attempts: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl LocationSink for RejectingSink {
    async fn push(&self, _sample: &PositionSample) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Status(500))
    }
}

#[tokio::test(start_paused = true)]
async fn rejected_pushes_do_not_stop_tracking() {
    let feed = LocationFeed::new();
    let sink = RejectingSink::default();
    let tracker = LocationTracker::with_sink(
        Arc::new(feed.clone()),
        Arc::new(sink.clone()),
        TrackerConfig::default(),
    );
    let (callback, mut updates) = channel_listener();
    tracker.start_tracking(callback);

    feed.publish(sample_at(CASABLANCA));
    next_update(&mut updates).await.unwrap();
    tokio::time::sleep(Duration::from_secs(65)).await;

    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    assert!(tracker.is_tracking());
    assert_eq!(SinkError::Status(500).to_string(), "backend returned HTTP 500");

    feed.publish(sample_at(RABAT));
    assert_eq!(next_update(&mut updates).await.unwrap().coordinate, RABAT);
}

#[tokio::test(start_paused = true)]
async fn timed_out_requests_are_not_kept_by_the_feed() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);

    for _ in 0..5 {
        let err = tracker.get_current_position().await.unwrap_err();
        assert_eq!(err.kind, LocationErrorKind::Timeout);
        assert!(feed.pending_requests() <= 1);
    }
    assert_eq!(feed.pending_requests(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_waits_for_a_listener_running_elsewhere() {
    let feed = LocationFeed::new();
    let tracker = tracker_on(&feed);

    let entered = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let (entered_flag, finished_flag) = (Arc::clone(&entered), Arc::clone(&finished));
    tracker.start_tracking(move |_| {
        entered_flag.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        finished_flag.store(true, Ordering::SeqCst);
    });

    feed.publish(sample_at(CASABLANCA));
    wait_until(|| entered.load(Ordering::SeqCst)).await;

    tracker.stop_tracking();
    assert!(finished.load(Ordering::SeqCst));
}
