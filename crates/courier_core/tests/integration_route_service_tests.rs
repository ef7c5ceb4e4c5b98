use std::time::Duration;

use courier_core::config::RoutingConfig;
use courier_core::geo::{calculate_distance, Coordinate};
use courier_core::routing::{
    build_route_service, CachedRouteProvider, RouteOptions, RouteProvider, RouteProviderKind,
    RouteQuoteService, RouteScoring,
};
use courier_core::test_helpers::{
    FailingRouteProvider, HangingRouteProvider, StaticRouteProvider, CASABLANCA, RABAT,
};

fn service(providers: Vec<Box<dyn RouteProvider>>) -> RouteQuoteService {
    RouteQuoteService::new(
        providers,
        RouteScoring::default(),
        Duration::from_secs(8),
        40.0,
    )
}

#[tokio::test]
async fn failing_chain_falls_back_to_direct_line() {
    let failing = FailingRouteProvider::default();
    let routes = service(vec![Box::new(failing.clone())]);

    let quote = routes
        .fetch_route(CASABLANCA, RABAT, RouteOptions::default())
        .await
        .unwrap();

    let expected = calculate_distance(CASABLANCA, RABAT).unwrap();
    assert!(quote.fallback);
    assert_eq!(quote.provider, "direct_line");
    assert!((quote.distance_km - expected).abs() < 1e-9);
    assert!((quote.duration_minutes - expected * 1.5).abs() < 1e-9);
    assert_eq!(quote.polyline, vec![CASABLANCA, RABAT]);
    assert!(quote.score <= 100);
    assert_eq!(failing.calls(), 1);
}

#[tokio::test]
async fn providers_are_tried_in_order() {
    let failing = FailingRouteProvider::default();
    let primary = StaticRouteProvider::new("primary", 90.0, 70.0);
    let secondary = StaticRouteProvider::new("secondary", 95.0, 75.0);
    let routes = service(vec![
        Box::new(failing.clone()),
        Box::new(primary.clone()),
        Box::new(secondary.clone()),
    ]);

    let quote = routes
        .fetch_route(CASABLANCA, RABAT, RouteOptions::default())
        .await
        .unwrap();

    assert_eq!(quote.provider, "primary");
    assert!(!quote.fallback);
    assert_eq!(quote.distance_km, 90.0);
    assert_eq!(quote.score, routes.score_route(&quote));
    assert_eq!(failing.calls(), 1);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_provider_times_out_into_fallback() {
    let routes = service(vec![Box::new(HangingRouteProvider)]);

    let quote = routes
        .fetch_route(CASABLANCA, RABAT, RouteOptions::default())
        .await
        .unwrap();

    assert!(quote.fallback);
    assert_eq!(quote.provider, "direct_line");
}

#[tokio::test]
async fn invalid_coordinates_are_rejected() {
    let routes = service(vec![Box::new(FailingRouteProvider::default())]);
    let result = routes
        .fetch_route(Coordinate::new(91.0, 0.0), RABAT, RouteOptions::default())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn cached_provider_reuses_routes() {
    let upstream = StaticRouteProvider::new("static", 90.0, 70.0);
    let cached = CachedRouteProvider::new(Box::new(upstream.clone()), 16, Duration::from_secs(60));
    let options = RouteOptions::default();

    cached.route(CASABLANCA, RABAT, &options).await.unwrap();
    cached.route(CASABLANCA, RABAT, &options).await.unwrap();
    assert_eq!(upstream.calls(), 1);
    assert_eq!(cached.len(), 1);

    // Reverse direction is a different key.
    cached.route(RABAT, CASABLANCA, &options).await.unwrap();
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn cached_provider_does_not_cache_failures() {
    let upstream = FailingRouteProvider::default();
    let cached = CachedRouteProvider::new(Box::new(upstream.clone()), 16, Duration::from_secs(60));
    let options = RouteOptions::default();

    assert!(cached.route(CASABLANCA, RABAT, &options).await.is_err());
    assert!(cached.route(CASABLANCA, RABAT, &options).await.is_err());
    assert_eq!(upstream.calls(), 2);
    assert!(cached.is_empty());
}

#[tokio::test]
async fn direct_line_only_config_builds_working_service() {
    let config = RoutingConfig {
        providers: vec![RouteProviderKind::DirectLine],
        ..RoutingConfig::default()
    };
    let routes = build_route_service(&config);
    assert_eq!(routes.provider_names(), vec!["direct_line"]);

    let quote = routes
        .fetch_route(CASABLANCA, RABAT, RouteOptions::default())
        .await
        .unwrap();
    // Configured direct line succeeds as a regular provider.
    assert!(!quote.fallback);
}
