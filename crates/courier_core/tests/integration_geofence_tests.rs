use courier_core::geo::{calculate_distance, Coordinate};
use courier_core::geofence::{
    classify_proximity, is_within_geofence, GeofenceZone, OrderZones, Proximity,
};
use courier_core::test_helpers::{north_of, CASABLANCA, RABAT};

#[test]
fn boundary_is_inclusive() {
    let point = north_of(CASABLANCA, 100.0);
    let exact_m = calculate_distance(point, CASABLANCA).unwrap() * 1000.0;

    let on_boundary = GeofenceZone::new(CASABLANCA, exact_m).unwrap();
    assert!(is_within_geofence(point, &on_boundary));

    let slightly_smaller = GeofenceZone::new(CASABLANCA, exact_m - 1e-6).unwrap();
    assert!(!is_within_geofence(point, &slightly_smaller));
}

#[test]
fn point_beyond_radius_is_outside() {
    let zone = GeofenceZone::new(CASABLANCA, 100.0).unwrap();
    assert!(is_within_geofence(north_of(CASABLANCA, 99.0), &zone));
    assert!(!is_within_geofence(north_of(CASABLANCA, 101.0), &zone));
}

#[test]
fn center_of_pickup_zone_is_at_pickup() {
    let pickup = GeofenceZone::new(CASABLANCA, 100.0).unwrap();
    let delivery = GeofenceZone::new(RABAT, 100.0).unwrap();
    assert_eq!(
        classify_proximity(CASABLANCA, Some(&pickup), Some(&delivery)),
        Proximity::AtPickup
    );
}

#[test]
fn overlapping_zones_prefer_pickup() {
    let pickup = GeofenceZone::new(CASABLANCA, 500.0).unwrap();
    let delivery = GeofenceZone::new(north_of(CASABLANCA, 200.0), 500.0).unwrap();
    let between = north_of(CASABLANCA, 100.0);
    assert!(pickup.contains(between) && delivery.contains(between));
    assert_eq!(
        classify_proximity(between, Some(&pickup), Some(&delivery)),
        Proximity::AtPickup
    );
}

#[test]
fn delivery_zone_and_transit() {
    let zones = OrderZones::around(Some(CASABLANCA), Some(RABAT), 100.0).unwrap();
    assert_eq!(zones.classify(north_of(RABAT, 50.0)), Proximity::AtDelivery);
    assert_eq!(zones.classify(Coordinate::new(33.7, -7.2)), Proximity::InTransit);
}

#[test]
fn missing_zones_mean_in_transit() {
    assert_eq!(classify_proximity(CASABLANCA, None, None), Proximity::InTransit);
    let delivery = GeofenceZone::new(CASABLANCA, 100.0).unwrap();
    assert_eq!(
        classify_proximity(CASABLANCA, None, Some(&delivery)),
        Proximity::AtDelivery
    );
}

#[test]
fn invalid_zone_center_is_rejected() {
    assert!(OrderZones::around(Some(Coordinate::new(95.0, 0.0)), None, 100.0).is_err());
}
