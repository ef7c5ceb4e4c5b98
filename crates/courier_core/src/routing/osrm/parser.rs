use super::instruction::describe_maneuver;
use super::response::{OsrmRoute, OsrmRouteResponse};
use crate::geo::Coordinate;
use crate::routing::{RouteFetchError, RouteResult, RouteStep};

fn finite_non_negative(value: f64, what: &str) -> Result<f64, RouteFetchError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(RouteFetchError::Malformed(format!("invalid {what}: {value}")))
    }
}

pub(super) fn parse_route_response(
    resp: OsrmRouteResponse,
) -> Result<RouteResult, RouteFetchError> {
    if resp.code != "Ok" {
        return Err(RouteFetchError::Api(match resp.message {
            Some(message) => format!("{}: {}", resp.code, message),
            None => resp.code,
        }));
    }

    let route = resp
        .routes
        .and_then(|routes| routes.into_iter().next())
        .ok_or_else(|| RouteFetchError::Malformed("no routes in response".to_string()))?;

    parse_route(route)
}

fn parse_route(route: OsrmRoute) -> Result<RouteResult, RouteFetchError> {
    let distance_m = finite_non_negative(route.distance, "distance")?;
    let duration_s = finite_non_negative(route.duration, "duration")?;

    // OSRM returns [lng, lat], we store lat/lng
    let polyline = route
        .geometry
        .coordinates
        .into_iter()
        .map(|pair| {
            let coordinate = Coordinate::from_lng_lat(pair);
            coordinate
                .validate()
                .map(|_| coordinate)
                .map_err(|err| RouteFetchError::Malformed(err.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if polyline.len() < 2 {
        return Err(RouteFetchError::Malformed(
            "route geometry has fewer than two points".to_string(),
        ));
    }

    let steps = route
        .legs
        .into_iter()
        .flat_map(|leg| leg.steps)
        .map(|step| RouteStep {
            instruction: describe_maneuver(
                &step.maneuver.kind,
                step.maneuver.modifier.as_deref(),
                step.maneuver.exit,
            ),
            distance_m: if step.distance.is_finite() {
                step.distance.max(0.0)
            } else {
                0.0
            },
            coordinate: step
                .maneuver
                .location
                .map(Coordinate::from_lng_lat)
                .filter(Coordinate::is_valid),
        })
        .collect();

    Ok(RouteResult {
        polyline,
        distance_km: distance_m / 1000.0,
        duration_minutes: duration_s / 60.0,
        steps,
    })
}
