use serde::Deserialize;

#[derive(Deserialize)]
pub(super) struct OsrmRouteResponse {
    pub(super) code: String,
    #[serde(default)]
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
pub(super) struct OsrmRoute {
    pub(super) distance: f64, // metres
    pub(super) duration: f64, // seconds
    pub(super) geometry: OsrmGeometry,
    #[serde(default)]
    pub(super) legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
pub(super) struct OsrmGeometry {
    pub(super) coordinates: Vec<[f64; 2]>, // [lng, lat]
}

#[derive(Deserialize)]
pub(super) struct OsrmLeg {
    #[serde(default)]
    pub(super) steps: Vec<OsrmStep>,
}

#[derive(Deserialize)]
pub(super) struct OsrmStep {
    pub(super) distance: f64,
    pub(super) maneuver: OsrmManeuver,
}

#[derive(Deserialize)]
pub(super) struct OsrmManeuver {
    #[serde(rename = "type")]
    pub(super) kind: String,
    #[serde(default)]
    pub(super) modifier: Option<String>,
    #[serde(default)]
    pub(super) exit: Option<u32>,
    #[serde(default)]
    pub(super) location: Option<[f64; 2]>,
}
