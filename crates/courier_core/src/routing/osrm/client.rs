use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::parser::parse_route_response;
use super::response::OsrmRouteResponse;
use crate::geo::Coordinate;
use crate::routing::{RouteFetchError, RouteOptions, RouteProvider, RouteResult};

/// Thin async HTTP client for OSRM route queries.
#[derive(Debug, Clone)]
pub struct OsrmRouteProvider {
    client: Client,
    endpoint: String,
}

impl OsrmRouteProvider {
    pub const NAME: &'static str = "osrm";

    /// Create a provider for the given endpoint (e.g. `http://localhost:5000`).
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RouteFetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(super) fn route_url(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        options: &RouteOptions,
    ) -> Result<Url, RouteFetchError> {
        let base = format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}",
            self.endpoint,
            options.vehicle_profile.osrm_profile(),
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude,
        );
        let mut url = Url::parse(&base)
            .map_err(|err| RouteFetchError::Api(format!("failed to build OSRM URL: {}", err)))?;
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson")
            .append_pair("steps", "true")
            .append_pair("alternatives", "false");
        Ok(url)
    }
}

#[async_trait]
impl RouteProvider for OsrmRouteProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        options: &RouteOptions,
    ) -> Result<RouteResult, RouteFetchError> {
        let url = self.route_url(origin, destination, options)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RouteFetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: OsrmRouteResponse = serde_json::from_slice(&body)
            .map_err(|err| RouteFetchError::Malformed(err.to_string()))?;
        parse_route_response(parsed)
    }
}
