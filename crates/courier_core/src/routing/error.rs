use thiserror::Error;

/// Failure of a single route provider. Recovered by the next link of the
/// fallback chain, never surfaced to callers of the quote service.
#[derive(Debug, Error)]
pub enum RouteFetchError {
    #[cfg(feature = "osrm")]
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("provider rejected the request: {0}")]
    Api(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("provider did not answer in time")]
    Timeout,
}
