use async_trait::async_trait;
use thiserror::Error;

use crate::position::PositionSample;

#[derive(Debug, Error)]
pub enum SinkError {
    #[cfg(feature = "backend-sink")]
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned HTTP {0}")]
    Status(u16),
}

/// Receiver of periodic location pushes (the backend's current-location endpoint).
#[async_trait]
pub trait LocationSink: Send + Sync {
    async fn push(&self, sample: &PositionSample) -> Result<(), SinkError>;
}

#[cfg(feature = "backend-sink")]
pub use http::HttpLocationSink;

#[cfg(feature = "backend-sink")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use reqwest::Client;
    use serde::Serialize;

    use super::{LocationSink, SinkError};
    use crate::config::BackendConfig;
    use crate::position::PositionSample;

    /// Body expected by the driver location endpoint.
    #[derive(Serialize)]
    struct LocationPayload {
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        speed: f64,
        heading: f64,
        timestamp: DateTime<Utc>,
    }

    impl From<&PositionSample> for LocationPayload {
        fn from(sample: &PositionSample) -> Self {
            Self {
                latitude: sample.coordinate.latitude,
                longitude: sample.coordinate.longitude,
                accuracy: sample.accuracy_m,
                speed: sample.speed_mps.unwrap_or(0.0),
                heading: sample.heading_deg.unwrap_or(0.0),
                timestamp: sample.captured_at,
            }
        }
    }

    /// POSTs each sample as JSON to the backend.
    #[derive(Debug, Clone)]
    pub struct HttpLocationSink {
        client: Client,
        url: String,
        bearer_token: Option<String>,
    }

    impl HttpLocationSink {
        pub fn new(
            url: impl Into<String>,
            bearer_token: Option<String>,
            timeout: Duration,
        ) -> Result<Self, SinkError> {
            let client = Client::builder().timeout(timeout).build()?;
            Ok(Self {
                client,
                url: url.into(),
                bearer_token,
            })
        }

        /// `None` when the backend has no location URL configured.
        pub fn from_config(config: &BackendConfig) -> Result<Option<Self>, SinkError> {
            config
                .location_url
                .as_ref()
                .map(|url| Self::new(url, config.bearer_token.clone(), config.request_timeout()))
                .transpose()
        }
    }

    #[async_trait]
    impl LocationSink for HttpLocationSink {
        async fn push(&self, sample: &PositionSample) -> Result<(), SinkError> {
            let mut request = self
                .client
                .post(&self.url)
                .json(&LocationPayload::from(sample));
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(SinkError::Status(status.as_u16()))
            }
        }
    }
}
