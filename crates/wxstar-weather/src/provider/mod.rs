//! Upstream weather providers.
//!
//! Each provider implements [`WeatherSource`] and returns its own raw
//! payload wrapped in [`RawProviderResult`]. Payloads are only meaningful
//! to [`crate::normalize`]. Clients never cache.

mod dispatch;
pub mod noaa;
pub mod open_meteo;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::UpstreamError;
use crate::types::{Coordinate, ProviderId};

pub use dispatch::ProviderDispatcher;
pub use noaa::{NoaaClient, NoaaPayload};
pub use open_meteo::{OpenMeteoClient, OpenMeteoPayload};

/// Provider-specific result of a fetch.
#[derive(Debug, Clone)]
pub enum RawProviderResult {
    Noaa(Box<NoaaPayload>),
    OpenMeteo(Box<OpenMeteoPayload>),
}

impl RawProviderResult {
    pub fn provider(&self) -> ProviderId {
        match self {
            RawProviderResult::Noaa(_) => ProviderId::Noaa,
            RawProviderResult::OpenMeteo(_) => ProviderId::OpenMeteo,
        }
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn fetch(&self, coordinate: &Coordinate) -> Result<RawProviderResult, UpstreamError>;
}

pub(crate) fn build_http_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<Client, UpstreamError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| UpstreamError::Network(format!("failed to build HTTP client: {}", e)))
}

/// Map status codes to [`UpstreamError`] and decode a JSON body.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: Response,
) -> Result<T, UpstreamError> {
    let status = response.status();

    if status.is_success() {
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::Malformed(format!("JSON parse error: {}", e)))
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        Err(UpstreamError::RateLimited(retry_after))
    } else {
        let text = response.text().await.unwrap_or_default();
        let snippet: String = text.chars().take(200).collect();
        Err(UpstreamError::Network(format!("{}: {}", status, snippet)))
    }
}
