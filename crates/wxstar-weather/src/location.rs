//! Where the observer is.
//!
//! A manually configured coordinate always wins. Without one, the resolver
//! asks ipapi.co and then ip-api.com for an IP-based position.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;
use wxstar_core::{ProvidersConfig, RefreshConfig};

use crate::error::LocationError;
use crate::provider::{build_http_client, handle_response};
use crate::types::Coordinate;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub label: Option<String>,
    pub country_code: Option<String>,
}

impl ResolvedLocation {
    pub fn manual(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            label: None,
            country_code: None,
        }
    }

    pub fn is_us(&self) -> bool {
        self.country_code
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case("US"))
    }
}

#[derive(Debug, Deserialize)]
struct IpapiResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
    region: Option<String>,
    country_code: Option<String>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
    region_name: Option<String>,
    country_code: Option<String>,
    message: Option<String>,
}

fn label(city: Option<String>, region: Option<String>) -> Option<String> {
    match (city, region) {
        (Some(city), Some(region)) if !region.is_empty() => Some(format!("{}, {}", city, region)),
        (Some(city), _) => Some(city),
        (None, region) => region,
    }
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    client: Client,
    ipapi_url: String,
    ip_api_url: String,
}

impl LocationResolver {
    pub fn new(providers: &ProvidersConfig, refresh: &RefreshConfig) -> Result<Self, LocationError> {
        Self::with_urls(
            &providers.ipapi_url,
            &providers.ip_api_url,
            &providers.user_agent,
            Duration::from_secs(refresh.timeout_secs),
        )
    }

    pub fn with_urls(
        ipapi_url: &str,
        ip_api_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, LocationError> {
        let client = build_http_client(user_agent, timeout)
            .map_err(|e| LocationError::Lookup(e.to_string()))?;
        Ok(Self {
            client,
            ipapi_url: ipapi_url.to_string(),
            ip_api_url: ip_api_url.to_string(),
        })
    }

    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        manual: Option<Coordinate>,
    ) -> Result<ResolvedLocation, LocationError> {
        if let Some(coordinate) = manual {
            tracing::debug!(%coordinate, "Using manual coordinate");
            return Ok(ResolvedLocation::manual(coordinate));
        }

        match self.lookup_ipapi().await {
            Ok(location) => return Ok(location),
            Err(e) => tracing::warn!("ipapi.co lookup failed: {}", e),
        }
        match self.lookup_ip_api().await {
            Ok(location) => Ok(location),
            Err(e) => {
                tracing::warn!("ip-api.com lookup failed: {}", e);
                Err(LocationError::ServiceUnavailable)
            }
        }
    }

    async fn lookup_ipapi(&self) -> Result<ResolvedLocation, LocationError> {
        let response = self
            .client
            .get(&self.ipapi_url)
            .send()
            .await
            .map_err(|e| LocationError::Lookup(e.to_string()))?;
        let body: IpapiResponse = handle_response(response)
            .await
            .map_err(|e| LocationError::Lookup(e.to_string()))?;

        if body.error {
            return Err(LocationError::Lookup(
                body.reason.unwrap_or_else(|| "ipapi.co error".to_string()),
            ));
        }
        let (Some(latitude), Some(longitude)) = (body.latitude, body.longitude) else {
            return Err(LocationError::Lookup("no coordinate in response".to_string()));
        };

        let location = ResolvedLocation {
            coordinate: Coordinate::new(latitude, longitude)?,
            label: label(body.city, body.region),
            country_code: body.country_code,
        };
        tracing::info!(coordinate = %location.coordinate, label = ?location.label, "Resolved location via ipapi.co");
        Ok(location)
    }

    async fn lookup_ip_api(&self) -> Result<ResolvedLocation, LocationError> {
        let response = self
            .client
            .get(&self.ip_api_url)
            .send()
            .await
            .map_err(|e| LocationError::Lookup(e.to_string()))?;
        let body: IpApiResponse = handle_response(response)
            .await
            .map_err(|e| LocationError::Lookup(e.to_string()))?;

        if body.status != "success" {
            return Err(LocationError::Lookup(
                body.message.unwrap_or_else(|| body.status.clone()),
            ));
        }
        let (Some(latitude), Some(longitude)) = (body.lat, body.lon) else {
            return Err(LocationError::Lookup("no coordinate in response".to_string()));
        };

        let location = ResolvedLocation {
            coordinate: Coordinate::new(latitude, longitude)?,
            label: label(body.city, body.region_name),
            country_code: body.country_code,
        };
        tracing::info!(coordinate = %location.coordinate, label = ?location.label, "Resolved location via ip-api.com");
        Ok(location)
    }
}
