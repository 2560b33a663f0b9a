//! National Weather Service (api.weather.gov) client.
//!
//! A fetch walks the NWS resource graph: point metadata, then the grid's
//! observation stations, then the latest observation and gridpoint
//! forecasts. Daily forecast, alerts and neighbouring stations are optional
//! and dropped with a warning if their requests fail.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;
use wxstar_core::{ProvidersConfig, RefreshConfig};

use super::{build_http_client, handle_response, RawProviderResult, WeatherSource};
use crate::coverage;
use crate::error::UpstreamError;
use crate::types::{Coordinate, ProviderId};

const MAX_REGIONAL_STATIONS: usize = 4;

#[derive(Debug, Clone, Deserialize)]
struct PointResponse {
    properties: PointProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PointProperties {
    pub(crate) grid_id: String,
    pub(crate) grid_x: i64,
    pub(crate) grid_y: i64,
    #[serde(default)]
    pub(crate) relative_location: Option<RelativeLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RelativeLocation {
    pub(crate) properties: RelativeLocationProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RelativeLocationProperties {
    pub(crate) city: Option<String>,
    pub(crate) state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StationCollection {
    #[serde(default)]
    features: Vec<StationFeature>,
}

#[derive(Debug, Clone, Deserialize)]
struct StationFeature {
    properties: StationProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StationProperties {
    pub(crate) station_identifier: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ObservationResponse {
    properties: Observation,
}

/// A measured value with its WMO unit code, e.g. `wmoUnit:degC`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Quantity {
    pub(crate) value: Option<f64>,
    #[serde(default)]
    pub(crate) unit_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Observation {
    pub(crate) timestamp: Option<DateTime<FixedOffset>>,
    pub(crate) text_description: Option<String>,
    pub(crate) icon: Option<String>,
    pub(crate) temperature: Quantity,
    pub(crate) relative_humidity: Quantity,
    pub(crate) wind_speed: Quantity,
    pub(crate) wind_direction: Quantity,
    pub(crate) barometric_pressure: Quantity,
    pub(crate) heat_index: Quantity,
    pub(crate) wind_chill: Quantity,
}

#[derive(Debug, Clone, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Clone, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForecastPeriod {
    pub(crate) start_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub(crate) is_daytime: bool,
    #[serde(default)]
    pub(crate) temperature: Option<f64>,
    #[serde(default)]
    pub(crate) temperature_unit: Option<String>,
    #[serde(default)]
    pub(crate) probability_of_precipitation: Option<Quantity>,
    #[serde(default)]
    pub(crate) wind_speed: Option<String>,
    #[serde(default)]
    pub(crate) icon: Option<String>,
    #[serde(default)]
    pub(crate) short_forecast: Option<String>,
    #[serde(default)]
    pub(crate) detailed_forecast: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AlertCollection {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Debug, Clone, Deserialize)]
struct AlertFeature {
    properties: AlertProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AlertProperties {
    pub(crate) id: String,
    pub(crate) event: String,
    #[serde(default)]
    pub(crate) severity: Option<String>,
    #[serde(default)]
    pub(crate) urgency: Option<String>,
    #[serde(default)]
    pub(crate) headline: Option<String>,
    #[serde(default)]
    pub(crate) effective: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub(crate) onset: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub(crate) expires: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub(crate) ends: Option<DateTime<FixedOffset>>,
}

/// Everything one NWS fetch produced.
#[derive(Debug, Clone)]
pub struct NoaaPayload {
    pub(crate) point: PointProperties,
    pub(crate) station: StationProperties,
    pub(crate) observation: Observation,
    pub(crate) hourly: Vec<ForecastPeriod>,
    pub(crate) daily: Option<Vec<ForecastPeriod>>,
    pub(crate) alerts: Option<Vec<AlertProperties>>,
    pub(crate) regional: Vec<(StationProperties, Observation)>,
}

impl NoaaPayload {
    pub fn station_id(&self) -> &str {
        &self.station.station_identifier
    }
}

/// Pick the primary observation station and the regional neighbours.
///
/// Four-letter ICAO identifiers that do not start with `U` or `C` are
/// preferred for the primary station.
pub(crate) fn select_stations(
    stations: &[StationProperties],
) -> Option<(StationProperties, Vec<StationProperties>)> {
    let primary_index = stations
        .iter()
        .position(|s| {
            let id = &s.station_identifier;
            id.len() == 4 && !id.starts_with(['U', 'C'])
        })
        .or_else(|| (!stations.is_empty()).then_some(0))?;

    let primary = stations.get(primary_index)?.clone();
    let neighbours = stations
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != primary_index)
        .map(|(_, s)| s.clone())
        .take(MAX_REGIONAL_STATIONS)
        .collect();
    Some((primary, neighbours))
}

fn optional<T>(what: &str, result: Result<T, UpstreamError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("NWS {} unavailable: {}", what, e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoaaClient {
    client: Client,
    base_url: String,
}

impl NoaaClient {
    pub fn new(providers: &ProvidersConfig, refresh: &RefreshConfig) -> Result<Self, UpstreamError> {
        let client = build_http_client(
            &providers.user_agent,
            Duration::from_secs(refresh.timeout_secs),
        )?;
        Ok(Self {
            client,
            base_url: providers.nws_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = build_http_client(concat!("WxStar/", env!("CARGO_PKG_VERSION")), timeout)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/geo+json")
            .send()
            .await?;
        handle_response(response).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn point(&self, coordinate: &Coordinate) -> Result<PointProperties, UpstreamError> {
        let url = format!("{}/points/{}", self.base_url, coordinate);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/geo+json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(UpstreamError::GeographicallyUnsupported(coordinate.to_string()));
        }

        let point: PointResponse = handle_response(response).await?;
        tracing::debug!(
            office = %point.properties.grid_id,
            x = point.properties.grid_x,
            y = point.properties.grid_y,
            "Resolved NWS grid"
        );
        Ok(point.properties)
    }

    async fn stations(&self, point: &PointProperties) -> Result<Vec<StationProperties>, UpstreamError> {
        let collection: StationCollection = self
            .get(&format!(
                "/gridpoints/{}/{},{}/stations",
                point.grid_id, point.grid_x, point.grid_y
            ))
            .await?;
        tracing::debug!("Got {} stations", collection.features.len());
        Ok(collection
            .features
            .into_iter()
            .map(|f| f.properties)
            .collect())
    }

    async fn latest_observation(&self, station_id: &str) -> Result<Observation, UpstreamError> {
        let response: ObservationResponse = self
            .get(&format!("/stations/{}/observations/latest", station_id))
            .await?;
        Ok(response.properties)
    }

    async fn forecast(
        &self,
        point: &PointProperties,
        hourly: bool,
    ) -> Result<Vec<ForecastPeriod>, UpstreamError> {
        let suffix = if hourly { "/hourly" } else { "" };
        let response: ForecastResponse = self
            .get(&format!(
                "/gridpoints/{}/{},{}/forecast{}?units=us",
                point.grid_id, point.grid_x, point.grid_y, suffix
            ))
            .await?;
        Ok(response.properties.periods)
    }

    async fn alerts(&self, coordinate: &Coordinate) -> Result<Vec<AlertProperties>, UpstreamError> {
        let collection: AlertCollection = self
            .get(&format!("/alerts/active?point={}", coordinate))
            .await?;
        Ok(collection
            .features
            .into_iter()
            .map(|f| f.properties)
            .collect())
    }

    async fn regional(
        &self,
        neighbours: &[StationProperties],
    ) -> Vec<(StationProperties, Observation)> {
        let mut snapshots = Vec::with_capacity(neighbours.len());
        for station in neighbours {
            let result = self.latest_observation(&station.station_identifier).await;
            if let Some(obs) = optional("regional observation", result) {
                snapshots.push((station.clone(), obs));
            }
        }
        snapshots
    }
}

#[async_trait]
impl WeatherSource for NoaaClient {
    fn id(&self) -> ProviderId {
        ProviderId::Noaa
    }

    #[instrument(skip(self, coordinate), fields(coordinate = %coordinate), level = "info")]
    async fn fetch(&self, coordinate: &Coordinate) -> Result<RawProviderResult, UpstreamError> {
        if !coverage::nws_covers(coordinate) {
            return Err(UpstreamError::GeographicallyUnsupported(coordinate.to_string()));
        }

        let point = self.point(coordinate).await?;
        let stations = self.stations(&point).await?;
        let (station, neighbours) = select_stations(&stations)
            .ok_or_else(|| UpstreamError::Malformed("grid has no observation stations".into()))?;
        tracing::info!(station = %station.station_identifier, "Selected observation station");

        let (observation, hourly, daily, alerts) = tokio::join!(
            self.latest_observation(&station.station_identifier),
            self.forecast(&point, true),
            self.forecast(&point, false),
            self.alerts(coordinate),
        );
        let observation = observation?;
        let hourly = hourly?;
        let daily = optional("daily forecast", daily);
        let alerts = optional("alerts", alerts);
        let regional = self.regional(&neighbours).await;

        Ok(RawProviderResult::Noaa(Box::new(NoaaPayload {
            point,
            station,
            observation,
            hourly,
            daily,
            alerts,
            regional,
        })))
    }
}
