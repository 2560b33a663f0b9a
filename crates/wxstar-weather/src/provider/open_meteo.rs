//! Open-Meteo client (global coverage).
//!
//! The forecast endpoint is mandatory. Air quality is always requested and
//! marine data only when the marine forecast setting is on; both are
//! optional and omitted if their requests fail.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;
use wxstar_core::{ProvidersConfig, RefreshConfig, SettingsHandle};

use super::{build_http_client, handle_response, RawProviderResult, WeatherSource};
use crate::error::UpstreamError;
use crate::types::{Coordinate, ProviderId};

const CURRENT_VARS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m,wind_direction_10m,pressure_msl";
const HOURLY_VARS: &str = "temperature_2m,weather_code,precipitation_probability,wind_speed_10m";
const DAILY_VARS: &str = "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max,sunrise,sunset";
const MARINE_DAILY_VARS: &str = "wave_height_max,wave_direction_dominant,wave_period_max";
const AIR_QUALITY_VARS: &str = "us_aqi,pm10,pm2_5";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ForecastResponse {
    pub(crate) utc_offset_seconds: i32,
    pub(crate) timezone: Option<String>,
    pub(crate) current: Option<CurrentBlock>,
    pub(crate) hourly: Option<HourlyBlock>,
    pub(crate) daily: Option<DailyBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CurrentBlock {
    pub(crate) time: Option<String>,
    pub(crate) temperature_2m: Option<f64>,
    pub(crate) relative_humidity_2m: Option<f64>,
    pub(crate) apparent_temperature: Option<f64>,
    pub(crate) weather_code: Option<i32>,
    pub(crate) wind_speed_10m: Option<f64>,
    pub(crate) wind_direction_10m: Option<f64>,
    pub(crate) pressure_msl: Option<f64>,
}

/// Column-oriented hourly series; `time[i]` pairs with every other `[i]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct HourlyBlock {
    pub(crate) time: Vec<String>,
    pub(crate) temperature_2m: Vec<Option<f64>>,
    pub(crate) weather_code: Vec<Option<i32>>,
    pub(crate) precipitation_probability: Vec<Option<f64>>,
    pub(crate) wind_speed_10m: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DailyBlock {
    pub(crate) time: Vec<String>,
    pub(crate) weather_code: Vec<Option<i32>>,
    pub(crate) temperature_2m_max: Vec<Option<f64>>,
    pub(crate) temperature_2m_min: Vec<Option<f64>>,
    pub(crate) precipitation_probability_max: Vec<Option<f64>>,
    pub(crate) sunrise: Vec<Option<String>>,
    pub(crate) sunset: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MarineResponse {
    pub(crate) daily: Option<MarineDailyBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MarineDailyBlock {
    pub(crate) time: Vec<String>,
    pub(crate) wave_height_max: Vec<Option<f64>>,
    pub(crate) wave_direction_dominant: Vec<Option<f64>>,
    pub(crate) wave_period_max: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AirQualityResponse {
    pub(crate) current: Option<AirQualityBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AirQualityBlock {
    pub(crate) us_aqi: Option<f64>,
    pub(crate) pm10: Option<f64>,
    pub(crate) pm2_5: Option<f64>,
}

/// Everything one Open-Meteo fetch produced.
#[derive(Debug, Clone)]
pub struct OpenMeteoPayload {
    pub(crate) forecast: ForecastResponse,
    pub(crate) marine: Option<MarineResponse>,
    pub(crate) air_quality: Option<AirQualityResponse>,
}

impl OpenMeteoPayload {
    /// Build a payload from already-fetched JSON documents.
    pub fn from_json(
        forecast: serde_json::Value,
        marine: Option<serde_json::Value>,
        air_quality: Option<serde_json::Value>,
    ) -> Result<Self, UpstreamError> {
        fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, UpstreamError> {
            serde_json::from_value(value).map_err(|e| UpstreamError::Malformed(e.to_string()))
        }

        Ok(Self {
            forecast: decode(forecast)?,
            marine: marine.map(decode).transpose()?,
            air_quality: air_quality.map(decode).transpose()?,
        })
    }

    pub fn timezone(&self) -> Option<&str> {
        self.forecast.timezone.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    forecast_url: String,
    marine_url: String,
    air_quality_url: String,
    settings: Option<SettingsHandle>,
}

impl OpenMeteoClient {
    pub fn new(providers: &ProvidersConfig, refresh: &RefreshConfig) -> Result<Self, UpstreamError> {
        let client = build_http_client(
            &providers.user_agent,
            Duration::from_secs(refresh.timeout_secs),
        )?;
        Ok(Self {
            client,
            forecast_url: providers.open_meteo_base_url.trim_end_matches('/').to_string(),
            marine_url: providers.open_meteo_marine_url.trim_end_matches('/').to_string(),
            air_quality_url: providers
                .open_meteo_air_quality_url
                .trim_end_matches('/')
                .to_string(),
            settings: None,
        })
    }

    /// Point all three endpoints at one base URL.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = build_http_client(concat!("WxStar/", env!("CARGO_PKG_VERSION")), timeout)?;
        let base = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            forecast_url: base.clone(),
            marine_url: base.clone(),
            air_quality_url: base,
            settings: None,
        })
    }

    /// Read the marine toggle from published settings on every fetch.
    pub fn with_settings(mut self, settings: SettingsHandle) -> Self {
        self.settings = Some(settings);
        self
    }

    fn marine_enabled(&self) -> bool {
        self.settings
            .as_ref()
            .is_some_and(|s| s.snapshot().marine_forecast_enabled)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let response = self.client.get(url).query(query).send().await?;
        handle_response(response).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn forecast(&self, coordinate: &Coordinate) -> Result<ForecastResponse, UpstreamError> {
        let query = [
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            ("current", CURRENT_VARS.to_string()),
            ("hourly", HOURLY_VARS.to_string()),
            ("daily", DAILY_VARS.to_string()),
            ("temperature_unit", "celsius".to_string()),
            ("wind_speed_unit", "kmh".to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", "7".to_string()),
        ];
        self.get(&format!("{}/v1/forecast", self.forecast_url), &query)
            .await
    }

    async fn marine(&self, coordinate: &Coordinate) -> Result<MarineResponse, UpstreamError> {
        let query = [
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            ("daily", MARINE_DAILY_VARS.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", "7".to_string()),
        ];
        self.get(&format!("{}/v1/marine", self.marine_url), &query)
            .await
    }

    async fn air_quality(
        &self,
        coordinate: &Coordinate,
    ) -> Result<AirQualityResponse, UpstreamError> {
        let query = [
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            ("current", AIR_QUALITY_VARS.to_string()),
            ("timezone", "auto".to_string()),
        ];
        self.get(&format!("{}/v1/air-quality", self.air_quality_url), &query)
            .await
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    #[instrument(skip(self, coordinate), fields(coordinate = %coordinate), level = "info")]
    async fn fetch(&self, coordinate: &Coordinate) -> Result<RawProviderResult, UpstreamError> {
        let include_marine = self.marine_enabled();

        let (forecast, air_quality, marine) = tokio::join!(
            self.forecast(coordinate),
            self.air_quality(coordinate),
            async {
                if include_marine {
                    Some(self.marine(coordinate).await)
                } else {
                    None
                }
            },
        );

        let forecast = forecast?;
        let air_quality = match air_quality {
            Ok(aq) => Some(aq),
            Err(e) => {
                tracing::warn!("Open-Meteo air quality unavailable: {}", e);
                None
            }
        };
        let marine = match marine {
            Some(Ok(m)) => Some(m),
            Some(Err(e)) => {
                tracing::warn!("Open-Meteo marine forecast unavailable: {}", e);
                None
            }
            None => None,
        };

        Ok(RawProviderResult::OpenMeteo(Box::new(OpenMeteoPayload {
            forecast,
            marine,
            air_quality,
        })))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wxstar_core::{Settings, SettingsController, SettingsUpdate};

    fn forecast_body() -> serde_json::Value {
        serde_json::json!({
            "utc_offset_seconds": 3600,
            "timezone": "Europe/London",
            "current": {"time": "2024-06-01T14:00", "temperature_2m": 18.4, "weather_code": 2},
            "hourly": {
                "time": ["2024-06-01T14:00", "2024-06-01T15:00"],
                "temperature_2m": [18.4, 18.9],
                "weather_code": [2, 3]
            }
        })
    }

    async fn mount_forecast(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("temperature_unit", "celsius"))
            .and(query_param("wind_speed_unit", "kmh"))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .expect(1)
            .mount(server)
            .await;
    }

    fn unwrap_payload(result: RawProviderResult) -> OpenMeteoPayload {
        match result {
            RawProviderResult::OpenMeteo(p) => *p,
            other => panic!("expected Open-Meteo payload, got {:?}", other.provider()),
        }
    }

    #[tokio::test]
    async fn test_fetch_with_air_quality() {
        let mock_server = MockServer::start().await;
        mount_forecast(&mock_server).await;
        Mock::given(method("GET"))
            .and(path("/v1/air-quality"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": {"us_aqi": 42, "pm10": 12.5, "pm2_5": 6.1}
            })))
            .mount(&mock_server)
            .await;

        let client =
            OpenMeteoClient::with_base_url(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        let london = Coordinate::new(51.5074, -0.1278).unwrap();
        let payload = unwrap_payload(client.fetch(&london).await.unwrap());

        assert_eq!(payload.timezone(), Some("Europe/London"));
        assert_eq!(payload.forecast.utc_offset_seconds, 3600);
        assert!(payload.air_quality.is_some());
        assert!(payload.marine.is_none());
    }

    #[tokio::test]
    async fn test_marine_only_requested_when_enabled() {
        let mock_server = MockServer::start().await;
        mount_forecast(&mock_server).await;
        Mock::given(method("GET"))
            .and(path("/v1/marine"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "daily": {"time": ["2024-06-01"], "wave_height_max": [1.2]}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut controller = SettingsController::new(Settings::default());
        controller
            .apply(&SettingsUpdate {
                marine_forecast_enabled: Some(true),
                ..Default::default()
            })
            .unwrap();
        controller.publish_pending();

        let client = OpenMeteoClient::with_base_url(&mock_server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_settings(controller.handle());
        let london = Coordinate::new(51.5074, -0.1278).unwrap();
        let payload = unwrap_payload(client.fetch(&london).await.unwrap());

        assert!(payload.marine.is_some());
        // Air quality not mounted: omitted, not fatal.
        assert!(payload.air_quality.is_none());
    }

    #[tokio::test]
    async fn test_forecast_failure_is_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client =
            OpenMeteoClient::with_base_url(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        let london = Coordinate::new(51.5074, -0.1278).unwrap();

        assert!(matches!(
            client.fetch(&london).await,
            Err(UpstreamError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(forecast_body())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client =
            OpenMeteoClient::with_base_url(&mock_server.uri(), Duration::from_millis(50)).unwrap();
        let london = Coordinate::new(51.5074, -0.1278).unwrap();

        assert!(matches!(
            client.fetch(&london).await,
            Err(UpstreamError::Network(_))
        ));
    }

    #[test]
    fn test_payload_from_json_rejects_wrong_shape() {
        let result = OpenMeteoPayload::from_json(serde_json::json!({"hourly": 5}), None, None);
        assert!(matches!(result, Err(UpstreamError::Malformed(_))));
    }
}
