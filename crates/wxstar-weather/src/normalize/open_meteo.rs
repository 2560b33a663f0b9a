use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::units::{percent, round1};
use super::{finish_daily, finish_hourly};
use crate::error::NormalizationError;
use crate::provider::open_meteo::{
    AirQualityResponse, DailyBlock, HourlyBlock, MarineResponse, OpenMeteoPayload,
};
use crate::types::{
    AirQuality, AqiCategory, CurrentConditions, DailyPoint, HourlyPoint, MarineDay,
    MarineForecast, WeatherCondition, WeatherModel,
};

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

pub(super) fn normalize(
    payload: &OpenMeteoPayload,
    now: DateTime<Utc>,
) -> Result<WeatherModel, NormalizationError> {
    let forecast = &payload.forecast;
    let offset = FixedOffset::east_opt(forecast.utc_offset_seconds)
        .ok_or(NormalizationError::missing("utc_offset_seconds"))?;
    let zone = LocalZone::new(offset, forecast.timezone.as_deref());

    let current = forecast
        .current
        .as_ref()
        .ok_or(NormalizationError::missing("current.temperature"))?;
    let temperature = current
        .temperature_2m
        .map(round1)
        .ok_or(NormalizationError::missing("current.temperature"))?;
    let condition = current
        .weather_code
        .map(WeatherCondition::from_wmo_code)
        .unwrap_or_default();

    // Requested in °C, km/h and hPa, so only rounding remains.
    let current = CurrentConditions {
        temperature,
        feels_like: current.apparent_temperature.map(round1),
        humidity: current.relative_humidity_2m.map(round1),
        wind_speed: current.wind_speed_10m.map(round1),
        wind_direction: current.wind_direction_10m.map(round1),
        pressure: current.pressure_msl.map(round1),
        condition,
        description: condition.description().to_string(),
        observed_at: current
            .time
            .as_deref()
            .and_then(|t| zone.parse(t))
            .unwrap_or_else(|| now.with_timezone(&offset)),
    };

    let hourly = finish_hourly(
        forecast
            .hourly
            .as_ref()
            .map(|h| hourly_points(h, &zone))
            .unwrap_or_default(),
        now,
    )?;
    let daily = forecast
        .daily
        .as_ref()
        .map(|d| daily_points(d, &zone))
        .unwrap_or_default();

    Ok(WeatherModel {
        current,
        hourly,
        daily,
        alerts: Vec::new(),
        regional: Vec::new(),
        marine: payload.marine.as_ref().and_then(marine_forecast),
        air_quality: payload.air_quality.as_ref().and_then(air_quality),
        location_label: None,
    })
}

/// Resolves Open-Meteo's local wall-clock strings.
///
/// The response carries one `utc_offset_seconds`, valid only for the
/// current moment. Entries past a DST change are resolved through the IANA
/// zone and then expressed in that same offset, so every timestamp in the
/// model shares one offset and still names the right instant.
struct LocalZone {
    offset: FixedOffset,
    tz: Option<Tz>,
}

impl LocalZone {
    fn new(offset: FixedOffset, timezone: Option<&str>) -> Self {
        let tz = timezone.and_then(|name| match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                tracing::debug!(timezone = name, "Unknown time zone, using fixed offset");
                None
            }
        });
        Self { offset, tz }
    }

    fn parse(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let naive = NaiveDateTime::parse_from_str(raw, LOCAL_TIME_FORMAT).ok()?;
        match self.tz {
            // Times skipped by a spring-forward gap have no instant
            Some(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&self.offset)),
            None => self.offset.from_local_datetime(&naive).single(),
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn column<T: Copy>(values: &[Option<T>], index: usize) -> Option<T> {
    values.get(index).copied().flatten()
}

fn hourly_points(block: &HourlyBlock, zone: &LocalZone) -> Vec<HourlyPoint> {
    block
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let time = zone.parse(raw)?;
            let temperature = column(&block.temperature_2m, i)?;
            Some(HourlyPoint {
                time,
                temperature: round1(temperature),
                condition: column(&block.weather_code, i)
                    .map(WeatherCondition::from_wmo_code)
                    .unwrap_or_default(),
                precipitation_chance: column(&block.precipitation_probability, i).map(percent),
                wind_speed: column(&block.wind_speed_10m, i).map(round1),
            })
        })
        .collect()
}

fn daily_points(block: &DailyBlock, zone: &LocalZone) -> Vec<DailyPoint> {
    let points = block
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let date = parse_date(raw)?;
            let sun = |values: &[Option<String>]| {
                values
                    .get(i)
                    .and_then(|v| v.as_deref())
                    .and_then(|t| zone.parse(t))
            };
            Some(DailyPoint {
                date,
                high: column(&block.temperature_2m_max, i).map(round1),
                low: column(&block.temperature_2m_min, i).map(round1),
                condition: column(&block.weather_code, i)
                    .map(WeatherCondition::from_wmo_code)
                    .unwrap_or_default(),
                precipitation_chance: column(&block.precipitation_probability_max, i)
                    .map(percent),
                sunrise: sun(&block.sunrise),
                sunset: sun(&block.sunset),
                summary: None,
            })
        })
        .collect();
    finish_daily(points)
}

fn marine_forecast(response: &MarineResponse) -> Option<MarineForecast> {
    let block = response.daily.as_ref()?;
    let mut days: Vec<MarineDay> = block
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            Some(MarineDay {
                date: parse_date(raw)?,
                wave_height: column(&block.wave_height_max, i).map(round1),
                wave_direction: column(&block.wave_direction_dominant, i).map(round1),
                wave_period: column(&block.wave_period_max, i).map(round1),
            })
        })
        .filter(|d| d.wave_height.is_some() || d.wave_period.is_some())
        .collect();
    days.sort_by_key(|d| d.date);
    days.dedup_by_key(|d| d.date);

    if days.is_empty() {
        None
    } else {
        Some(MarineForecast { days })
    }
}

fn air_quality(response: &AirQualityResponse) -> Option<AirQuality> {
    let block = response.current.as_ref()?;
    let aqi = block.us_aqi?.round().clamp(0.0, f64::from(u16::MAX)) as u16;
    Some(AirQuality {
        us_aqi: aqi,
        pm10: block.pm10.map(round1),
        pm2_5: block.pm2_5.map(round1),
        category: AqiCategory::from_us_aqi(aqi),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::normalize::normalize;
    use crate::provider::RawProviderResult;

    fn now() -> DateTime<Utc> {
        // 14:20 local in London (UTC+1)
        Utc.with_ymd_and_hms(2024, 6, 1, 13, 20, 0).unwrap()
    }

    fn forecast() -> serde_json::Value {
        serde_json::json!({
            "utc_offset_seconds": 3600,
            "timezone": "Europe/London",
            "current": {
                "time": "2024-06-01T14:15",
                "temperature_2m": 18.44,
                "relative_humidity_2m": 61,
                "apparent_temperature": 17.9,
                "weather_code": 61,
                "wind_speed_10m": 14.04,
                "wind_direction_10m": 250,
                "pressure_msl": 1012.6
            },
            "hourly": {
                "time": ["2024-06-01T13:00", "2024-06-01T14:00", "2024-06-01T15:00", "2024-06-01T16:00"],
                "temperature_2m": [17.0, 18.4, null, 19.2],
                "weather_code": [3, 61, 61, 2],
                "precipitation_probability": [10, 80, 70, 20]
            },
            "daily": {
                "time": ["2024-06-02", "2024-06-01"],
                "weather_code": [2, 61],
                "temperature_2m_max": [21.0, 19.5],
                "temperature_2m_min": [11.0, 12.25],
                "precipitation_probability_max": [15, 85],
                "sunrise": ["2024-06-02T04:45", "2024-06-01T04:46"],
                "sunset": ["2024-06-02T21:11", null]
            }
        })
    }

    fn model(
        marine: Option<serde_json::Value>,
        air: Option<serde_json::Value>,
    ) -> WeatherModel {
        let payload = OpenMeteoPayload::from_json(forecast(), marine, air).unwrap();
        normalize(&RawProviderResult::OpenMeteo(Box::new(payload)), now()).unwrap()
    }

    #[test]
    fn test_current_conditions() {
        let m = model(None, None);
        assert_eq!(m.current.temperature, 18.4);
        assert_eq!(m.current.condition, WeatherCondition::Rain);
        assert_eq!(m.current.wind_speed, Some(14.0));
        assert_eq!(m.current.humidity, Some(61.0));
        assert_eq!(m.current.observed_at.to_rfc3339(), "2024-06-01T14:15:00+01:00");
    }

    #[test]
    fn test_hourly_starts_at_current_hour_and_skips_gaps() {
        let m = model(None, None);
        let times: Vec<String> = m
            .hourly
            .iter()
            .map(|h| h.time.format("%H:%M").to_string())
            .collect();
        assert_eq!(times, vec!["14:00", "16:00"]);
        assert_eq!(m.hourly[0].precipitation_chance, Some(80));
    }

    #[test]
    fn test_daily_sorted_with_sun_times() {
        let m = model(None, None);
        assert_eq!(m.daily.len(), 2);
        assert!(m.daily[0].date < m.daily[1].date);
        assert_eq!(m.daily[0].low, Some(12.3));
        assert!(m.daily[0].sunrise.is_some());
        assert!(m.daily[0].sunset.is_none());
        assert!(m.has_sun_times());
    }

    #[test]
    fn test_optional_sections() {
        let m = model(
            Some(serde_json::json!({
                "daily": {"time": ["2024-06-01"], "wave_height_max": [1.24], "wave_period_max": [6.5]}
            })),
            Some(serde_json::json!({"current": {"us_aqi": 57, "pm10": 20.1, "pm2_5": 9.96}})),
        );

        let marine = m.marine.unwrap();
        assert_eq!(marine.days[0].wave_height, Some(1.2));
        let aq = m.air_quality.unwrap();
        assert_eq!(aq.us_aqi, 57);
        assert_eq!(aq.category, AqiCategory::Moderate);
        assert_eq!(aq.pm2_5, Some(10.0));
    }

    #[test]
    fn test_empty_marine_is_omitted() {
        let m = model(Some(serde_json::json!({"daily": {"time": ["2024-06-01"]}})), None);
        assert!(m.marine.is_none());
        assert!(m.air_quality.is_none());
    }

    #[test]
    fn test_hourly_across_dst_change_keeps_true_instants() {
        // London leaves BST at 02:00 local on 27 October 2024
        let payload = OpenMeteoPayload::from_json(
            serde_json::json!({
                "utc_offset_seconds": 3600,
                "timezone": "Europe/London",
                "current": {"time": "2024-10-27T00:10", "temperature_2m": 9.0},
                "hourly": {
                    "time": ["2024-10-27T00:00", "2024-10-27T03:00"],
                    "temperature_2m": [9.0, 8.0]
                }
            }),
            None,
            None,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 10, 26, 23, 10, 0).unwrap();
        let m = normalize(&RawProviderResult::OpenMeteo(Box::new(payload)), now).unwrap();

        let instants: Vec<DateTime<Utc>> =
            m.hourly.iter().map(|h| h.time.with_timezone(&Utc)).collect();
        assert_eq!(
            instants,
            vec![
                Utc.with_ymd_and_hms(2024, 10, 26, 23, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 10, 27, 3, 0, 0).unwrap(),
            ]
        );
        assert!(m.hourly.iter().all(|h| h.time.offset().local_minus_utc() == 3600));
    }

    #[test]
    fn test_unknown_timezone_uses_fixed_offset() {
        let zone = LocalZone::new(FixedOffset::east_opt(-18_000).unwrap(), Some("Mars/Olympus"));
        let t = zone.parse("2024-06-01T09:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-06-01T09:00:00-05:00");
    }

    #[test]
    fn test_missing_current_block() {
        let payload = OpenMeteoPayload::from_json(
            serde_json::json!({"hourly": {"time": ["2024-06-01T14:00"], "temperature_2m": [18.0]}}),
            None,
            None,
        )
        .unwrap();
        let err = normalize(&RawProviderResult::OpenMeteo(Box::new(payload)), now()).unwrap_err();
        assert_eq!(err.missing_field, "current.temperature");
    }

    #[test]
    fn test_no_hourly_points() {
        let payload = OpenMeteoPayload::from_json(
            serde_json::json!({"current": {"temperature_2m": 18.0}}),
            None,
            None,
        )
        .unwrap();
        let err = normalize(&RawProviderResult::OpenMeteo(Box::new(payload)), now()).unwrap_err();
        assert_eq!(err.missing_field, "hourly");
    }
}
