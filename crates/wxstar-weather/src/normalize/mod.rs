//! Provider payload → canonical [`WeatherModel`].
//!
//! This is the only place unit conversion happens. Optional upstream
//! sections that are missing are left empty; only a missing current
//! temperature or an empty hourly series fails normalization.

mod noaa;
mod open_meteo;
pub(crate) mod units;

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::error::NormalizationError;
use crate::provider::RawProviderResult;
use crate::types::{ActiveAlert, AlertSeverity, DailyPoint, HourlyPoint, WeatherModel};

pub const MAX_HOURLY_POINTS: usize = 24;
pub const MAX_DAILY_POINTS: usize = 7;

/// Normalize a provider result as of `now`.
///
/// `now` decides which hourly points are still upcoming and which alerts
/// have already expired.
pub fn normalize(
    raw: &RawProviderResult,
    now: DateTime<Utc>,
) -> Result<WeatherModel, NormalizationError> {
    let model = match raw {
        RawProviderResult::Noaa(payload) => noaa::normalize(payload, now)?,
        RawProviderResult::OpenMeteo(payload) => open_meteo::normalize(payload, now)?,
    };
    tracing::debug!(
        provider = %raw.provider(),
        hourly = model.hourly.len(),
        daily = model.daily.len(),
        alerts = model.alerts.len(),
        "Normalized weather model"
    );
    Ok(model)
}

/// Sort, de-duplicate and window hourly points to the current hour onward.
fn finish_hourly(
    mut points: Vec<HourlyPoint>,
    now: DateTime<Utc>,
) -> Result<Vec<HourlyPoint>, NormalizationError> {
    points.sort_by_key(|p| p.time);
    points.dedup_by_key(|p| p.time);
    let hourly: Vec<_> = points
        .into_iter()
        .filter(|p| p.time.with_timezone(&Utc) + Duration::hours(1) > now)
        .take(MAX_HOURLY_POINTS)
        .collect();

    if hourly.is_empty() {
        return Err(NormalizationError::missing("hourly"));
    }
    Ok(hourly)
}

fn finish_daily(mut points: Vec<DailyPoint>) -> Vec<DailyPoint> {
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    points.truncate(MAX_DAILY_POINTS);
    points
}

/// Drop expired and duplicate alerts; most severe first.
fn finish_alerts(alerts: Vec<ActiveAlert>, now: DateTime<Utc>) -> Vec<ActiveAlert> {
    let mut seen = HashSet::new();
    let mut kept: Vec<_> = alerts
        .into_iter()
        .filter(|a| !a.is_expired(now))
        .filter(|a| seen.insert(a.id.clone()))
        .collect();
    kept.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then(a.effective_from.cmp(&b.effective_from))
    });
    kept
}

fn is_displayed_severity(severity: AlertSeverity) -> bool {
    matches!(
        severity,
        AlertSeverity::Extreme | AlertSeverity::Severe | AlertSeverity::Moderate
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::provider::OpenMeteoPayload;
    use crate::types::WeatherCondition;
    use chrono::{FixedOffset, NaiveDateTime, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap()
    }

    fn point(hours_from_noon: i64) -> HourlyPoint {
        let offset = FixedOffset::east_opt(0).unwrap();
        HourlyPoint {
            time: (Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
                + Duration::hours(hours_from_noon))
            .with_timezone(&offset),
            temperature: 20.0,
            condition: WeatherCondition::Clear,
            precipitation_chance: None,
            wind_speed: None,
        }
    }

    #[test]
    fn test_hourly_keeps_current_hour_and_caps_at_24() {
        let points: Vec<_> = (-3..40).rev().map(point).collect();
        let hourly = finish_hourly(points, now()).unwrap();

        assert_eq!(hourly.len(), MAX_HOURLY_POINTS);
        assert_eq!(hourly[0].time, point(0).time);
        assert!(hourly.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_hourly_all_in_past_is_missing() {
        let points = vec![point(-5), point(-2)];
        let err = finish_hourly(points, now()).unwrap_err();
        assert_eq!(err.missing_field, "hourly");
    }

    fn hour_label(h: u32) -> String {
        let base = NaiveDateTime::parse_from_str("2024-06-01T00:00", "%Y-%m-%dT%H:%M").unwrap();
        (base + Duration::hours(i64::from(h)))
            .format("%Y-%m-%dT%H:%M")
            .to_string()
    }

    proptest! {
        #[test]
        fn prop_open_meteo_hourly_is_ordered_and_unique(
            hours in proptest::collection::vec(12u32..200, 1..60),
            temp in -40.0f64..50.0,
        ) {
            let times: Vec<String> = hours.iter().map(|h| hour_label(*h)).collect();
            let temps: Vec<f64> = hours.iter().map(|_| temp).collect();
            let raw = RawProviderResult::OpenMeteo(Box::new(
                OpenMeteoPayload::from_json(
                    serde_json::json!({
                        "utc_offset_seconds": 0,
                        "current": {"time": "2024-06-01T12:00", "temperature_2m": temp},
                        "hourly": {"time": times, "temperature_2m": temps}
                    }),
                    None,
                    None,
                )
                .unwrap(),
            ));

            let model = normalize(&raw, now()).unwrap();
            prop_assert!(!model.hourly.is_empty());
            prop_assert!(model.hourly.len() <= MAX_HOURLY_POINTS);
            prop_assert!(model.hourly.windows(2).all(|w| w[0].time < w[1].time));
            prop_assert!(model.daily.windows(2).all(|w| w[0].date < w[1].date));
        }

        #[test]
        fn prop_missing_current_temperature_always_fails(
            hours in proptest::collection::vec(12u32..200, 0..30),
        ) {
            let times: Vec<String> = hours.iter().map(|h| hour_label(*h)).collect();
            let temps: Vec<f64> = hours.iter().map(|_| 10.0).collect();
            let raw = RawProviderResult::OpenMeteo(Box::new(
                OpenMeteoPayload::from_json(
                    serde_json::json!({
                        "utc_offset_seconds": 0,
                        "current": {"time": "2024-06-01T12:00"},
                        "hourly": {"time": times, "temperature_2m": temps}
                    }),
                    None,
                    None,
                )
                .unwrap(),
            ));

            let err = normalize(&raw, now()).unwrap_err();
            prop_assert_eq!(err.missing_field, "current.temperature");
        }
    }
}
