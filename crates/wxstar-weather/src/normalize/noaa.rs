use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use super::units::{parse_wind_text, percent, pressure_hpa, round1, speed_kmh, temperature_c};
use super::{finish_alerts, finish_daily, finish_hourly, is_displayed_severity};
use crate::error::NormalizationError;
use crate::provider::noaa::{
    AlertProperties, ForecastPeriod, NoaaPayload, Observation, Quantity, StationProperties,
};
use crate::types::{
    ActiveAlert, AlertSeverity, CurrentConditions, DailyPoint, HourlyPoint, StationSnapshot,
    WeatherCondition, WeatherModel,
};

pub(super) fn normalize(
    payload: &NoaaPayload,
    now: DateTime<Utc>,
) -> Result<WeatherModel, NormalizationError> {
    // Forecast periods carry the grid's local offset; observations are UTC.
    let offset = payload
        .hourly
        .first()
        .map(|p| *p.start_time.offset())
        .unwrap_or_else(|| Utc.fix());

    let current = current_conditions(&payload.observation, offset, now)?;
    let hourly = finish_hourly(
        payload
            .hourly
            .iter()
            .filter_map(|p| hourly_point(p, offset))
            .collect(),
        now,
    )?;
    let daily = payload
        .daily
        .as_deref()
        .map(|periods| daily_points(periods, offset))
        .unwrap_or_default();
    let alerts = payload
        .alerts
        .as_deref()
        .map(|alerts| {
            let converted = alerts
                .iter()
                .filter_map(|a| active_alert(a, offset, now))
                .collect();
            finish_alerts(converted, now)
        })
        .unwrap_or_default();
    let regional = payload
        .regional
        .iter()
        .map(|(station, obs)| station_snapshot(station, obs, offset))
        .collect();

    let location_label = payload
        .point
        .relative_location
        .as_ref()
        .and_then(|rel| match (&rel.properties.city, &rel.properties.state) {
            (Some(city), Some(state)) => Some(format!("{}, {}", city, state)),
            (Some(city), None) => Some(city.clone()),
            _ => None,
        });

    Ok(WeatherModel {
        current,
        hourly,
        daily,
        alerts,
        regional,
        marine: None,
        air_quality: None,
        location_label,
    })
}

fn temperature(q: &Quantity) -> Option<f64> {
    q.value.map(|v| temperature_c(v, q.unit_code.as_deref()))
}

fn condition(icon: Option<&str>) -> WeatherCondition {
    icon.map(WeatherCondition::from_nws_icon).unwrap_or_default()
}

fn current_conditions(
    obs: &Observation,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<CurrentConditions, NormalizationError> {
    let temp_c =
        temperature(&obs.temperature).ok_or(NormalizationError::missing("current.temperature"))?;
    let condition = condition(obs.icon.as_deref());
    let description = obs
        .text_description
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(condition.description())
        .to_string();

    Ok(CurrentConditions {
        temperature: temp_c,
        feels_like: temperature(&obs.heat_index).or_else(|| temperature(&obs.wind_chill)),
        humidity: obs.relative_humidity.value.map(round1),
        wind_speed: obs
            .wind_speed
            .value
            .map(|v| speed_kmh(v, obs.wind_speed.unit_code.as_deref())),
        wind_direction: obs.wind_direction.value.map(round1),
        pressure: obs
            .barometric_pressure
            .value
            .map(|v| pressure_hpa(v, obs.barometric_pressure.unit_code.as_deref())),
        condition,
        description,
        observed_at: obs
            .timestamp
            .map_or_else(|| now.with_timezone(&offset), |t| t.with_timezone(&offset)),
    })
}

fn hourly_point(period: &ForecastPeriod, offset: FixedOffset) -> Option<HourlyPoint> {
    let temperature = temperature_c(period.temperature?, period.temperature_unit.as_deref());
    Some(HourlyPoint {
        time: period.start_time.with_timezone(&offset),
        temperature,
        condition: condition(period.icon.as_deref()),
        precipitation_chance: precipitation(period),
        wind_speed: period.wind_speed.as_deref().and_then(parse_wind_text),
    })
}

fn precipitation(period: &ForecastPeriod) -> Option<u8> {
    period
        .probability_of_precipitation
        .as_ref()
        .and_then(|q| q.value)
        .map(percent)
}

/// Fold day/night forecast periods into one point per local date.
fn daily_points(periods: &[ForecastPeriod], offset: FixedOffset) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, DailyPoint> = BTreeMap::new();

    for period in periods {
        let date = period.start_time.with_timezone(&offset).date_naive();
        let temp = period
            .temperature
            .map(|t| temperature_c(t, period.temperature_unit.as_deref()));
        let period_condition = condition(period.icon.as_deref());

        let day = days.entry(date).or_insert_with(|| DailyPoint {
            date,
            high: None,
            low: None,
            condition: period_condition,
            precipitation_chance: None,
            sunrise: None,
            sunset: None,
            summary: None,
        });

        if period.is_daytime {
            day.high = temp;
            day.condition = period_condition;
            day.summary = period
                .detailed_forecast
                .clone()
                .or_else(|| period.short_forecast.clone());
        } else {
            day.low = temp;
            if day.summary.is_none() {
                day.summary = period
                    .detailed_forecast
                    .clone()
                    .or_else(|| period.short_forecast.clone());
            }
        }
        day.precipitation_chance = match (day.precipitation_chance, precipitation(period)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    finish_daily(days.into_values().collect())
}

fn active_alert(
    alert: &AlertProperties,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Option<ActiveAlert> {
    let severity = alert
        .severity
        .as_deref()
        .map_or(AlertSeverity::Unknown, AlertSeverity::parse);
    if !is_displayed_severity(severity) {
        return None;
    }

    let effective_from = alert
        .effective
        .or(alert.onset)
        .map_or_else(|| now.with_timezone(&offset), |t| t.with_timezone(&offset));

    Some(ActiveAlert {
        id: alert.id.clone(),
        event: alert.event.clone(),
        severity,
        urgency: alert.urgency.clone(),
        headline: alert.headline.clone().unwrap_or_else(|| alert.event.clone()),
        effective_from,
        effective_until: alert.ends.or(alert.expires).map(|t| t.with_timezone(&offset)),
    })
}

fn station_snapshot(
    station: &StationProperties,
    obs: &Observation,
    offset: FixedOffset,
) -> StationSnapshot {
    StationSnapshot {
        station_id: station.station_identifier.clone(),
        name: station.name.clone(),
        temperature: temperature(&obs.temperature),
        condition: condition(obs.icon.as_deref()),
        observed_at: obs.timestamp.map(|t| t.with_timezone(&offset)),
    }
}
