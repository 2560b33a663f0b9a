//! Trend arrows and short-term history.
//!
//! [`compute_trends`] is a pure comparison of two models. [`TrendHistory`]
//! carries a small ring of past readings from one cache entry to the next.

use std::collections::VecDeque;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::types::WeatherModel;

pub const HISTORY_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Temperature,
    Pressure,
    Humidity,
    WindSpeed,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 4] = [
        TrendMetric::Temperature,
        TrendMetric::Pressure,
        TrendMetric::Humidity,
        TrendMetric::WindSpeed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TrendMetric::Temperature => "temperature",
            TrendMetric::Pressure => "pressure",
            TrendMetric::Humidity => "humidity",
            TrendMetric::WindSpeed => "wind_speed",
        }
    }

    fn read(&self, model: &WeatherModel) -> Option<f64> {
        let current = &model.current;
        match self {
            TrendMetric::Temperature => Some(current.temperature),
            TrendMetric::Pressure => current.pressure,
            TrendMetric::Humidity => current.humidity,
            TrendMetric::WindSpeed => current.wind_speed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Steady,
}

impl TrendDirection {
    pub fn arrow(&self) -> char {
        match self {
            TrendDirection::Rising => '↑',
            TrendDirection::Falling => '↓',
            TrendDirection::Steady => '→',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub metric: TrendMetric,
    pub previous_value: Option<f64>,
    pub current_value: f64,
    pub direction: TrendDirection,
}

/// Compare `current` against `previous` for every metric `current` reports.
///
/// With no previous model, or a previous model lacking the metric, the
/// direction is `Steady`.
pub fn compute_trends(
    previous: Option<&WeatherModel>,
    current: &WeatherModel,
) -> Vec<TrendSnapshot> {
    TrendMetric::ALL
        .iter()
        .filter_map(|metric| {
            let current_value = metric.read(current)?;
            let previous_value = previous.and_then(|p| metric.read(p));
            let direction = match previous_value {
                Some(prev) if current_value > prev => TrendDirection::Rising,
                Some(prev) if current_value < prev => TrendDirection::Falling,
                _ => TrendDirection::Steady,
            };
            Some(TrendSnapshot {
                metric: *metric,
                previous_value,
                current_value,
                direction,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReading {
    pub observed_at: DateTime<FixedOffset>,
    pub temperature: f64,
    pub pressure: Option<f64>,
}

/// The last [`HISTORY_LEN`] distinct observations, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendHistory {
    readings: VecDeque<HistoryReading>,
}

impl TrendHistory {
    /// A copy of this history with `model`'s observation appended.
    /// Re-reporting the same observation time does not add a reading.
    pub fn advanced(&self, model: &WeatherModel) -> TrendHistory {
        let mut next = self.clone();
        let observed_at = model.current.observed_at;
        if next
            .readings
            .back()
            .is_some_and(|last| last.observed_at == observed_at)
        {
            return next;
        }
        if next.readings.len() == HISTORY_LEN {
            next.readings.pop_front();
        }
        next.readings.push_back(HistoryReading {
            observed_at,
            temperature: model.current.temperature,
            pressure: model.current.pressure,
        });
        next
    }

    pub fn readings(&self) -> impl Iterator<Item = &HistoryReading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Change from the oldest to the newest reading. Needs two readings.
    pub fn delta_since_oldest(&self, metric: TrendMetric) -> Option<f64> {
        if self.readings.len() < 2 {
            return None;
        }
        let read = |r: &HistoryReading| match metric {
            TrendMetric::Temperature => Some(r.temperature),
            TrendMetric::Pressure => r.pressure,
            TrendMetric::Humidity | TrendMetric::WindSpeed => None,
        };
        let oldest = read(self.readings.front()?)?;
        let newest = read(self.readings.back()?)?;
        Some(((newest - oldest) * 10.0).round() / 10.0)
    }
}

/// Everything derived for one cache entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub snapshots: Vec<TrendSnapshot>,
    pub history: TrendHistory,
}

impl TrendReport {
    pub fn compute(
        previous: Option<(&WeatherModel, &TrendHistory)>,
        current: &WeatherModel,
    ) -> TrendReport {
        let history = previous
            .map(|(_, history)| history.clone())
            .unwrap_or_default()
            .advanced(current);
        TrendReport {
            snapshots: compute_trends(previous.map(|(model, _)| model), current),
            history,
        }
    }

    pub fn direction(&self, metric: TrendMetric) -> Option<TrendDirection> {
        self.snapshots
            .iter()
            .find(|s| s.metric == metric)
            .map(|s| s.direction)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::types::{CurrentConditions, WeatherCondition};
    use chrono::{Duration, TimeZone, Utc};

    fn model(minutes: i64, temperature: f64, pressure: Option<f64>) -> WeatherModel {
        let observed_at = (Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
            + Duration::minutes(minutes))
        .fixed_offset();
        WeatherModel {
            current: CurrentConditions {
                temperature,
                feels_like: None,
                humidity: Some(50.0),
                wind_speed: None,
                wind_direction: None,
                pressure,
                condition: WeatherCondition::Clear,
                description: "Clear".into(),
                observed_at,
            },
            hourly: vec![],
            daily: vec![],
            alerts: vec![],
            regional: vec![],
            marine: None,
            air_quality: None,
            location_label: None,
        }
    }

    #[test]
    fn test_first_observation_is_steady() {
        let trends = compute_trends(None, &model(0, 20.0, Some(1012.0)));
        assert_eq!(trends.len(), 3);
        assert!(trends.iter().all(|t| t.direction == TrendDirection::Steady));
        assert!(trends.iter().all(|t| t.previous_value.is_none()));
    }

    #[test]
    fn test_rising_and_falling() {
        let m1 = model(0, 20.0, Some(1012.0));
        let m2 = model(60, 21.5, Some(1010.4));
        let report = TrendReport::compute(Some((&m1, &TrendHistory::default())), &m2);

        assert_eq!(
            report.direction(TrendMetric::Temperature),
            Some(TrendDirection::Rising)
        );
        assert_eq!(
            report.direction(TrendMetric::Pressure),
            Some(TrendDirection::Falling)
        );
        assert_eq!(
            report.direction(TrendMetric::Humidity),
            Some(TrendDirection::Steady)
        );
        assert_eq!(report.direction(TrendMetric::WindSpeed), None);
    }

    #[test]
    fn test_missing_previous_metric_is_steady() {
        let m1 = model(0, 20.0, None);
        let m2 = model(60, 20.0, Some(1010.0));
        let trends = compute_trends(Some(&m1), &m2);
        let pressure = trends
            .iter()
            .find(|t| t.metric == TrendMetric::Pressure)
            .unwrap();
        assert_eq!(pressure.direction, TrendDirection::Steady);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let m1 = model(0, 20.0, Some(1012.0));
        let m2 = model(60, 19.0, Some(1012.0));
        assert_eq!(compute_trends(Some(&m1), &m2), compute_trends(Some(&m1), &m2));
    }

    #[test]
    fn test_history_is_bounded_and_skips_repeats() {
        let mut history = TrendHistory::default();
        for i in 0..8 {
            history = history.advanced(&model(i * 60, 15.0 + i as f64, Some(1000.0 + i as f64)));
        }
        history = history.advanced(&model(7 * 60, 99.0, None));

        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history.readings().next().unwrap().temperature, 18.0);
        assert_eq!(history.delta_since_oldest(TrendMetric::Temperature), Some(4.0));
        assert_eq!(history.delta_since_oldest(TrendMetric::Pressure), Some(4.0));
        assert_eq!(history.delta_since_oldest(TrendMetric::Humidity), None);
    }

    #[test]
    fn test_single_reading_has_no_delta() {
        let history = TrendHistory::default().advanced(&model(0, 20.0, None));
        assert_eq!(history.delta_since_oldest(TrendMetric::Temperature), None);
    }
}
