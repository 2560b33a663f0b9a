//! Property tests for page rotation over the default catalog.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use wxstar_core::{NewsSource, Settings, SettingsController, TracingSink};
use wxstar_display::{PageCatalog, Scheduler};
use wxstar_weather::{
    AirQuality, AqiCategory, CacheEntry, Coordinate, CurrentConditions, DailyPoint, HourlyPoint,
    MarineDay, MarineForecast, ProviderId, StationSnapshot, TrendReport, WeatherCondition,
    WeatherModel,
};

const DWELL: Duration = Duration::from_secs(15);

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Which optional sections the generated model carries.
#[derive(Debug, Clone)]
struct Sections {
    hourly: bool,
    daily: bool,
    regional: bool,
    air_quality: bool,
    marine: bool,
    pressure: bool,
}

fn sections() -> impl Strategy<Value = Sections> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>())
        .prop_map(|(hourly, daily, regional, air_quality, marine, pressure)| Sections {
            hourly,
            daily,
            regional,
            air_quality,
            marine,
            pressure,
        })
}

fn settings() -> impl Strategy<Value = Settings> {
    let news = proptest::collection::btree_set(
        prop_oneof![
            Just(NewsSource::Msn),
            Just(NewsSource::Reddit),
            Just(NewsSource::Local),
        ],
        0..=3,
    );
    (any::<bool>(), any::<bool>(), news).prop_map(
        |(marine_forecast_enabled, historical_enabled, news_sources)| Settings {
            marine_forecast_enabled,
            historical_enabled,
            news_sources,
            ..Settings::default()
        },
    )
}

fn entry(s: &Sections) -> Arc<CacheEntry> {
    let observed_at = now().fixed_offset();
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    Arc::new(CacheEntry {
        coordinate: Coordinate::new(40.0, -74.0).unwrap(),
        model: WeatherModel {
            current: CurrentConditions {
                temperature: 21.0,
                feels_like: None,
                humidity: None,
                wind_speed: None,
                wind_direction: None,
                pressure: s.pressure.then_some(1012.0),
                condition: WeatherCondition::Cloudy,
                description: "Cloudy".into(),
                observed_at,
            },
            hourly: if s.hourly {
                vec![HourlyPoint {
                    time: observed_at,
                    temperature: 21.0,
                    condition: WeatherCondition::Cloudy,
                    precipitation_chance: None,
                    wind_speed: None,
                }]
            } else {
                vec![]
            },
            daily: if s.daily {
                vec![DailyPoint {
                    date,
                    high: Some(25.0),
                    low: Some(15.0),
                    condition: WeatherCondition::Cloudy,
                    precipitation_chance: None,
                    sunrise: Some(observed_at),
                    sunset: Some(observed_at),
                    summary: Some("Cloudy with a high near 25.".into()),
                }]
            } else {
                vec![]
            },
            alerts: vec![],
            regional: if s.regional {
                vec![StationSnapshot {
                    station_id: "KJFK".into(),
                    name: None,
                    temperature: Some(20.0),
                    condition: WeatherCondition::Cloudy,
                    observed_at: None,
                }]
            } else {
                vec![]
            },
            marine: s.marine.then(|| MarineForecast {
                days: vec![MarineDay {
                    date,
                    wave_height: Some(1.0),
                    wave_direction: None,
                    wave_period: Some(6.0),
                }],
            }),
            air_quality: s.air_quality.then_some(AirQuality {
                us_aqi: 40,
                pm10: None,
                pm2_5: None,
                category: AqiCategory::Good,
            }),
            location_label: None,
        },
        fetched_at: now(),
        provider: ProviderId::Noaa,
        trends: TrendReport::default(),
    })
}

fn scheduler(settings: Settings) -> Scheduler {
    Scheduler::new(
        PageCatalog::default_catalog(DWELL),
        SettingsController::new(settings),
        Arc::new(TracingSink),
    )
}

proptest! {
    #[test]
    fn dwell_expiry_cycles_through_every_eligible_page(
        sections in sections(),
        settings in settings(),
        start_offset in 0usize..16,
    ) {
        let e = entry(&sections);
        let catalog = PageCatalog::default_catalog(DWELL);
        let eligible: Vec<&str> = catalog
            .iter()
            .filter(|p| p.eligibility(Some(&e), &settings, now()).is_ok())
            .map(|p| p.id)
            .collect();
        // Current conditions are always available.
        prop_assert!(!eligible.is_empty());

        let mut s = scheduler(settings);
        s.tick(Duration::ZERO, Some(Arc::clone(&e)), now());
        for _ in 0..(start_offset % eligible.len()) {
            s.tick(Duration::from_secs(3600), Some(Arc::clone(&e)), now());
        }
        let start = s.current_page().unwrap().id;

        let mut visited = Vec::new();
        for _ in 0..eligible.len() {
            let dwell = s.current_page().unwrap().dwell;
            s.tick(dwell, Some(Arc::clone(&e)), now());
            visited.push(s.current_page().unwrap().id);
        }

        prop_assert_eq!(s.current_page().unwrap().id, start);
        let mut sorted_visited = visited.clone();
        sorted_visited.sort_unstable();
        let mut sorted_eligible = eligible.clone();
        sorted_eligible.sort_unstable();
        prop_assert_eq!(sorted_visited, sorted_eligible);
    }

    #[test]
    fn never_lands_on_an_ineligible_page(
        sections in sections(),
        settings in settings(),
        steps in proptest::collection::vec(0u64..40, 1..50),
    ) {
        let e = entry(&sections);
        let mut s = scheduler(settings.clone());
        for secs in steps {
            s.tick(Duration::from_secs(secs), Some(Arc::clone(&e)), now());
            let page = s.current_page().unwrap();
            prop_assert!(page.eligibility(Some(&e), &settings, now()).is_ok());
        }
    }
}
