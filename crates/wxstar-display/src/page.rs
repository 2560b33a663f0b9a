//! Static page catalog.
//!
//! A page is eligible when every model field it requires is present in the
//! current cache entry and its settings gate (if any) is open. The catalog
//! is built once at startup and never changes.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use wxstar_core::{NewsSource, Settings};
use wxstar_weather::CacheEntry;

/// Hazards stay up a little longer than the default dwell.
pub const HAZARDS_DWELL: Duration = Duration::from_secs(20);

/// A piece of the weather model a page depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelField {
    Current,
    Hourly,
    Daily,
    LocalForecastText,
    Regional,
    SunTimes,
    Alerts,
    AirQuality,
    Marine,
    CurrentPressure,
    TrendHistory,
}

impl ModelField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelField::Current => "current",
            ModelField::Hourly => "hourly",
            ModelField::Daily => "daily",
            ModelField::LocalForecastText => "daily.summary",
            ModelField::Regional => "regional",
            ModelField::SunTimes => "daily.sunrise",
            ModelField::Alerts => "alerts",
            ModelField::AirQuality => "air_quality",
            ModelField::Marine => "marine",
            ModelField::CurrentPressure => "current.pressure",
            ModelField::TrendHistory => "trends.history",
        }
    }

    /// Whether `entry` carries this field at `now`. Alerts count only while
    /// at least one is unexpired.
    pub fn is_present(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let model = &entry.model;
        match self {
            ModelField::Current => true,
            ModelField::Hourly => !model.hourly.is_empty(),
            ModelField::Daily => !model.daily.is_empty(),
            ModelField::LocalForecastText => model.has_local_forecast_text(),
            ModelField::Regional => !model.regional.is_empty(),
            ModelField::SunTimes => model.has_sun_times(),
            ModelField::Alerts => model.active_alerts(now).next().is_some(),
            ModelField::AirQuality => model.air_quality.is_some(),
            ModelField::Marine => model.marine.is_some(),
            ModelField::CurrentPressure => model.current.pressure.is_some(),
            ModelField::TrendHistory => entry.trends.history.len() >= 2,
        }
    }
}

impl fmt::Display for ModelField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user setting that must be on for a page to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsGate {
    Marine,
    Historical,
    News(NewsSource),
}

impl SettingsGate {
    pub fn is_open(&self, settings: &Settings) -> bool {
        match self {
            SettingsGate::Marine => settings.marine_forecast_enabled,
            SettingsGate::Historical => settings.historical_enabled,
            SettingsGate::News(source) => settings.news_enabled(*source),
        }
    }
}

impl fmt::Display for SettingsGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsGate::Marine => f.write_str("marine forecast"),
            SettingsGate::Historical => f.write_str("historical data"),
            SettingsGate::News(source) => write!(f, "{} news", source.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCategory {
    Conditions,
    Forecast,
    Observations,
    Hazards,
    Environment,
    Graphs,
    News,
}

/// Why a page was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoData,
    MissingField(ModelField),
    Disabled(SettingsGate),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => f.write_str("no weather data yet"),
            SkipReason::MissingField(field) => write!(f, "missing {}", field),
            SkipReason::Disabled(gate) => write!(f, "{} disabled", gate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub required_fields: Vec<ModelField>,
    pub dwell: Duration,
    pub category: PageCategory,
    pub gate: Option<SettingsGate>,
}

impl PageDescriptor {
    pub fn new(
        id: &'static str,
        title: &'static str,
        category: PageCategory,
        required_fields: &[ModelField],
        dwell: Duration,
    ) -> Self {
        Self {
            id,
            title,
            required_fields: required_fields.to_vec(),
            dwell,
            category,
            gate: None,
        }
    }

    pub fn gated(mut self, gate: SettingsGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// `Ok` when the page can be shown right now.
    pub fn eligibility(
        &self,
        entry: Option<&CacheEntry>,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<(), SkipReason> {
        if let Some(gate) = self.gate {
            if !gate.is_open(settings) {
                return Err(SkipReason::Disabled(gate));
            }
        }
        if self.required_fields.is_empty() {
            return Ok(());
        }
        let entry = entry.ok_or(SkipReason::NoData)?;
        match self
            .required_fields
            .iter()
            .find(|field| !field.is_present(entry, now))
        {
            Some(field) => Err(SkipReason::MissingField(*field)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageCatalog {
    pages: Vec<PageDescriptor>,
}

impl PageCatalog {
    pub fn new(pages: Vec<PageDescriptor>) -> Self {
        Self { pages }
    }

    /// The standard page rotation.
    pub fn default_catalog(default_dwell: Duration) -> Self {
        use ModelField as F;
        use PageCategory as C;

        let page = |id, title, category, fields: &[ModelField]| {
            PageDescriptor::new(id, title, category, fields, default_dwell)
        };

        Self::new(vec![
            page("current-conditions", "Current Conditions", C::Conditions, &[F::Current]),
            page("hourly-forecast", "Hourly Forecast", C::Forecast, &[F::Hourly]),
            page("extended-forecast", "Extended Forecast", C::Forecast, &[F::Daily]),
            page("weekend-forecast", "Weekend Forecast", C::Forecast, &[F::Daily]),
            page("local-forecast", "Local Forecast", C::Forecast, &[F::LocalForecastText]),
            page("regional-observations", "Latest Observations", C::Observations, &[F::Regional]),
            page("almanac", "Almanac", C::Observations, &[F::SunTimes]),
            page("sun-moon", "Sun & Moon", C::Observations, &[F::SunTimes]),
            PageDescriptor::new("hazards", "Hazards", C::Hazards, &[F::Alerts], HAZARDS_DWELL),
            page("air-quality", "Air Quality", C::Environment, &[F::AirQuality]),
            page("marine-forecast", "Marine Forecast", C::Environment, &[F::Marine])
                .gated(SettingsGate::Marine),
            page("temperature-graph", "Temperature Trend", C::Graphs, &[F::Hourly]),
            page("wind-pressure", "Wind & Pressure", C::Graphs, &[F::CurrentPressure]),
            page("temperature-history", "Temperature History", C::Graphs, &[F::TrendHistory])
                .gated(SettingsGate::Historical),
            page("msn-news", "MSN News", C::News, &[]).gated(SettingsGate::News(NewsSource::Msn)),
            page("reddit-news", "Reddit News", C::News, &[])
                .gated(SettingsGate::News(NewsSource::Reddit)),
            page("local-news", "Local News", C::News, &[])
                .gated(SettingsGate::News(NewsSource::Local)),
        ])
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PageDescriptor> {
        self.pages.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageDescriptor> {
        self.pages.iter()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }
}
