//! User-adjustable station settings.
//!
//! Settings are edited through a [`SettingsController`], which validates
//! every change before it is staged. Staged changes become visible to
//! readers only when the owner calls [`SettingsController::publish_pending`],
//! which the display scheduler does at the start of a tick.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Classic,
    Dark,
    HighContrast,
    RetroGreen,
    Amber,
}

impl Theme {
    pub const ALL: [Theme; 5] = [
        Theme::Classic,
        Theme::Dark,
        Theme::HighContrast,
        Theme::RetroGreen,
        Theme::Amber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Classic => "classic",
            Theme::Dark => "dark",
            Theme::HighContrast => "high_contrast",
            Theme::RetroGreen => "retro_green",
            Theme::Amber => "amber",
        }
    }
}

impl FromStr for Theme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or(())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which upstream provider the dispatcher should try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPreference {
    #[default]
    Auto,
    Noaa,
    OpenMeteo,
}

impl ProviderPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderPreference::Auto => "auto",
            ProviderPreference::Noaa => "noaa",
            ProviderPreference::OpenMeteo => "open_meteo",
        }
    }
}

impl FromStr for ProviderPreference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ProviderPreference::Auto),
            "noaa" | "nws" => Ok(ProviderPreference::Noaa),
            "open_meteo" | "openmeteo" | "open-meteo" => Ok(ProviderPreference::OpenMeteo),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsSource {
    Msn,
    Reddit,
    Local,
}

impl NewsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsSource::Msn => "msn",
            NewsSource::Reddit => "reddit",
            NewsSource::Local => "local",
        }
    }
}

impl FromStr for NewsSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msn" => Ok(NewsSource::Msn),
            "reddit" => Ok(NewsSource::Reddit),
            "local" => Ok(NewsSource::Local),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub marine_forecast_enabled: bool,
    pub trends_enabled: bool,
    pub historical_enabled: bool,
    #[serde(deserialize_with = "clamped_volume")]
    pub volume: u8,
    pub news_sources: BTreeSet<NewsSource>,
    pub provider_preference: ProviderPreference,
    pub theme: Theme,
}

/// Stored volumes outside 0..=MAX_VOLUME are clamped rather than rejected
/// so one bad value does not discard the rest of the file.
fn clamped_volume<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    let clamped = raw.clamp(0, i64::from(MAX_VOLUME));
    if clamped != raw {
        tracing::warn!(volume = raw, "stored volume out of range, clamping");
    }
    Ok(u8::try_from(clamped).unwrap_or(MAX_VOLUME))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            marine_forecast_enabled: false,
            trends_enabled: true,
            historical_enabled: true,
            volume: 30,
            news_sources: [NewsSource::Msn, NewsSource::Reddit, NewsSource::Local]
                .into_iter()
                .collect(),
            provider_preference: ProviderPreference::Auto,
            theme: Theme::Classic,
        }
    }
}

impl Settings {
    pub fn news_enabled(&self, source: NewsSource) -> bool {
        self.news_sources.contains(&source)
    }

    /// Produce a new settings value with `update` applied.
    ///
    /// Every field is validated before anything is copied, so a failure
    /// leaves no partial result behind.
    pub fn merged(&self, update: &SettingsUpdate) -> Result<Settings, ValidationError> {
        let volume = match update.volume {
            Some(v) if !(0..=i64::from(MAX_VOLUME)).contains(&v) => {
                return Err(ValidationError::new(
                    SettingsField::Volume,
                    format!("{} is outside 0..={}", v, MAX_VOLUME),
                ));
            }
            Some(v) => u8::try_from(v).map_err(|_| {
                ValidationError::new(SettingsField::Volume, format!("{} is not a volume", v))
            })?,
            None => self.volume,
        };

        let theme = match update.theme.as_deref() {
            Some(raw) => raw.parse::<Theme>().map_err(|_| {
                ValidationError::new(SettingsField::Theme, format!("unknown theme '{}'", raw))
            })?,
            None => self.theme,
        };

        let provider_preference = match update.provider_preference.as_deref() {
            Some(raw) => raw.parse::<ProviderPreference>().map_err(|_| {
                ValidationError::new(
                    SettingsField::ProviderPreference,
                    format!("unknown provider '{}'", raw),
                )
            })?,
            None => self.provider_preference,
        };

        let news_sources = match &update.news_sources {
            Some(raw) => raw
                .iter()
                .map(|s| {
                    s.parse::<NewsSource>().map_err(|_| {
                        ValidationError::new(
                            SettingsField::NewsSources,
                            format!("unknown news source '{}'", s),
                        )
                    })
                })
                .collect::<Result<BTreeSet<_>, _>>()?,
            None => self.news_sources.clone(),
        };

        Ok(Settings {
            marine_forecast_enabled: update
                .marine_forecast_enabled
                .unwrap_or(self.marine_forecast_enabled),
            trends_enabled: update.trends_enabled.unwrap_or(self.trends_enabled),
            historical_enabled: update.historical_enabled.unwrap_or(self.historical_enabled),
            volume,
            news_sources,
            provider_preference,
            theme,
        })
    }
}

/// A partial, unvalidated settings edit as it arrives from the command stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    pub marine_forecast_enabled: Option<bool>,
    pub trends_enabled: Option<bool>,
    pub historical_enabled: Option<bool>,
    pub volume: Option<i64>,
    pub news_sources: Option<Vec<String>>,
    pub provider_preference: Option<String>,
    pub theme: Option<String>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self == &SettingsUpdate::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    MarineForecast,
    Trends,
    Historical,
    Volume,
    NewsSources,
    ProviderPreference,
    Theme,
}

impl fmt::Display for SettingsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingsField::MarineForecast => "marine_forecast_enabled",
            SettingsField::Trends => "trends_enabled",
            SettingsField::Historical => "historical_enabled",
            SettingsField::Volume => "volume",
            SettingsField::NewsSources => "news_sources",
            SettingsField::ProviderPreference => "provider_preference",
            SettingsField::Theme => "theme",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: SettingsField,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: SettingsField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
struct Published {
    version: u64,
    settings: Arc<Settings>,
}

/// Read-only view of the published settings, shared across tasks.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Published>>,
}

impl SettingsHandle {
    fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Published {
                version: 0,
                settings: Arc::new(settings),
            })),
        }
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        Arc::clone(&self.inner.read().settings)
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}

/// Validates, stages and publishes settings changes.
#[derive(Debug)]
pub struct SettingsController {
    handle: SettingsHandle,
    pending: Option<Settings>,
}

impl SettingsController {
    pub fn new(initial: Settings) -> Self {
        Self {
            handle: SettingsHandle::new(initial),
            pending: None,
        }
    }

    pub fn handle(&self) -> SettingsHandle {
        self.handle.clone()
    }

    /// Settings as they will be after the next publish.
    pub fn current(&self) -> Settings {
        match &self.pending {
            Some(pending) => pending.clone(),
            None => (*self.handle.snapshot()).clone(),
        }
    }

    /// Validate and stage `update`. Nothing is staged on error.
    pub fn apply(&mut self, update: &SettingsUpdate) -> Result<Settings, ValidationError> {
        let next = self.current().merged(update)?;
        tracing::debug!(?next, "settings staged");
        self.pending = Some(next.clone());
        Ok(next)
    }

    /// Discard staged edits and stage `snapshot` instead.
    pub fn restore(&mut self, snapshot: Settings) {
        if *self.handle.snapshot() == snapshot {
            self.pending = None;
        } else {
            self.pending = Some(snapshot);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Make staged settings visible to readers. Returns the new version if
    /// anything changed.
    pub fn publish_pending(&mut self) -> Option<u64> {
        let next = self.pending.take()?;
        let mut published = self.handle.inner.write();
        if *published.settings == next {
            return None;
        }
        published.version += 1;
        published.settings = Arc::new(next);
        Some(published.version)
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// TOML persistence for [`Settings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_load(&self) -> Result<Settings, SettingsError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Load settings, falling back to defaults if the file is missing or
    /// unreadable.
    pub fn load(&self) -> Settings {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no settings file, using defaults");
            return Settings::default();
        }
        match self.try_load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("{}; using default settings", e);
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, content).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}
