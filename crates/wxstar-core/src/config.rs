use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml, settings.toml and the cache snapshot
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where the station is. Manual coordinates skip IP lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Used when neither manual coordinates nor IP lookup are available
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,
    pub fallback_label: String,
}

fn default_fallback_latitude() -> f64 {
    28.5383
}

fn default_fallback_longitude() -> f64 {
    -81.3792
}

fn default_fallback_label() -> String {
    "Orlando, FL".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            fallback_latitude: default_fallback_latitude(),
            fallback_longitude: default_fallback_longitude(),
            fallback_label: default_fallback_label(),
        }
    }
}

impl LocationConfig {
    /// Manual coordinate, if both halves are configured.
    pub fn manual(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between scheduled refreshes
    pub interval_secs: u64,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Backoff before the first retry, doubled per attempt
    pub initial_backoff_ms: u64,

    /// Keep the last-good model on disk across restarts
    pub persist_cache: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            timeout_secs: 10,
            max_retries: 1,
            initial_backoff_ms: 500,
            persist_cache: true,
        }
    }
}

/// Upstream endpoints. Overridable so tests and mirrors can point elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub nws_base_url: String,
    pub open_meteo_base_url: String,
    pub open_meteo_marine_url: String,
    pub open_meteo_air_quality_url: String,
    pub ipapi_url: String,
    pub ip_api_url: String,
    pub user_agent: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            nws_base_url: "https://api.weather.gov".to_string(),
            open_meteo_base_url: "https://api.open-meteo.com".to_string(),
            open_meteo_marine_url: "https://marine-api.open-meteo.com".to_string(),
            open_meteo_air_quality_url: "https://air-quality-api.open-meteo.com".to_string(),
            ipapi_url: "https://ipapi.co/json/".to_string(),
            ip_api_url: "http://ip-api.com/json/".to_string(),
            user_agent: concat!("WxStar/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Render loop cadence
    pub frame_rate: u32,

    /// Default seconds each page stays on screen
    pub dwell_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            dwell_secs: 15,
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wxstar")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            location: LocationConfig::default(),
            refresh: RefreshConfig::default(),
            providers: ProvidersConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, creating a default file if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_error("location.latitude", "Latitude must be within [-90, 90]");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_error("location.longitude", "Longitude must be within [-180, 180]");
                }
            }
            (None, None) => {}
            _ => result.add_warning(
                "location",
                "Only one of latitude/longitude set; falling back to IP lookup",
            ),
        }

        if !(-90.0..=90.0).contains(&self.location.fallback_latitude)
            || !(-180.0..=180.0).contains(&self.location.fallback_longitude)
        {
            result.add_error("location.fallback", "Fallback coordinate is out of range");
        }

        if self.refresh.interval_secs == 0 {
            result.add_warning("refresh.interval_secs", "Scheduled refresh disabled (0 seconds)");
        } else if self.refresh.interval_secs < 60 {
            result.add_warning(
                "refresh.interval_secs",
                "Refreshing more than once a minute may hit upstream rate limits",
            );
        }

        if self.refresh.timeout_secs == 0 {
            result.add_error("refresh.timeout_secs", "Request timeout must be greater than 0");
        }

        if self.refresh.max_retries > 3 {
            result.add_warning("refresh.max_retries", "More than 3 retries delays stale-serving");
        }

        let providers = &self.providers;
        for (field, value) in [
            ("providers.nws_base_url", &providers.nws_base_url),
            ("providers.open_meteo_base_url", &providers.open_meteo_base_url),
            ("providers.open_meteo_marine_url", &providers.open_meteo_marine_url),
            (
                "providers.open_meteo_air_quality_url",
                &providers.open_meteo_air_quality_url,
            ),
            ("providers.ipapi_url", &providers.ipapi_url),
            ("providers.ip_api_url", &providers.ip_api_url),
        ] {
            self.validate_url(value, field, &mut result);
        }

        if self.display.frame_rate == 0 {
            result.add_error("display.frame_rate", "Frame rate must be greater than 0");
        } else if self.display.frame_rate > 120 {
            result.add_warning("display.frame_rate", "Frame rate is unusually high (>120)");
        }

        if self.display.dwell_secs == 0 {
            result.add_error("display.dwell_secs", "Dwell must be at least one second");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the persisted user settings
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }

    /// Path of the on-disk weather cache snapshot
    pub fn cache_path(&self) -> PathBuf {
        self.config_dir.join("weather_cache.json")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("no user config directory".into()))?
            .join("wxstar");

        Ok(config_dir.join("config.toml"))
    }
}
