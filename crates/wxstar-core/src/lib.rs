pub mod config;
pub mod error;
pub mod events;
pub mod settings;

pub use config::{
    Config, DisplayConfig, LocationConfig, ProvidersConfig, RefreshConfig, ValidationResult,
};
pub use error::{AppError, ConfigError};
pub use events::{ChannelSink, CoreEvent, EventSink, TracingSink};
pub use settings::{
    NewsSource, ProviderPreference, Settings, SettingsController, SettingsError, SettingsField,
    SettingsHandle, SettingsStore, SettingsUpdate, Theme, ValidationError,
};

use anyhow::Result;

/// Initialize tracing/logging.
///
/// `level` overrides the default filter; `RUST_LOG` still wins when set.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.unwrap_or("info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("WxStar core initialized");
    Ok(())
}
