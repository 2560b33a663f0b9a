//! Top-level error types for the WxStar station.
//!
//! Subsystem crates keep their own typed errors (upstream, normalization,
//! cache). Only failures that reach the process boundary are folded into
//! [`AppError`], which carries a short message fit for the on-screen crawl.

use thiserror::Error;

use crate::settings::{SettingsError, ValidationError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Location error: {0}")]
    Location(String),

    #[error("Settings rejected: {0}")]
    Settings(#[from] ValidationError),

    #[error("Settings storage error: {0}")]
    Storage(#[from] SettingsError),

    #[error("{0}")]
    Other(anyhow::Error),
}

/// Config loading reports through anyhow; recover the typed error when
/// there is one.
impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<ConfigError>() {
            Ok(config) => AppError::Config(config),
            Err(other) => AppError::Other(other),
        }
    }
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Location(_) => "Unable to determine location. Using the fallback city.",
            AppError::Settings(_) => "That setting is not allowed. Previous settings kept.",
            AppError::Storage(_) => "Could not save settings. Changes last until restart.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "No configuration directory found. Pass --config.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}
