//! Weather-specific error types.

use std::time::Duration;

use thiserror::Error;
use wxstar_core::AppError;

use crate::retry::{RetryDecision, Retryable};
use crate::types::Coordinate;

/// Failure reported by a provider client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Location {0} is outside provider coverage")]
    GeographicallyUnsupported(String),
}

impl UpstreamError {
    pub fn is_geographically_unsupported(&self) -> bool {
        matches!(self, Self::GeographicallyUnsupported(_))
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Network(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Weather service unreachable. Showing last data.".to_string(),
            Self::RateLimited(secs) => {
                format!("Weather service busy. Retrying in {} seconds.", secs)
            }
            Self::Malformed(_) => "Weather service sent bad data. Showing last data.".to_string(),
            Self::GeographicallyUnsupported(_) => {
                "This location is not covered by the selected service.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            UpstreamError::Malformed(e.to_string())
        } else if e.is_timeout() {
            UpstreamError::Network(format!("request timed out: {}", e))
        } else {
            UpstreamError::Network(e.to_string())
        }
    }
}

impl Retryable for UpstreamError {
    fn retry_decision(&self) -> RetryDecision {
        if self.is_retryable() {
            RetryDecision::Retry
        } else {
            RetryDecision::NoRetry
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited(secs) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// A mandatory field was absent from an otherwise valid payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Normalization failed: missing {missing_field}")]
pub struct NormalizationError {
    pub missing_field: &'static str,
}

impl NormalizationError {
    pub fn missing(field: &'static str) -> Self {
        Self {
            missing_field: field,
        }
    }
}

/// Why a refresh kept the previous entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

/// No model has been cached for this coordinate yet.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("No weather data yet for {0}")]
pub struct CacheMiss(pub Coordinate);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Location lookup errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Location lookup failed: {0}")]
    Lookup(String),

    #[error("Location service unavailable")]
    ServiceUnavailable,
}

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        AppError::Location(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(UpstreamError::Network("reset".into()).is_retryable());
        assert!(UpstreamError::RateLimited(5).is_retryable());
        assert!(!UpstreamError::Malformed("eof".into()).is_retryable());
        assert!(!UpstreamError::GeographicallyUnsupported("0,0".into()).is_retryable());
    }

    #[test]
    fn test_rate_limited_retry_after() {
        let err = UpstreamError::RateLimited(30);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert!(err.user_message().contains("30"));
    }

    #[test]
    fn test_location_error_into_app_error() {
        let app: AppError = LocationError::ServiceUnavailable.into();
        assert!(matches!(app, AppError::Location(_)));
    }

    #[test]
    fn test_normalization_error_names_field() {
        let err = NormalizationError::missing("current.temperature");
        assert!(err.to_string().contains("current.temperature"));
    }
}
