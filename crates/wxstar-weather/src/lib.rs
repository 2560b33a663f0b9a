//! Weather data aggregation for WxStar.
//!
//! Fetches from the NWS or Open-Meteo depending on location, normalizes
//! both into one [`WeatherModel`], and keeps the last good model per
//! coordinate in a [`WeatherCache`] fed by the [`RefreshPipeline`].

pub mod cache;
pub mod coverage;
pub mod error;
pub mod location;
pub mod normalize;
pub mod provider;
pub mod refresh;
pub mod retry;
pub mod trend;
pub mod types;

pub use cache::{CacheEntry, WeatherCache};
pub use error::{CacheMiss, LocationError, NormalizationError, RefreshFailure, UpstreamError};
pub use location::{LocationResolver, ResolvedLocation};
pub use normalize::normalize;
pub use provider::{
    NoaaClient, OpenMeteoClient, ProviderDispatcher, RawProviderResult, WeatherSource,
};
pub use refresh::{RefreshOutcome, RefreshPipeline};
pub use retry::RetryConfig;
pub use trend::{
    compute_trends, TrendDirection, TrendHistory, TrendMetric, TrendReport, TrendSnapshot,
};
pub use types::*;
