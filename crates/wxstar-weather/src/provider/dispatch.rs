use std::sync::Arc;

use wxstar_core::ProviderPreference;

use super::{RawProviderResult, WeatherSource};
use crate::coverage;
use crate::error::UpstreamError;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{Coordinate, ProviderId};

/// Chooses a provider for a coordinate and falls back once when the
/// first choice does not cover it.
#[derive(Clone)]
pub struct ProviderDispatcher {
    noaa: Arc<dyn WeatherSource>,
    open_meteo: Arc<dyn WeatherSource>,
    retry: RetryConfig,
}

impl std::fmt::Debug for ProviderDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDispatcher")
            .field("noaa", &self.noaa.id())
            .field("open_meteo", &self.open_meteo.id())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderDispatcher {
    pub fn new(
        noaa: Arc<dyn WeatherSource>,
        open_meteo: Arc<dyn WeatherSource>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            noaa,
            open_meteo,
            retry,
        }
    }

    /// The provider to try first.
    pub fn primary_for(coordinate: &Coordinate, preference: ProviderPreference) -> ProviderId {
        match preference {
            ProviderPreference::Noaa => ProviderId::Noaa,
            ProviderPreference::OpenMeteo => ProviderId::OpenMeteo,
            ProviderPreference::Auto if coverage::nws_covers(coordinate) => ProviderId::Noaa,
            ProviderPreference::Auto => ProviderId::OpenMeteo,
        }
    }

    fn source(&self, id: ProviderId) -> &Arc<dyn WeatherSource> {
        match id {
            ProviderId::Noaa => &self.noaa,
            ProviderId::OpenMeteo => &self.open_meteo,
        }
    }

    async fn fetch_from(
        &self,
        id: ProviderId,
        coordinate: &Coordinate,
    ) -> Result<RawProviderResult, UpstreamError> {
        let source = self.source(id);
        with_retry(&self.retry, || source.fetch(coordinate)).await
    }

    pub async fn fetch(
        &self,
        coordinate: &Coordinate,
        preference: ProviderPreference,
    ) -> Result<RawProviderResult, UpstreamError> {
        let primary = Self::primary_for(coordinate, preference);

        match self.fetch_from(primary, coordinate).await {
            Err(e) if e.is_geographically_unsupported() => {
                let fallback = primary.other();
                tracing::info!(
                    "{} does not cover {}, falling back to {}",
                    primary,
                    coordinate,
                    fallback
                );
                self.fetch_from(fallback, coordinate).await
            }
            other => other,
        }
    }
}
