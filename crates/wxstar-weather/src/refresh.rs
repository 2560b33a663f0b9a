//! The refresh pipeline: dispatcher → normalizer → trend engine → cache.
//!
//! The pipeline is the cache's only writer. A failed refresh leaves the
//! existing entry untouched and reports the failure as an event. At most
//! one refresh per coordinate runs at a time; overlapping requests are
//! coalesced into the one already running.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::instrument;
use wxstar_core::{CoreEvent, EventSink, SettingsHandle};

use crate::cache::{CacheEntry, WeatherCache};
use crate::error::RefreshFailure;
use crate::normalize::normalize;
use crate::provider::ProviderDispatcher;
use crate::trend::TrendReport;
use crate::types::{Coordinate, CoordinateKey};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A new model was stored.
    Updated,
    /// Upstream returned the same model; the entry was left as is.
    Unchanged,
    /// Fetch or normalization failed; the previous entry is still served.
    FailedKeepingStale(RefreshFailure),
    /// Another refresh for this coordinate was already running.
    Coalesced,
    /// A newer request for a different coordinate arrived while this one
    /// was running; its result was discarded.
    Superseded,
}

/// Removes the coordinate from the in-flight set when dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<CoordinateKey>>,
    key: CoordinateKey,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<CoordinateKey>>, key: CoordinateKey) -> Option<Self> {
        let inserted = set.lock().insert(key);
        inserted.then(|| Self { set, key })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

pub struct RefreshPipeline {
    dispatcher: ProviderDispatcher,
    cache: Arc<WeatherCache>,
    settings: SettingsHandle,
    events: Arc<dyn EventSink>,
    in_flight: Mutex<HashSet<CoordinateKey>>,
    latest: Mutex<Option<CoordinateKey>>,
    clock: Clock,
}

impl RefreshPipeline {
    pub fn new(
        dispatcher: ProviderDispatcher,
        cache: Arc<WeatherCache>,
        settings: SettingsHandle,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            dispatcher,
            cache,
            settings,
            events,
            in_flight: Mutex::new(HashSet::new()),
            latest: Mutex::new(None),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, mainly for tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &Arc<WeatherCache> {
        &self.cache
    }

    /// Make `coordinate` the active one. Any in-flight refresh for a
    /// different coordinate will have its result discarded.
    pub fn set_coordinate(&self, coordinate: &Coordinate) {
        let previous = self.latest.lock().replace(coordinate.key());
        if previous.is_some_and(|p| p != coordinate.key()) {
            tracing::info!(%coordinate, "Active coordinate changed");
        }
    }

    pub fn is_in_flight(&self, coordinate: &Coordinate) -> bool {
        self.in_flight.lock().contains(&coordinate.key())
    }

    #[instrument(skip(self, coordinate), fields(coordinate = %coordinate))]
    pub async fn refresh(&self, coordinate: &Coordinate) -> RefreshOutcome {
        let key = coordinate.key();
        self.set_coordinate(coordinate);

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, key) else {
            tracing::debug!("Refresh already in flight, coalescing");
            return RefreshOutcome::Coalesced;
        };

        let preference = self.settings.snapshot().provider_preference;
        let result = match self.dispatcher.fetch(coordinate, preference).await {
            Ok(raw) => {
                let now = (self.clock)();
                normalize(&raw, now)
                    .map(|model| (raw.provider(), model, now))
                    .map_err(RefreshFailure::from)
            }
            Err(e) => Err(RefreshFailure::from(e)),
        };

        if *self.latest.lock() != Some(key) {
            tracing::info!("Discarding superseded refresh result");
            return RefreshOutcome::Superseded;
        }

        let (provider, model, now) = match result {
            Ok(parts) => parts,
            Err(reason) => {
                self.events.emit(CoreEvent::RefreshFailed {
                    location: coordinate.to_string(),
                    reason: reason.to_string(),
                });
                return RefreshOutcome::FailedKeepingStale(reason);
            }
        };

        let previous = self.cache.get_current(coordinate).ok();
        if previous.as_ref().is_some_and(|p| p.model == model) {
            self.events.emit(CoreEvent::RefreshSucceeded {
                location: coordinate.to_string(),
                provider: provider.to_string(),
                changed: false,
            });
            return RefreshOutcome::Unchanged;
        }

        let trends = TrendReport::compute(
            previous.as_deref().map(|p| (&p.model, &p.trends.history)),
            &model,
        );
        self.cache.store(CacheEntry {
            coordinate: *coordinate,
            model,
            fetched_at: now,
            provider,
            trends,
        });
        if let Err(e) = self.cache.persist() {
            tracing::warn!("Failed to persist weather cache: {}", e);
        }

        self.events.emit(CoreEvent::RefreshSucceeded {
            location: coordinate.to_string(),
            provider: provider.to_string(),
            changed: true,
        });
        RefreshOutcome::Updated
    }
}
