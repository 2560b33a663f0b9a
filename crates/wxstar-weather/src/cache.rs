//! Last-good weather model per coordinate.
//!
//! Entries are immutable and shared as `Arc<CacheEntry>`; an update swaps
//! the whole entry under a write lock, so readers see either the old or
//! the new model and never a mix. Only the refresh pipeline writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheMiss};
use crate::trend::TrendReport;
use crate::types::{Coordinate, CoordinateKey, ProviderId, WeatherModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub coordinate: Coordinate,
    pub model: WeatherModel,
    pub fetched_at: DateTime<Utc>,
    pub provider: ProviderId,
    #[serde(default)]
    pub trends: TrendReport,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

#[derive(Debug, Default)]
pub struct WeatherCache {
    entries: RwLock<HashMap<CoordinateKey, Arc<CacheEntry>>>,
    snapshot_path: Option<PathBuf>,
}

impl WeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that mirrors its entries to a JSON file.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            snapshot_path: Some(path.into()),
        }
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Most recent model for `coordinate`. Never touches the network.
    pub fn get_current(&self, coordinate: &Coordinate) -> Result<Arc<CacheEntry>, CacheMiss> {
        self.entries
            .read()
            .get(&coordinate.key())
            .cloned()
            .ok_or(CacheMiss(*coordinate))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn store(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        self.entries
            .write()
            .insert(entry.coordinate.key(), Arc::clone(&entry));
        entry
    }

    /// Load entries from the snapshot file. Returns how many were loaded.
    /// A missing file is not an error.
    pub fn load_snapshot(&self) -> Result<usize, CacheError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(0);
        };
        if !path.exists() {
            return Ok(0);
        }

        let content = std::fs::read_to_string(path)?;
        let loaded: Vec<CacheEntry> = serde_json::from_str(&content)?;
        let count = loaded.len();

        let mut entries = self.entries.write();
        for entry in loaded {
            entries.insert(entry.coordinate.key(), Arc::new(entry));
        }
        tracing::info!(path = %path.display(), count, "Loaded cached weather");
        Ok(count)
    }

    /// Write every entry to the snapshot file, if one is configured.
    pub fn persist(&self) -> Result<(), CacheError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let entries: Vec<CacheEntry> = self
            .entries
            .read()
            .values()
            .map(|e| e.as_ref().clone())
            .collect();
        let content = serde_json::to_string(&entries)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), "Persisted weather cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::types::{CurrentConditions, WeatherCondition};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn entry(lat: f64, temperature: f64) -> CacheEntry {
        let fetched_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        CacheEntry {
            coordinate: Coordinate::new(lat, -74.0).unwrap(),
            model: WeatherModel {
                current: CurrentConditions {
                    temperature,
                    feels_like: None,
                    humidity: None,
                    wind_speed: None,
                    wind_direction: None,
                    pressure: None,
                    condition: WeatherCondition::Cloudy,
                    description: "Cloudy".into(),
                    observed_at: fetched_at.fixed_offset(),
                },
                hourly: vec![],
                daily: vec![],
                alerts: vec![],
                regional: vec![],
                marine: None,
                air_quality: None,
                location_label: Some("Somewhere".into()),
            },
            fetched_at,
            provider: ProviderId::Noaa,
            trends: TrendReport::default(),
        }
    }

    #[test]
    fn test_miss_before_first_store() {
        let cache = WeatherCache::new();
        let coord = Coordinate::new(40.0, -74.0).unwrap();
        assert_eq!(cache.get_current(&coord).unwrap_err(), CacheMiss(coord));
    }

    #[test]
    fn test_store_replaces_whole_entry() {
        let cache = WeatherCache::new();
        let first = cache.store(entry(40.0, 20.0));
        let reader_view = cache.get_current(&first.coordinate).unwrap();

        cache.store(entry(40.0, 25.0));

        // Existing readers keep the entry they already hold.
        assert_eq!(reader_view.model.current.temperature, 20.0);
        let latest = cache.get_current(&first.coordinate).unwrap();
        assert_eq!(latest.model.current.temperature, 25.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_age_and_staleness() {
        let e = entry(40.0, 20.0);
        let later = e.fetched_at + chrono::Duration::minutes(10);
        assert_eq!(e.age(later), Duration::from_secs(600));
        assert!(e.is_stale(later, Duration::from_secs(300)));
        assert!(!e.is_stale(later, Duration::from_secs(900)));
        assert_eq!(e.age(e.fetched_at - chrono::Duration::minutes(1)), Duration::ZERO);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weather_cache.json");

        let cache = WeatherCache::with_snapshot(&path);
        cache.store(entry(40.0, 20.0));
        cache.store(entry(41.0, 18.0));
        cache.persist().unwrap();

        let restored = WeatherCache::with_snapshot(&path);
        assert_eq!(restored.load_snapshot().unwrap(), 2);
        let coord = Coordinate::new(41.0, -74.0).unwrap();
        assert_eq!(*restored.get_current(&coord).unwrap(), entry(41.0, 18.0));
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = WeatherCache::with_snapshot(dir.path().join("absent.json"));
        assert_eq!(cache.load_snapshot().unwrap(), 0);
        assert!(cache.is_empty());
    }
}
