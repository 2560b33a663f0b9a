use std::path::PathBuf;

use clap::Parser;
use wxstar_core::LocationConfig;
use wxstar_weather::{Coordinate, LocationError};

#[derive(Debug, Parser, Clone)]
#[command(name = "wxstar", about = "Retro weather channel display", version)]
pub struct Cli {
    /// Latitude of the station (requires --lon)
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of the station (requires --lat)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Path to config.toml
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "wxstar_weather=trace"
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// A coordinate given on the command line beats one from the config
    /// file. `None` means the location should be looked up.
    pub fn manual_coordinate(
        &self,
        location: &LocationConfig,
    ) -> Result<Option<Coordinate>, LocationError> {
        let manual = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => location.manual(),
        };
        manual
            .map(|(lat, lon)| Coordinate::new(lat, lon))
            .transpose()
    }
}

pub fn fallback_coordinate(location: &LocationConfig) -> Result<Coordinate, LocationError> {
    Coordinate::new(location.fallback_latitude, location.fallback_longitude)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_parse_coordinates() {
        let cli = Cli::try_parse_from(["wxstar", "--lat", "40.7128", "--lon", "-74.006"]).unwrap();
        let coord = cli
            .manual_coordinate(&LocationConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(coord, Coordinate::new(40.7128, -74.006).unwrap());
    }

    #[test]
    fn test_lat_requires_lon() {
        assert!(Cli::try_parse_from(["wxstar", "--lat", "40.0"]).is_err());
    }

    #[test]
    fn test_config_coordinate_used_without_flags() {
        let cli = Cli::try_parse_from(["wxstar"]).unwrap();
        let location = LocationConfig {
            latitude: Some(51.5),
            longitude: Some(-0.12),
            ..LocationConfig::default()
        };
        assert_eq!(
            cli.manual_coordinate(&location).unwrap(),
            Some(Coordinate::new(51.5, -0.12).unwrap())
        );
        assert_eq!(cli.manual_coordinate(&LocationConfig::default()).unwrap(), None);
    }

    #[test]
    fn test_out_of_range_coordinate_rejected() {
        let cli = Cli::try_parse_from(["wxstar", "--lat", "95", "--lon", "0"]).unwrap();
        assert!(matches!(
            cli.manual_coordinate(&LocationConfig::default()),
            Err(LocationError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_fallback_is_orlando() {
        let coord = fallback_coordinate(&LocationConfig::default()).unwrap();
        assert_eq!(coord, Coordinate::new(28.5383, -81.3792).unwrap());
    }
}
