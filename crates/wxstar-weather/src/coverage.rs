//! NWS geographic coverage.

use crate::types::Coordinate;

struct Region {
    name: &'static str,
    lat: (f64, f64),
    lon: (f64, f64),
}

const NWS_REGIONS: [Region; 3] = [
    Region {
        name: "contiguous US",
        lat: (24.0, 49.0),
        lon: (-125.0, -66.0),
    },
    Region {
        name: "Alaska",
        lat: (51.0, 72.0),
        lon: (-180.0, -129.0),
    },
    Region {
        name: "Hawaii",
        lat: (18.0, 23.0),
        lon: (-161.0, -154.0),
    },
];

/// Name of the NWS region containing `coordinate`, if any.
pub fn nws_region(coordinate: &Coordinate) -> Option<&'static str> {
    NWS_REGIONS
        .iter()
        .find(|r| {
            (r.lat.0..=r.lat.1).contains(&coordinate.latitude)
                && (r.lon.0..=r.lon.1).contains(&coordinate.longitude)
        })
        .map(|r| r.name)
}

pub fn nws_covers(coordinate: &Coordinate) -> bool {
    nws_region(coordinate).is_some()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn at(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_us_locations_are_covered() {
        assert_eq!(nws_region(&at(40.7128, -74.0060)), Some("contiguous US"));
        assert_eq!(nws_region(&at(61.2181, -149.9003)), Some("Alaska"));
        assert_eq!(nws_region(&at(21.3069, -157.8583)), Some("Hawaii"));
    }

    #[test]
    fn test_foreign_locations_are_not_covered() {
        assert!(!nws_covers(&at(51.5074, -0.1278)));
        assert!(!nws_covers(&at(-33.8688, 151.2093)));
        assert!(!nws_covers(&at(19.4326, -99.1332)));
    }
}
