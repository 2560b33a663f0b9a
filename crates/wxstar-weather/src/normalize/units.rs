//! Unit conversion into °C, km/h, hPa and %.

const KMH_PER_MPH: f64 = 1.609_344;
const KMH_PER_KNOT: f64 = 1.852;
const KMH_PER_MS: f64 = 3.6;

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Temperature in °C from a value and its WMO unit code (or a bare `F`/`C`).
pub(crate) fn temperature_c(value: f64, unit: Option<&str>) -> f64 {
    let celsius = match unit.map(unit_suffix) {
        Some("degF") | Some("F") => fahrenheit_to_celsius(value),
        Some("K") => value - 273.15,
        _ => value,
    };
    round1(celsius)
}

/// Speed in km/h from a value and its WMO unit code.
pub(crate) fn speed_kmh(value: f64, unit: Option<&str>) -> f64 {
    let kmh = match unit.map(unit_suffix) {
        Some("m_s-1") => value * KMH_PER_MS,
        Some("mi_h-1") | Some("mph") => value * KMH_PER_MPH,
        Some("kt") | Some("knots") => value * KMH_PER_KNOT,
        _ => value,
    };
    round1(kmh)
}

/// Pressure in hPa from a value and its WMO unit code.
pub(crate) fn pressure_hpa(value: f64, unit: Option<&str>) -> f64 {
    let hpa = match unit.map(unit_suffix) {
        Some("Pa") => value / 100.0,
        Some("kPa") => value * 10.0,
        _ => value,
    };
    round1(hpa)
}

/// Parse NWS forecast wind strings such as `"10 mph"` or `"5 to 15 mph"`.
/// Ranges resolve to their upper bound.
pub(crate) fn parse_wind_text(text: &str) -> Option<f64> {
    let max = text
        .split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))?;

    let unit = if text.contains("km/h") {
        None
    } else if text.contains("kt") {
        Some("kt")
    } else {
        Some("mph")
    };
    Some(speed_kmh(max, unit))
}

/// Percentages outside 0..=100 are clamped.
pub(crate) fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn unit_suffix(code: &str) -> &str {
    code.rsplit(':').next().unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_conversion() {
        assert_eq!(temperature_c(72.0, Some("wmoUnit:degF")), 22.2);
        assert_eq!(temperature_c(72.0, Some("F")), 22.2);
        assert_eq!(temperature_c(22.22, Some("wmoUnit:degC")), 22.2);
        assert_eq!(temperature_c(-3.0, None), -3.0);
    }

    #[test]
    fn test_speed_conversion() {
        assert_eq!(speed_kmh(10.0, Some("wmoUnit:m_s-1")), 36.0);
        assert_eq!(speed_kmh(10.0, Some("wmoUnit:km_h-1")), 10.0);
        assert_eq!(speed_kmh(10.0, Some("wmoUnit:kt")), 18.5);
    }

    #[test]
    fn test_pressure_conversion() {
        assert_eq!(pressure_hpa(101_325.0, Some("wmoUnit:Pa")), 1013.3);
        assert_eq!(pressure_hpa(1013.0, Some("hPa")), 1013.0);
    }

    #[test]
    fn test_parse_wind_text() {
        assert_eq!(parse_wind_text("10 mph"), Some(16.1));
        assert_eq!(parse_wind_text("5 to 15 mph"), Some(24.1));
        assert_eq!(parse_wind_text("calm"), None);
    }

    #[test]
    fn test_percent_clamps() {
        assert_eq!(percent(49.6), 50);
        assert_eq!(percent(-4.0), 0);
        assert_eq!(percent(140.0), 100);
    }
}
