//! Right ascension / declination parsing
//!
//! Accepts decimal degrees (numeric or string), sexagesimal strings
//! (`10:30:00`, `10h30m00s`, `+20d15m30s`), bare `"ra dec"` pairs,
//! string-encoded list literals, native sequences of pairs, and named
//! mappings. Everything canonicalizes to radians: longitude in
//! [0, 2π), latitude in [-π/2, π/2]. Out-of-range and non-finite input
//! is rejected, never clamped.

use std::f64::consts::PI;

use serde_json::Value;

use crate::literal;

use super::errors::{CoordError, CoordResult};

/// Unit of a cone search radius
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeSearchUnit {
    /// Degrees
    Deg,
    /// Radians
    Rad,
    /// Minutes of arc
    Arcmin,
    /// Seconds of arc
    Arcsec,
}

impl ConeSearchUnit {
    /// Parse a unit name; unknown names are a validation error
    pub fn parse(name: &str) -> CoordResult<Self> {
        match name {
            "deg" => Ok(ConeSearchUnit::Deg),
            "rad" => Ok(ConeSearchUnit::Rad),
            "arcmin" => Ok(ConeSearchUnit::Arcmin),
            "arcsec" => Ok(ConeSearchUnit::Arcsec),
            other => Err(CoordError::UnknownUnit(other.to_string())),
        }
    }

    /// Convert a radius in this unit to radians
    pub fn to_radians(&self, radius: f64) -> f64 {
        match self {
            ConeSearchUnit::Deg => radius * PI / 180.0,
            ConeSearchUnit::Rad => radius,
            ConeSearchUnit::Arcmin => radius * PI / 180.0 / 60.0,
            ConeSearchUnit::Arcsec => radius * PI / 180.0 / 3600.0,
        }
    }
}

/// A named sky position in canonical form
#[derive(Debug, Clone, PartialEq)]
pub struct SkyCoord {
    /// Name used to key results; derived from the input mapping key or
    /// the stringified pair itself. May contain dots, which the executor
    /// replaces before using the name as a store field key.
    pub name: String,
    /// Longitude (right ascension) in radians, [0, 2π)
    pub lon: f64,
    /// Latitude (declination) in radians, [-π/2, π/2]
    pub lat: f64,
    /// Human-readable sexagesimal form, [hms, dms], kept for reporting
    pub radec_str: [String; 2],
}

/// Which axis a value belongs to; selects the sexagesimal convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Ra,
    Dec,
}

/// Parse a coordinate specification into a list of named sky positions.
///
/// A bare textual pair (first non-whitespace character not one of
/// `[`, `(`, `{`) is wrapped into a one-element list before parsing.
pub fn parse_coordinates(raw: &Value) -> CoordResult<Vec<SkyCoord>> {
    match raw {
        Value::String(text) => {
            let text = text.trim();
            let first = text
                .chars()
                .next()
                .ok_or_else(|| CoordError::BadFormat("empty coordinate string".to_string()))?;
            if matches!(first, '[' | '(' | '{') {
                let parsed = literal::parse_literal(text)
                    .map_err(|e| CoordError::BadFormat(e.to_string()))?;
                parse_native(&parsed)
            } else {
                // bare "ra dec" pair, auto-wrapped
                let parts: Vec<&str> = text.split_whitespace().collect();
                if parts.len() != 2 {
                    return Err(CoordError::BadPair(parts.len()));
                }
                let sexagesimal = text.contains(':') || text.contains('s');
                let (ra, dec) = if sexagesimal {
                    (
                        Value::String(parts[0].to_string()),
                        Value::String(parts[1].to_string()),
                    )
                } else {
                    (
                        literal::parse_literal(parts[0])
                            .map_err(|e| CoordError::BadFormat(e.to_string()))?,
                        literal::parse_literal(parts[1])
                            .map_err(|e| CoordError::BadFormat(e.to_string()))?,
                    )
                };
                Ok(vec![build_coord(pair_name(&ra, &dec), &ra, &dec)?])
            }
        }
        other => parse_native(other),
    }
}

fn parse_native(raw: &Value) -> CoordResult<Vec<SkyCoord>> {
    match raw {
        Value::Array(pairs) => pairs
            .iter()
            .map(|pair| {
                let (ra, dec) = split_pair(pair)?;
                build_coord(pair_name(ra, dec), ra, dec)
            })
            .collect(),
        Value::Object(named) => named
            .iter()
            .map(|(name, pair)| {
                let (ra, dec) = split_pair(pair)?;
                build_coord(name.clone(), ra, dec)
            })
            .collect(),
        other => Err(CoordError::BadFormat(format!(
            "unsupported coordinate specification: {}",
            other
        ))),
    }
}

fn split_pair(pair: &Value) -> CoordResult<(&Value, &Value)> {
    match pair {
        Value::Array(items) if items.len() == 2 => Ok((&items[0], &items[1])),
        Value::Array(items) => Err(CoordError::BadPair(items.len())),
        other => Err(CoordError::BadFormat(format!(
            "coordinate pair must be a sequence, got {}",
            other
        ))),
    }
}

fn build_coord(name: String, ra: &Value, dec: &Value) -> CoordResult<SkyCoord> {
    let ra_deg = value_to_deg(ra, Axis::Ra)?;
    let dec_deg = value_to_deg(dec, Axis::Dec)?;
    if !ra_deg.is_finite() {
        return Err(CoordError::NonFinite(format!("{}", ra)));
    }
    if !dec_deg.is_finite() {
        return Err(CoordError::NonFinite(format!("{}", dec)));
    }
    if !(0.0..360.0).contains(&ra_deg) {
        return Err(CoordError::RaOutOfRange(ra_deg));
    }
    if !(-90.0..=90.0).contains(&dec_deg) {
        return Err(CoordError::DecOutOfRange(dec_deg));
    }
    Ok(SkyCoord {
        name,
        lon: ra_deg * PI / 180.0,
        lat: dec_deg * PI / 180.0,
        radec_str: [deg2hms(ra_deg), deg2dms(dec_deg)],
    })
}

/// Render a pair the way the portal has always keyed unnamed objects:
/// the stringified pair itself, strings quoted
fn pair_name(ra: &Value, dec: &Value) -> String {
    fn part(v: &Value) -> String {
        match v {
            Value::String(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }
    format!("({}, {})", part(ra), part(dec))
}

fn value_to_deg(value: &Value, axis: Axis) -> CoordResult<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CoordError::NonFinite(n.to_string())),
        Value::String(text) => {
            let text = text.trim();
            let rewritten = rewrite_letter_form(text, axis);
            if rewritten.contains(':') {
                sexagesimal_to_deg(&rewritten, axis)
            } else {
                text.parse::<f64>()
                    .map_err(|_| CoordError::BadFormat(text.to_string()))
            }
        }
        other => Err(CoordError::BadFormat(format!(
            "coordinate must be a number or string, got {}",
            other
        ))),
    }
}

/// Rewrite `10h30m00s` / `+20d15m30s` into colon-separated form
fn rewrite_letter_form(text: &str, axis: Axis) -> String {
    let (major, minor) = match axis {
        Axis::Ra => ('h', 'm'),
        Axis::Dec => ('d', 'm'),
    };
    if text.contains(major) && text.contains(minor) && text.ends_with('s') {
        text[..text.len() - 1]
            .replace(major, ":")
            .replace(minor, ":")
    } else {
        text.to_string()
    }
}

fn sexagesimal_to_deg(text: &str, axis: Axis) -> CoordResult<f64> {
    let parts: Vec<f64> = text
        .split(':')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| CoordError::BadFormat(text.to_string()))?;
    if parts.len() != 3 {
        return Err(CoordError::BadFormat(text.to_string()));
    }
    match axis {
        Axis::Ra => {
            // hours:minutes:seconds
            Ok((parts[0] + parts[1] / 60.0 + parts[2] / 3600.0) * 15.0)
        }
        Axis::Dec => {
            let sign = if text.trim_start().starts_with('-') {
                -1.0
            } else {
                1.0
            };
            Ok(sign * (parts[0].abs() + parts[1].abs() / 60.0 + parts[2].abs() / 3600.0))
        }
    }
}

/// Format degrees of right ascension as an `hours:minutes:seconds` string
pub fn deg2hms(x: f64) -> String {
    let hours = x * 12.0 / 180.0;
    let h = hours.floor();
    let m = ((hours - h) * 60.0).floor();
    let s = ((hours - h) * 60.0 - m) * 60.0;
    format!("{:02}:{:02}:{:07.4}", h as u32, m as u32, s)
}

/// Format degrees of declination as a `degrees:minutes:seconds` string
pub fn deg2dms(x: f64) -> String {
    let d = x.abs().floor() * x.signum();
    let m = ((x - d).abs() * 60.0).floor();
    let s = ((x - d).abs() * 60.0 - m) * 60.0;
    let sign = if x < 0.0 { "-" } else { "" };
    format!("{}{:02}:{:02}:{:06.3}", sign, d.abs() as u32, m as u32, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOL: f64 = 1e-9;

    #[test]
    fn test_bare_decimal_pair() {
        let coords = parse_coordinates(&json!("10.5 20.3")).unwrap();
        assert_eq!(coords.len(), 1);
        assert_eq!(coords[0].name, "(10.5, 20.3)");
        assert!((coords[0].lon - 10.5_f64.to_radians()).abs() < TOL);
        assert!((coords[0].lat - 20.3_f64.to_radians()).abs() < TOL);
        assert!(coords[0].lon >= 0.0 && coords[0].lon < 2.0 * PI);
        assert!(coords[0].lat.abs() <= PI / 2.0);
    }

    #[test]
    fn test_sexagesimal_matches_decimal() {
        let sexa = parse_coordinates(&json!("10:30:00 +20:15:30")).unwrap();
        let ra_deg = (10.0 + 30.0 / 60.0) * 15.0;
        let dec_deg = 20.0 + 15.0 / 60.0 + 30.0 / 3600.0;
        let decimal = parse_coordinates(&json!(format!("{} {}", ra_deg, dec_deg))).unwrap();
        assert!((sexa[0].lon - decimal[0].lon).abs() < TOL);
        assert!((sexa[0].lat - decimal[0].lat).abs() < TOL);
        assert_eq!(sexa[0].name, "('10:30:00', '+20:15:30')");
    }

    #[test]
    fn test_letter_form_sexagesimal() {
        let a = parse_coordinates(&json!([["10h30m00s", "+20d15m30s"]])).unwrap();
        let b = parse_coordinates(&json!([["10:30:00", "+20:15:30"]])).unwrap();
        assert!((a[0].lon - b[0].lon).abs() < TOL);
        assert!((a[0].lat - b[0].lat).abs() < TOL);
    }

    #[test]
    fn test_negative_declination() {
        let coords = parse_coordinates(&json!([["05:30:00", "-01:30:00"]])).unwrap();
        assert!((coords[0].lat - (-1.5_f64).to_radians()).abs() < TOL);
    }

    #[test]
    fn test_string_list_literal() {
        let coords = parse_coordinates(&json!("[(10.5, 20.3), (11.0, -5.0)]")).unwrap();
        assert_eq!(coords.len(), 2);
        assert_eq!(coords[1].name, "(11.0, -5.0)");
    }

    #[test]
    fn test_named_mapping() {
        let coords =
            parse_coordinates(&json!({"alpha": [10.5, 20.3], "beta": [11.0, -5.0]})).unwrap();
        assert_eq!(coords.len(), 2);
        let names: Vec<&str> = coords.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"alpha"));
        assert!(names.contains(&"beta"));
    }

    #[test]
    fn test_native_pair_list() {
        let coords = parse_coordinates(&json!([[10.5, 20.3]])).unwrap();
        assert_eq!(coords[0].name, "(10.5, 20.3)");
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            parse_coordinates(&json!([[370.0, 20.0]])),
            Err(CoordError::RaOutOfRange(_))
        ));
        assert!(matches!(
            parse_coordinates(&json!([[10.0, 95.0]])),
            Err(CoordError::DecOutOfRange(_))
        ));
    }

    #[test]
    fn test_bad_pair_length() {
        assert!(matches!(
            parse_coordinates(&json!([[10.0, 20.0, 30.0]])),
            Err(CoordError::BadPair(3))
        ));
        assert!(matches!(
            parse_coordinates(&json!("10.5")),
            Err(CoordError::BadPair(1))
        ));
    }

    #[test]
    fn test_unit_conversion_table() {
        let deg_rad = PI / 180.0;
        assert!((ConeSearchUnit::Deg.to_radians(1.0) - deg_rad).abs() < TOL);
        assert!((ConeSearchUnit::Arcmin.to_radians(1.0) - deg_rad / 60.0).abs() < TOL);
        assert!((ConeSearchUnit::Arcsec.to_radians(1.0) - deg_rad / 3600.0).abs() < TOL);
        assert!((ConeSearchUnit::Rad.to_radians(0.5) - 0.5).abs() < TOL);
    }

    #[test]
    fn test_unknown_unit() {
        assert!(matches!(
            ConeSearchUnit::parse("furlong"),
            Err(CoordError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_deg2hms_formats() {
        assert_eq!(deg2hms(157.5), "10:30:00.0000");
        assert_eq!(deg2dms(20.258333333333333), "20:15:30.000");
        assert!(deg2dms(-1.5).starts_with("-01:30:"));
    }
}
