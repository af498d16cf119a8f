//! Duration string grammar for TTLs and timeouts.
//!
//! Accepts compound forms like `10ms`, `30s`, `90m`, `2h30m`, `1d`.
//! Formatting picks the largest exact unit so `parse(format(d)) == d`.

use std::time::Duration;

use crate::error::{Error, Result};

const UNITS: &[(&str, u64)] = &[
    ("ms", 1),
    ("s", 1_000),
    ("m", 60_000),
    ("h", 3_600_000),
    ("d", 86_400_000),
];

/// Parse a duration string like `"30s"`, `"1h"`, or `"2h30m"`.
///
/// # Errors
///
/// Returns `Error::Other` when the string is empty, has an unknown unit,
/// or a segment lacks a numeric part.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::Other("empty duration".to_string()));
    }

    let mut total_ms: u64 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| Error::Other(format!("duration missing unit: {s:?}")))?;
        if digits_end == 0 {
            return Err(Error::Other(format!("invalid duration: {s:?}")));
        }
        let value: u64 = rest[..digits_end]
            .parse()
            .map_err(|_| Error::Other(format!("invalid duration: {s:?}")))?;
        rest = &rest[digits_end..];

        // Longest unit match first so "ms" is not read as "m".
        let (unit, scale) = UNITS
            .iter()
            .filter(|(u, _)| rest.starts_with(*u))
            .max_by_key(|(u, _)| u.len())
            .ok_or_else(|| Error::Other(format!("unknown duration unit in {s:?}")))?;
        rest = &rest[unit.len()..];

        total_ms = total_ms
            .checked_add(value.saturating_mul(*scale))
            .ok_or_else(|| Error::Other(format!("duration overflow: {s:?}")))?;
    }

    Ok(Duration::from_millis(total_ms))
}

/// Format a duration back into the compound grammar.
pub fn format_duration(d: Duration) -> String {
    let mut ms = d.as_millis() as u64;
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, scale) in UNITS.iter().rev() {
        if ms >= *scale {
            let n = ms / scale;
            ms %= scale;
            out.push_str(&n.to_string());
            out.push_str(unit);
        }
    }
    out
}

/// Serde adapter: durations as grammar strings in JSON documents.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("10ms").unwrap(), Duration::from_millis(10));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(
            parse_duration("2h30m").unwrap(),
            Duration::from_secs(2 * 3600 + 30 * 60)
        );
        assert_eq!(
            parse_duration("1m30s").unwrap(),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("ten seconds").is_err());
    }

    #[test]
    fn test_format_picks_largest_units() {
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_millis(10)), "10ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn test_round_trip() {
        for s in ["10ms", "30s", "1m30s", "1h", "24h", "2h30m"] {
            let d = parse_duration(s).unwrap();
            assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
    }
}
