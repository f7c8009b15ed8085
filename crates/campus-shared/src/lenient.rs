//! Field-level deserializers for a backend whose JSON shapes drift.
//!
//! Ids arrive as numbers or strings, timestamps with or without a zone,
//! counters occasionally as strings.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::error::DecodeError;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
}

/// Accepts a string or a number and yields its string form.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Int(n) => n.to_string(),
        Scalar::Uint(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Text(s) => s,
    })
}

/// Accepts an integer or a numeric string.
pub fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(n) => Ok(n),
        Scalar::Uint(n) => i64::try_from(n).map_err(de::Error::custom),
        Scalar::Float(n) if n.fract() == 0.0 => Ok(n as i64),
        Scalar::Float(n) => Err(de::Error::custom(format!("not an integer: {n}"))),
        Scalar::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

/// Counter that must end up in `0..=u32::MAX`. Garbage reads as zero.
pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Scalar>::deserialize(deserializer).unwrap_or(None);
    Ok(clamp_count(raw.map(scalar_to_i64).unwrap_or(0)))
}

fn scalar_to_i64(scalar: Scalar) -> i64 {
    match scalar {
        Scalar::Int(n) => n,
        Scalar::Uint(n) => i64::try_from(n).unwrap_or(i64::MAX),
        Scalar::Float(n) if n.is_finite() => n as i64,
        Scalar::Float(_) => 0,
        Scalar::Text(s) => s.trim().parse().unwrap_or(0),
    }
}

/// Clamp a raw server counter into the displayable range.
pub fn clamp_count(raw: i64) -> u32 {
    raw.clamp(0, i64::from(u32::MAX)) as u32
}

pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s).map_err(de::Error::custom)
}

pub fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => parse_timestamp(&s).map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

/// Parse RFC 3339, falling back to naive ISO-8601 read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DecodeError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(DecodeError::InvalidTimestamp(s.to_string()))
}
