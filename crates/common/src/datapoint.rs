use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One metric observation as it arrives from the metrics stream.
///
/// Timestamps are normalized to epoch milliseconds on decode; `value` stays
/// optional because producers may report a datapoint without one (it then
/// counts for `count` aggregation but contributes nothing to the others).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDatapoint {
    pub name: String,
    pub dimensions: HashMap<String, String>,
    pub timestamp_ms: i64,
    pub value: Option<f64>,
}

#[derive(Debug)]
pub enum DecodeError {
    Json(String),
    EmptyName,
    Timestamp(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "json: {e}"),
            Self::EmptyName => write!(f, "empty metric name"),
            Self::Timestamp(t) => write!(f, "bad timestamp: {t}"),
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Deserialize)]
struct RawDatapoint {
    name: String,
    #[serde(default)]
    dimensions: HashMap<String, String>,
    timestamp: RawTimestamp,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Epoch(f64),
    Iso(String),
}

// Epoch values >= 1e12 are already milliseconds; smaller ones are seconds.
fn timestamp_ms(raw: &RawTimestamp) -> Result<i64, DecodeError> {
    match raw {
        RawTimestamp::Epoch(v) => {
            if !v.is_finite() {
                return Err(DecodeError::Timestamp(v.to_string()));
            }
            if v.abs() >= 1e12 {
                Ok(*v as i64)
            } else {
                Ok((v * 1000.0) as i64)
            }
        }
        RawTimestamp::Iso(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.timestamp_millis());
            }
            // Producers that drop the offset are treated as UTC.
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|dt| dt.and_utc().timestamp_millis())
                .map_err(|_| DecodeError::Timestamp(s.clone()))
        }
    }
}

pub fn decode_datapoint(json: &str) -> Result<MetricDatapoint, DecodeError> {
    let raw: RawDatapoint =
        serde_json::from_str(json).map_err(|e| DecodeError::Json(e.to_string()))?;
    if raw.name.is_empty() {
        return Err(DecodeError::EmptyName);
    }
    let timestamp_ms = timestamp_ms(&raw.timestamp)?;
    Ok(MetricDatapoint {
        name: raw.name,
        dimensions: raw.dimensions,
        timestamp_ms,
        value: raw.value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_epoch_seconds() {
        let dp = decode_datapoint(
            r#"{"name":"cpu","dimensions":{"host":"h1"},"timestamp":1700000000,"value":42.5}"#,
        )
        .unwrap();
        assert_eq!(dp.name, "cpu");
        assert_eq!(dp.timestamp_ms, 1_700_000_000_000);
        assert_eq!(dp.value, Some(42.5));
        assert_eq!(dp.dimensions.get("host").unwrap(), "h1");
    }

    #[test]
    fn decode_epoch_millis() {
        let dp =
            decode_datapoint(r#"{"name":"cpu","timestamp":1700000000000,"value":1}"#).unwrap();
        assert_eq!(dp.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn decode_iso8601() {
        let dp = decode_datapoint(
            r#"{"name":"cpu","timestamp":"2023-11-14T22:13:20Z","value":1.0}"#,
        )
        .unwrap();
        assert_eq!(dp.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn decode_iso8601_without_offset() {
        let dp =
            decode_datapoint(r#"{"name":"cpu","timestamp":"2023-11-14T22:13:20"}"#).unwrap();
        assert_eq!(dp.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn missing_value_is_none_not_zero() {
        let dp = decode_datapoint(r#"{"name":"cpu","timestamp":1700000000}"#).unwrap();
        assert_eq!(dp.value, None);
    }

    #[test]
    fn unicode_names_and_dimensions() {
        let dp = decode_datapoint(
            r#"{"name":"-_.千幸福的笑脸","dimensions":{"घोड़ा":"馬"},"timestamp":1700000000,"value":5}"#,
        )
        .unwrap();
        assert_eq!(dp.name, "-_.千幸福的笑脸");
        assert_eq!(dp.dimensions.get("घोड़ा").unwrap(), "馬");
    }

    #[test]
    fn missing_timestamp_is_error() {
        assert!(decode_datapoint(r#"{"name":"cpu","value":1}"#).is_err());
    }

    #[test]
    fn bad_timestamp_string_is_error() {
        let err = decode_datapoint(r#"{"name":"cpu","timestamp":"not-a-time"}"#).unwrap_err();
        assert!(err.to_string().contains("bad timestamp"));
    }

    #[test]
    fn garbage_is_error() {
        assert!(decode_datapoint("{not json").is_err());
    }
}
