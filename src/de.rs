//! Lenient deserializers for backend payloads.
//!
//! The backend serialises database rows straight to JSON, so the same column can
//! arrive as a number or a string, and timestamps come either as naive ISO strings
//! or as UTC instants. Everything is normalised here, once, so the rest of the
//! crate works with plain typed values.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a backend timestamp into local wall-clock time.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Local).naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Parses a date, accepting a full timestamp and keeping its calendar day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date()))
}

pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_timestamp(&s),
        _ => None,
    })
}

pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_date(&s),
        _ => None,
    })
}

fn value_to_id(value: Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_id))
}

/// Required ids still fail loudly when absent or malformed.
pub fn strict_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_id(value.clone())
        .ok_or_else(|| serde::de::Error::custom(format!("expected numeric id, got {value}")))
}

pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "lenient_timestamp")]
        at: Option<NaiveDateTime>,
        #[serde(default, deserialize_with = "lenient_id")]
        id: Option<i64>,
        #[serde(default, deserialize_with = "lenient_string")]
        tin: Option<String>,
    }

    #[test]
    fn test_parse_naive_timestamp() {
        let parsed = parse_timestamp("2024-05-10T09:00:00").unwrap();
        assert_eq!(parsed.to_string(), "2024-05-10 09:00:00");
        assert_eq!(
            parse_timestamp("2024-05-10 18:30").unwrap().to_string(),
            "2024-05-10 18:30:00"
        );
    }

    #[test]
    fn test_parse_garbage_timestamp() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("tomorrow morning").is_none());
    }

    #[test]
    fn test_parse_date_accepts_timestamp() {
        assert_eq!(
            parse_date("2024-02-29T10:15:00"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_date("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert!(parse_date("29.02.2024").is_none());
    }

    #[test]
    fn test_lenient_row() {
        let row: Row =
            serde_json::from_str(r#"{"at": "not a date", "id": "42", "tin": 1234567890}"#).unwrap();
        assert!(row.at.is_none());
        assert_eq!(row.id, Some(42));
        assert_eq!(row.tin.as_deref(), Some("1234567890"));

        let row: Row = serde_json::from_str(r#"{"at": null, "id": 7}"#).unwrap();
        assert!(row.at.is_none());
        assert_eq!(row.id, Some(7));
        assert!(row.tin.is_none());
    }
}
