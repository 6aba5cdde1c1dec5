//! Attribute helpers.
//!
//! XML attributes arrive as strings, but a tree produced by a JSON-native
//! service may carry numbers or booleans. The deserializers here accept
//! either and normalise to `String`; the `parse_*` functions then interpret
//! the text with the attribute name attached to any error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{EnvelopeError, EnvelopeResult};

fn scalar_to_string<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(E::custom(format!("expected a scalar attribute, got {}", other))),
    }
}

/// Deserialize a required scalar attribute as text.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(value)?.ok_or_else(|| serde::de::Error::custom("attribute is null"))
}

/// Deserialize an optional scalar attribute as text.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(value)
}

/// Reject empty (or whitespace-only) required attributes.
pub fn non_empty<'a>(element: &str, attribute: &str, value: &'a str) -> EnvelopeResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EnvelopeError::missing_attribute(element, attribute));
    }
    Ok(trimmed)
}

fn invalid(attribute: &str, value: &str, reason: impl ToString) -> EnvelopeError {
    EnvelopeError::InvalidAttribute {
        attribute: attribute.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse an unsigned integer attribute (person ids, job counters).
pub fn parse_u64(attribute: &str, value: &str) -> EnvelopeResult<u64> {
    value.trim().parse::<u64>().map_err(|e| invalid(attribute, value, e))
}

/// Parse a counter attribute that must fit in `u32`.
pub fn parse_u32(attribute: &str, value: &str) -> EnvelopeResult<u32> {
    value.trim().parse::<u32>().map_err(|e| invalid(attribute, value, e))
}

/// Parse a mark. Marks are finite, non-negative decimals.
pub fn parse_mark(attribute: &str, value: &str) -> EnvelopeResult<f64> {
    let mark = value.trim().parse::<f64>().map_err(|e| invalid(attribute, value, e))?;
    if !mark.is_finite() || mark < 0.0 {
        return Err(invalid(attribute, value, "mark must be a finite, non-negative number"));
    }
    Ok(mark)
}

/// Parse an archival timestamp.
///
/// Accepts RFC 3339 (`2018-11-20T19:12:06+01:00`), the space-separated
/// variant the service emits (`2018-11-20 19:12:06+01`), and a bare
/// `YYYY-MM-DD HH:MM:SS` read as UTC.
pub fn parse_timestamp(attribute: &str, value: &str) -> EnvelopeResult<DateTime<Utc>> {
    let text = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    let with_t = text.replacen(' ', "T", 1);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&with_t) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Short numeric offsets such as "+01" are padded to "+01:00".
    if let Some(pos) = with_t.rfind(['+', '-']) {
        let (stamp, offset) = with_t.split_at(pos);
        if stamp.contains('T') && offset.len() == 3 {
            let padded = format!("{}{}:00", stamp, offset);
            if let Ok(dt) = DateTime::parse_from_rfc3339(&padded) {
                return Ok(dt.with_timezone(&Utc));
            }
        }
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| invalid(attribute, value, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_mark() {
        assert_eq!(parse_mark("mark", "0.6").unwrap(), 0.6);
        assert_eq!(parse_mark("mark", " 1 ").unwrap(), 1.0);
        assert!(parse_mark("mark", "-2").is_err());
        assert!(parse_mark("mark", "NaN").is_err());
        assert!(parse_mark("mark", "excellent").is_err());
    }

    #[test]
    fn test_parse_counters() {
        assert_eq!(parse_u64("personid", "45").unwrap(), 45);
        assert_eq!(parse_u32("totaljobs", "3").unwrap(), 3);
        assert!(parse_u32("totaljobs", "three").is_err());
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let rfc = parse_timestamp("archived", "2018-11-20T19:12:06+01:00").unwrap();
        assert_eq!(rfc.hour(), 18);

        let spaced = parse_timestamp("archived", "2018-11-20 19:12:06+01").unwrap();
        assert_eq!(spaced, rfc);

        let naive = parse_timestamp("archived", "2018-11-20 19:12:06").unwrap();
        assert_eq!(naive.day(), 20);
        assert_eq!(naive.hour(), 19);

        assert!(parse_timestamp("archived", "yesterday").is_err());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("job", "jobid", " j1 ").unwrap(), "j1");
        assert!(matches!(
            non_empty("job", "jobid", "  "),
            Err(EnvelopeError::MissingAttribute { .. })
        ));
    }
}
