//! Value normalizers for formatted strings.
//!
//! Sources may encode numbers and timestamps as strings that a destination
//! column cannot accept verbatim: integers with a trailing `.0`, or dates
//! before year 1. These helpers bring such values into range.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::error::ConvertError;

/// Earliest timestamp storable by most SQL destinations.
pub const MIN_DATETIME: &str = "0001-01-01T00:00:00Z";
/// Earliest date storable by most SQL destinations.
pub const MIN_DATE: &str = "0001-01-01";

/// Parse an `integer`-formatted string, accepting an all-zero fraction.
///
/// # Errors
///
/// Returns [`ConvertError::NotIntegral`] if the value has a non-zero
/// fractional part or is not numeric.
pub fn str_to_int(value: &str) -> Result<i64, ConvertError> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(n);
    }

    let (whole, fraction) = trimmed
        .split_once('.')
        .ok_or_else(|| ConvertError::NotIntegral(value.to_string()))?;
    if fraction.is_empty() || !fraction.bytes().all(|b| b == b'0') {
        return Err(ConvertError::NotIntegral(value.to_string()));
    }
    whole
        .parse::<i64>()
        .map_err(|_| ConvertError::NotIntegral(value.to_string()))
}

/// Clamp an RFC 3339 timestamp to no earlier than [`MIN_DATETIME`].
///
/// # Errors
///
/// Returns [`ConvertError::Parse`] if the value is not RFC 3339.
pub fn clamp_datetime(value: &str) -> Result<String, ConvertError> {
    let parsed = DateTime::parse_from_rfc3339(value).map_err(|source| ConvertError::Parse {
        value: value.to_string(),
        kind: "date-time",
        source,
    })?;

    if parsed.with_timezone(&Utc).year() < 1 {
        return Ok(MIN_DATETIME.to_string());
    }
    Ok(value.to_string())
}

/// Clamp a `YYYY-MM-DD` date to no earlier than [`MIN_DATE`].
///
/// # Errors
///
/// Returns [`ConvertError::Parse`] if the value is not a valid date.
pub fn clamp_date(value: &str) -> Result<String, ConvertError> {
    let parsed =
        NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| ConvertError::Parse {
            value: value.to_string(),
            kind: "date",
            source,
        })?;

    if parsed.year() < 1 {
        return Ok(MIN_DATE.to_string());
    }
    Ok(value.to_string())
}
