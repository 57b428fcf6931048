// crates/duckpipe-core/src/core/time.rs
// ============================================================================
// Module: duckpipe Time Model
// Description: Canonical UTC timestamp handling for documents and the warehouse.
// Purpose: Keep every persisted timestamp comparable by normalizing to UTC.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! All engine timestamps are UTC [`OffsetDateTime`] values. Analysis documents
//! carry RFC 3339 strings; the warehouse stores naive
//! `YYYY-MM-DD HH:MM:SS.ffffff` values that are assumed to be UTC on read.
//! Freshness comparisons (stale/fresh decisions) only ever happen between
//! values that went through [`parse_timestamp`], so mixed producers cannot
//! skew them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Formats
// ============================================================================

/// Naive timestamp format used at the warehouse boundary.
const WAREHOUSE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");

/// Naive fallback formats accepted when parsing persisted timestamps.
///
/// Covers warehouse renderings with and without fractional seconds and the
/// `T`-separated ISO form some producers emit without an offset.
const NAIVE_FORMATS: [&[BorrowedFormatItem<'static>]; 4] = [
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp formatting and parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// A timestamp could not be rendered to text.
    #[error("failed to format timestamp: {0}")]
    Format(String),
    /// A persisted timestamp could not be parsed.
    #[error("failed to parse timestamp '{0}'")]
    Parse(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current wall-clock time in UTC.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Renders a timestamp in the naive UTC form used at the warehouse boundary.
///
/// # Errors
///
/// Returns [`TimestampError::Format`] when the value cannot be rendered.
pub fn format_warehouse(value: OffsetDateTime) -> Result<String, TimestampError> {
    let utc = value.to_offset(time::UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
        .format(&WAREHOUSE_FORMAT)
        .map_err(|err| TimestampError::Format(err.to_string()))
}

/// Renders a timestamp as an RFC 3339 string (document form).
///
/// # Errors
///
/// Returns [`TimestampError::Format`] when the value cannot be rendered.
pub fn format_rfc3339(value: OffsetDateTime) -> Result<String, TimestampError> {
    value
        .to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|err| TimestampError::Format(err.to_string()))
}

/// Parses a persisted timestamp, normalizing naive values to UTC.
///
/// Accepts RFC 3339 text and the naive warehouse forms; naive values are
/// assumed to already be in UTC.
///
/// # Errors
///
/// Returns [`TimestampError::Parse`] when no accepted form matches.
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime, TimestampError> {
    let trimmed = text.trim();
    if let Ok(value) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(value.to_offset(time::UtcOffset::UTC));
    }
    for format in &NAIVE_FORMATS {
        if let Ok(value) = PrimitiveDateTime::parse(trimmed, format) {
            return Ok(value.assume_utc());
        }
    }
    Err(TimestampError::Parse(trimmed.to_string()))
}

/// Returns the elapsed whole milliseconds between two instants, saturating.
#[must_use]
pub fn elapsed_ms(started_at: OffsetDateTime, finished_at: OffsetDateTime) -> i64 {
    i64::try_from((finished_at - started_at).whole_milliseconds()).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Serde Adapters
// ============================================================================

/// Serde adapter for required timestamps: RFC 3339 out, tolerant in.
pub mod serde_rfc3339 {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error as DeError;
    use serde::ser::Error as SerError;
    use time::OffsetDateTime;

    /// Serializes a timestamp as an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns a serializer error when the value cannot be rendered.
    pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let text = super::format_rfc3339(*value).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    /// Deserializes a timestamp, accepting RFC 3339 and naive UTC forms.
    ///
    /// # Errors
    ///
    /// Returns a deserializer error when no accepted form matches.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::parse_timestamp(&text).map_err(D::Error::custom)
    }
}

/// Serde adapter for optional timestamps: RFC 3339 out, tolerant in.
pub mod serde_rfc3339_option {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error as DeError;
    use serde::ser::Error as SerError;
    use time::OffsetDateTime;

    /// Serializes an optional timestamp as an RFC 3339 string or null.
    ///
    /// # Errors
    ///
    /// Returns a serializer error when the value cannot be rendered.
    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => {
                let text = super::format_rfc3339(*inner).map_err(S::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional timestamp, accepting RFC 3339 and naive forms.
    ///
    /// # Errors
    ///
    /// Returns a deserializer error when a present value matches no form.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        match text {
            Some(inner) => super::parse_timestamp(&inner).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}
