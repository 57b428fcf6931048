// crates/duckpipe-core/src/core/params.rs
// ============================================================================
// Module: duckpipe Parameter Model
// Description: Parameter definitions, caller-supplied values, bound scalars.
// Purpose: Type the values that flow from callers through SQL compilation
//          into positional warehouse bindings.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Analyses declare parameters; callers supply values at compile time; the
//! compiler flattens them into a positional [`ScalarValue`] list bound to
//! `$N` markers. [`ParamValue`] is the caller-facing shape (scalar or list),
//! [`ScalarValue`] the warehouse-facing one. Declared parameter types drive
//! [`ParameterDef::coerce`], which turns raw text (CLI arguments, form
//! fields) into typed values; date and datetime inputs normalize to
//! ISO-8601 text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::macros::format_description;

use crate::core::time::format_rfc3339;
use crate::core::time::parse_timestamp;
use crate::errors::PipelineError;

// ============================================================================
// SECTION: Scalar Values
// ============================================================================

/// A single positional value bound to a `$N` marker.
///
/// # Invariants
/// - Wire form is the plain JSON/YAML scalar (untagged).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit integer value.
    Int(i64),
    /// Double-precision float value.
    Float(f64),
    /// Text value (also carries ISO-8601 dates and datetimes).
    Text(String),
}

impl ScalarValue {
    /// Returns the text payload when this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the integer payload when this is an integer value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns true for SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

// ============================================================================
// SECTION: Caller Values
// ============================================================================

/// A caller-supplied parameter value: a scalar or a flat list of scalars.
///
/// Lists expand to a parenthesized marker group at bind time; nesting is
/// ruled out by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Single scalar value.
    Scalar(ScalarValue),
    /// Flat list of scalar values.
    List(Vec<ScalarValue>),
}

impl ParamValue {
    /// Convenience constructor for a text scalar.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(ScalarValue::Text(value.into()))
    }

    /// Convenience constructor for an integer scalar.
    #[must_use]
    pub const fn int(value: i64) -> Self {
        Self::Scalar(ScalarValue::Int(value))
    }
}

/// Caller-supplied parameter values keyed by parameter name.
pub type ParamMap = BTreeMap<String, ParamValue>;

// ============================================================================
// SECTION: Parameter Definitions
// ============================================================================

/// Declared type of an Analysis parameter.
///
/// # Invariants
/// - Wire labels are stable (`string`, `int`, `float`, `date`, `datetime`,
///   `list`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Free-form text.
    #[default]
    String,
    /// 64-bit integer.
    Int,
    /// Double-precision float.
    Float,
    /// Calendar date (ISO-8601 `YYYY-MM-DD`).
    Date,
    /// Date and time (ISO-8601).
    Datetime,
    /// Flat list of scalars.
    List,
}

/// Declared parameter of an Analysis.
///
/// # Invariants
/// - `name` is unique within one Analysis and uses SQL identifier characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name, referenced as `:name` in SQL.
    pub name: String,
    /// Declared type used when coercing raw caller input.
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    /// Optional default value, surfaced to callers but never auto-bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Date-only format accepted for `date` parameters.
const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

impl ParameterDef {
    /// Coerces raw text input into a typed value per the declared type.
    ///
    /// List input is comma-separated; each element is coerced to the
    /// narrowest matching scalar. Date and datetime input normalizes to
    /// ISO-8601 text.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Parameter`] when the input does not match
    /// the declared type.
    pub fn coerce(&self, raw: &str) -> Result<ParamValue, PipelineError> {
        match self.param_type {
            ParamType::String => Ok(ParamValue::text(raw)),
            ParamType::Int => raw
                .trim()
                .parse::<i64>()
                .map(ParamValue::int)
                .map_err(|_| self.mismatch(raw, "an integer")),
            ParamType::Float => raw
                .trim()
                .parse::<f64>()
                .map(|value| ParamValue::Scalar(ScalarValue::Float(value)))
                .map_err(|_| self.mismatch(raw, "a float")),
            ParamType::Date => time::Date::parse(raw.trim(), &DATE_FORMAT)
                .map(|_| ParamValue::text(raw.trim()))
                .map_err(|_| self.mismatch(raw, "an ISO-8601 date")),
            ParamType::Datetime => parse_timestamp(raw)
                .map_err(|_| self.mismatch(raw, "an ISO-8601 datetime"))
                .and_then(|value| {
                    format_rfc3339(value).map(ParamValue::text).map_err(|err| {
                        PipelineError::Parameter {
                            param_name: self.name.clone(),
                            message: err.to_string(),
                        }
                    })
                }),
            ParamType::List => Ok(ParamValue::List(
                raw.split(',').map(|item| infer_scalar(item.trim())).collect(),
            )),
        }
    }

    /// Builds the type-mismatch error for this parameter.
    fn mismatch(&self, raw: &str, expected: &str) -> PipelineError {
        PipelineError::Parameter {
            param_name: self.name.clone(),
            message: format!("expected {expected}, got '{raw}'"),
        }
    }
}

/// Parses a list element into the narrowest matching scalar.
fn infer_scalar(raw: &str) -> ScalarValue {
    if let Ok(value) = raw.parse::<i64>() {
        return ScalarValue::Int(value);
    }
    if let Ok(value) = raw.parse::<f64>() {
        return ScalarValue::Float(value);
    }
    ScalarValue::Text(raw.to_string())
}
