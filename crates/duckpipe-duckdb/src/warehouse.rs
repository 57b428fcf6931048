// crates/duckpipe-duckdb/src/warehouse.rs
// ============================================================================
// Module: DuckDB Warehouse
// Description: Warehouse implementation over an embedded DuckDB connection.
// Purpose: Execute engine statements with positional bindings and map result
//          cells into engine scalars.
// Dependencies: duckdb, duckpipe-core, time
// ============================================================================

//! ## Overview
//! [`DuckDbWarehouse`] wraps a [`duckdb::Connection`] behind the engine's
//! `Warehouse` trait. Statements without bindings run through
//! `execute_batch` (which tolerates statements that return rows, such as
//! `COPY`); parameterized statements are prepared and drained. Result cells
//! map onto engine scalars: temporal values become ISO text normalized to
//! UTC, decimals become text, and non-scalar cells (lists, structs, blobs)
//! surface as NULL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use duckdb::Connection;
use duckdb::params_from_iter;
use duckdb::types::TimeUnit;
use duckdb::types::Value;
use duckpipe_core::QueryOutput;
use duckpipe_core::ScalarValue;
use duckpipe_core::Warehouse;
use duckpipe_core::WarehouseError;
use duckpipe_core::core::time::format_warehouse;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Warehouse
// ============================================================================

/// Warehouse backed by an embedded DuckDB database.
///
/// # Invariants
/// - One statement per call; DuckDB's implicit transaction per statement.
/// - The wrapped connection is used from one thread at a time.
pub struct DuckDbWarehouse {
    /// The wrapped DuckDB connection.
    connection: Connection,
}

impl DuckDbWarehouse {
    /// Opens a database file, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Connection`] when the database cannot be
    /// opened.
    pub fn open(path: &Path) -> Result<Self, WarehouseError> {
        Connection::open(path)
            .map(|connection| Self { connection })
            .map_err(|err| WarehouseError::Connection(err.to_string()))
    }

    /// Opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Connection`] when the database cannot be
    /// opened.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        Connection::open_in_memory()
            .map(|connection| Self { connection })
            .map_err(|err| WarehouseError::Connection(err.to_string()))
    }
}

impl Warehouse for DuckDbWarehouse {
    fn execute(&self, sql: &str, params: &[ScalarValue]) -> Result<(), WarehouseError> {
        if params.is_empty() {
            return self
                .connection
                .execute_batch(sql)
                .map_err(|err| WarehouseError::Execution(err.to_string()));
        }
        let bound: Vec<Value> = params.iter().map(to_duckdb_value).collect();
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|err| WarehouseError::Execution(err.to_string()))?;
        let mut rows = statement
            .query(params_from_iter(bound))
            .map_err(|err| WarehouseError::Execution(err.to_string()))?;
        while rows
            .next()
            .map_err(|err| WarehouseError::Execution(err.to_string()))?
            .is_some()
        {}
        Ok(())
    }

    fn query(&self, sql: &str, params: &[ScalarValue]) -> Result<QueryOutput, WarehouseError> {
        let bound: Vec<Value> = params.iter().map(to_duckdb_value).collect();
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|err| WarehouseError::Execution(err.to_string()))?;
        let mut rows = statement
            .query(params_from_iter(bound))
            .map_err(|err| WarehouseError::Execution(err.to_string()))?;

        let mut output = QueryOutput::default();
        while let Some(row) =
            rows.next().map_err(|err| WarehouseError::Execution(err.to_string()))?
        {
            if output.columns.is_empty() {
                output.columns = row
                    .as_ref()
                    .column_names()
                    .into_iter()
                    .map(|name| name.to_string())
                    .collect();
            }
            let mut values = Vec::with_capacity(output.columns.len());
            for index in 0 .. output.columns.len() {
                let cell: Value = row
                    .get(index)
                    .map_err(|err| WarehouseError::Execution(err.to_string()))?;
                values.push(from_duckdb_value(cell));
            }
            output.rows.push(values);
        }
        Ok(output)
    }
}

// ============================================================================
// SECTION: Value Mapping
// ============================================================================

/// Maps an engine scalar onto a DuckDB value.
fn to_duckdb_value(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Null => Value::Null,
        ScalarValue::Bool(inner) => Value::Boolean(*inner),
        ScalarValue::Int(inner) => Value::BigInt(*inner),
        ScalarValue::Float(inner) => Value::Double(*inner),
        ScalarValue::Text(inner) => Value::Text(inner.clone()),
    }
}

/// Maps a DuckDB result cell onto an engine scalar.
///
/// Temporal cells render as ISO text in UTC; decimals and out-of-range
/// integers render as text; non-scalar cells surface as NULL.
fn from_duckdb_value(value: Value) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Null,
        Value::Boolean(inner) => ScalarValue::Bool(inner),
        Value::TinyInt(inner) => ScalarValue::Int(i64::from(inner)),
        Value::SmallInt(inner) => ScalarValue::Int(i64::from(inner)),
        Value::Int(inner) => ScalarValue::Int(i64::from(inner)),
        Value::BigInt(inner) => ScalarValue::Int(inner),
        Value::UTinyInt(inner) => ScalarValue::Int(i64::from(inner)),
        Value::USmallInt(inner) => ScalarValue::Int(i64::from(inner)),
        Value::UInt(inner) => ScalarValue::Int(i64::from(inner)),
        Value::UBigInt(inner) => match i64::try_from(inner) {
            Ok(fits) => ScalarValue::Int(fits),
            Err(_) => ScalarValue::Text(inner.to_string()),
        },
        Value::HugeInt(inner) => match i64::try_from(inner) {
            Ok(fits) => ScalarValue::Int(fits),
            Err(_) => ScalarValue::Text(inner.to_string()),
        },
        Value::Float(inner) => ScalarValue::Float(f64::from(inner)),
        Value::Double(inner) => ScalarValue::Float(inner),
        Value::Decimal(inner) => ScalarValue::Text(inner.to_string()),
        Value::Timestamp(unit, raw) => timestamp_text(unit, raw),
        Value::Date32(days) => date_text(days),
        Value::Time64(unit, raw) => time_text(unit, raw),
        Value::Text(inner) => ScalarValue::Text(inner),
        Value::Enum(inner) => ScalarValue::Text(inner),
        _ => ScalarValue::Null,
    }
}

/// Renders a timestamp cell as naive UTC text.
fn timestamp_text(unit: TimeUnit, raw: i64) -> ScalarValue {
    let nanos = match unit {
        TimeUnit::Second => i128::from(raw) * 1_000_000_000,
        TimeUnit::Millisecond => i128::from(raw) * 1_000_000,
        TimeUnit::Microsecond => i128::from(raw) * 1_000,
        TimeUnit::Nanosecond => i128::from(raw),
    };
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|stamp| format_warehouse(stamp).ok())
        .map_or(ScalarValue::Null, ScalarValue::Text)
}

/// Julian day number of the Unix epoch.
const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

/// Renders a date cell as ISO text.
fn date_text(days: i32) -> ScalarValue {
    days.checked_add(UNIX_EPOCH_JULIAN_DAY)
        .and_then(|julian| time::Date::from_julian_day(julian).ok())
        .map_or(ScalarValue::Null, |date| ScalarValue::Text(date.to_string()))
}

/// Renders a time-of-day cell as `HH:MM:SS.ffffff` text.
fn time_text(unit: TimeUnit, raw: i64) -> ScalarValue {
    let micros = match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    if micros < 0 {
        return ScalarValue::Null;
    }
    let seconds_total = micros / 1_000_000;
    let fraction = micros % 1_000_000;
    let hours = seconds_total / 3_600;
    let minutes = (seconds_total / 60) % 60;
    let seconds = seconds_total % 60;
    ScalarValue::Text(format!("{hours:02}:{minutes:02}:{seconds:02}.{fraction:06}"))
}
