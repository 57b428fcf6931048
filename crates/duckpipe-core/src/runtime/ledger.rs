// crates/duckpipe-core/src/runtime/ledger.rs
// ============================================================================
// Module: duckpipe Run Ledger
// Description: The reserved `_duckpipe` warehouse namespace.
// Purpose: Own run history and run state, the sole source of truth for
//          freshness decisions.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The ledger manages two engine-owned tables in the reserved `_duckpipe`
//! schema: an append-only `run_history` log keyed by run id, and a
//! `run_state` row per analysis holding last-run metadata. Both are created
//! on demand. History rows are written *before* a step's SQL runs (status
//! `running`) and updated after it terminates; run state is upserted only at
//! step end.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::core::params::ScalarValue;
use crate::core::result::StepResult;
use crate::core::result::StepStatus;
use crate::core::time::format_warehouse;
use crate::core::time::parse_timestamp;
use crate::interfaces::Warehouse;
use crate::interfaces::WarehouseError;

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Creates the schema holding materialized analysis results.
const CREATE_ANALYSIS_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS analysis";

/// Creates the reserved engine namespace.
const CREATE_LEDGER_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS _duckpipe";

/// Creates the append-only run history table.
const CREATE_RUN_HISTORY: &str = "CREATE TABLE IF NOT EXISTS _duckpipe.run_history (
    run_id TEXT PRIMARY KEY,
    analysis_id TEXT NOT NULL,
    started_at TIMESTAMP NOT NULL,
    finished_at TIMESTAMP,
    status TEXT NOT NULL,
    rows_affected BIGINT,
    error TEXT,
    duration_ms INTEGER,
    params JSON
)";

/// Creates the per-analysis run state table.
const CREATE_RUN_STATE: &str = "CREATE TABLE IF NOT EXISTS _duckpipe.run_state (
    analysis_id TEXT PRIMARY KEY,
    last_run_id TEXT,
    last_run_at TIMESTAMP,
    last_run_status TEXT,
    last_run_error TEXT
)";

/// Reads the last-run timestamp for one analysis.
const SELECT_LAST_RUN_AT: &str =
    "SELECT last_run_at FROM _duckpipe.run_state WHERE analysis_id = $1";

/// Reads the full run-state row for one analysis.
const SELECT_RUN_STATE: &str = "SELECT last_run_id, last_run_at, last_run_status, last_run_error \
     FROM _duckpipe.run_state WHERE analysis_id = $1";

/// Opens a history row for a starting run.
const INSERT_RUN_START: &str = "INSERT INTO _duckpipe.run_history \
     (run_id, analysis_id, started_at, status, params) VALUES ($1, $2, $3, 'running', $4)";

/// Closes a history row for a terminated run.
const UPDATE_RUN_END: &str = "UPDATE _duckpipe.run_history SET finished_at = $1, status = $2, \
     rows_affected = $3, error = $4, duration_ms = $5 WHERE run_id = $6";

/// Upserts the run-state row at step end.
const UPSERT_RUN_STATE: &str = "INSERT INTO _duckpipe.run_state \
     (analysis_id, last_run_id, last_run_at, last_run_status, last_run_error) \
     VALUES ($1, $2, $3, $4, $5) \
     ON CONFLICT (analysis_id) DO UPDATE SET \
     last_run_id = EXCLUDED.last_run_id, \
     last_run_at = EXCLUDED.last_run_at, \
     last_run_status = EXCLUDED.last_run_status, \
     last_run_error = EXCLUDED.last_run_error";

/// Reads the most recent history rows for one analysis.
const SELECT_HISTORY: &str = "SELECT run_id, analysis_id, started_at, finished_at, status, \
     rows_affected, error, duration_ms \
     FROM _duckpipe.run_history WHERE analysis_id = $1 \
     ORDER BY started_at DESC LIMIT $2";

// ============================================================================
// SECTION: Run State Row
// ============================================================================

/// One row of the run-state table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStateRow {
    /// Identifier of the last recorded run.
    pub last_run_id: Option<String>,
    /// When the last run terminated (UTC).
    pub last_run_at: Option<OffsetDateTime>,
    /// Status of the last run.
    pub last_run_status: Option<StepStatus>,
    /// Error message of the last run, when failed.
    pub last_run_error: Option<String>,
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Handle on the reserved engine namespace of one warehouse connection.
pub struct RunLedger<'a> {
    /// Warehouse connection the ledger operates on.
    warehouse: &'a dyn Warehouse,
}

impl<'a> RunLedger<'a> {
    /// Creates a ledger over the given warehouse connection.
    #[must_use]
    pub const fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    /// Idempotently creates the `analysis` schema and the ledger tables.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when a create statement fails.
    pub fn ensure(&self) -> Result<(), WarehouseError> {
        self.warehouse.execute(CREATE_ANALYSIS_SCHEMA, &[])?;
        self.warehouse.execute(CREATE_LEDGER_SCHEMA, &[])?;
        self.warehouse.execute(CREATE_RUN_HISTORY, &[])?;
        self.warehouse.execute(CREATE_RUN_STATE, &[])?;
        Ok(())
    }

    /// Returns when the analysis last ran, or `None` for never-run analyses.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the read fails or the persisted
    /// timestamp cannot be parsed.
    pub fn last_run_at(&self, analysis_id: &str) -> Result<Option<OffsetDateTime>, WarehouseError> {
        let output = self
            .warehouse
            .query(SELECT_LAST_RUN_AT, &[ScalarValue::Text(analysis_id.to_string())])?;
        match output.first_value() {
            None | Some(ScalarValue::Null) => Ok(None),
            Some(value) => timestamp_from(value).map(Some),
        }
    }

    /// Returns the full run-state row for one analysis, if present.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the read fails or a persisted value
    /// cannot be parsed.
    pub fn run_state(&self, analysis_id: &str) -> Result<Option<RunStateRow>, WarehouseError> {
        let output = self
            .warehouse
            .query(SELECT_RUN_STATE, &[ScalarValue::Text(analysis_id.to_string())])?;
        let Some(row) = output.first_row() else {
            return Ok(None);
        };
        Ok(Some(RunStateRow {
            last_run_id: text_at(row, 0),
            last_run_at: optional_timestamp_at(row, 1)?,
            last_run_status: status_at(row, 2)?,
            last_run_error: text_at(row, 3),
        }))
    }

    /// Opens a history row for a starting run (`status = 'running'`).
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the insert fails.
    pub fn begin(
        &self,
        run_id: &str,
        analysis_id: &str,
        started_at: OffsetDateTime,
        params_json: Option<String>,
    ) -> Result<(), WarehouseError> {
        self.warehouse.execute(
            INSERT_RUN_START,
            &[
                ScalarValue::Text(run_id.to_string()),
                ScalarValue::Text(analysis_id.to_string()),
                ScalarValue::Text(render_timestamp(started_at)?),
                params_json.map_or(ScalarValue::Null, ScalarValue::Text),
            ],
        )
    }

    /// Closes a history row and upserts run state at step end.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when either write fails.
    #[allow(clippy::too_many_arguments, reason = "One argument per persisted column.")]
    pub fn finish(
        &self,
        run_id: &str,
        analysis_id: &str,
        status: StepStatus,
        finished_at: OffsetDateTime,
        rows_affected: Option<i64>,
        error: Option<&str>,
        duration_ms: i64,
    ) -> Result<(), WarehouseError> {
        let finished_text = render_timestamp(finished_at)?;
        self.warehouse.execute(
            UPDATE_RUN_END,
            &[
                ScalarValue::Text(finished_text.clone()),
                ScalarValue::Text(status.as_str().to_string()),
                rows_affected.map_or(ScalarValue::Null, ScalarValue::Int),
                error.map_or(ScalarValue::Null, |message| ScalarValue::Text(message.to_string())),
                ScalarValue::Int(duration_ms),
                ScalarValue::Text(run_id.to_string()),
            ],
        )?;
        self.warehouse.execute(
            UPSERT_RUN_STATE,
            &[
                ScalarValue::Text(analysis_id.to_string()),
                ScalarValue::Text(run_id.to_string()),
                ScalarValue::Text(finished_text),
                ScalarValue::Text(status.as_str().to_string()),
                error.map_or(ScalarValue::Null, |message| ScalarValue::Text(message.to_string())),
            ],
        )
    }

    /// Returns the most recent history rows for one analysis, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the read fails or a persisted value
    /// cannot be parsed.
    pub fn history(&self, analysis_id: &str, limit: usize) -> Result<Vec<StepResult>, WarehouseError> {
        let output = self.warehouse.query(
            SELECT_HISTORY,
            &[
                ScalarValue::Text(analysis_id.to_string()),
                ScalarValue::Int(i64::try_from(limit).unwrap_or(i64::MAX)),
            ],
        )?;
        let mut results = Vec::with_capacity(output.rows.len());
        for row in &output.rows {
            results.push(StepResult {
                run_id: text_at(row, 0).unwrap_or_default(),
                analysis_id: text_at(row, 1).unwrap_or_default(),
                started_at: required_timestamp_at(row, 2)?,
                finished_at: optional_timestamp_at(row, 3)?,
                status: status_at(row, 4)?.unwrap_or(StepStatus::Running),
                rows_affected: int_at(row, 5),
                error: text_at(row, 6),
                duration_ms: int_at(row, 7),
            });
        }
        Ok(results)
    }
}

// ============================================================================
// SECTION: Row Helpers
// ============================================================================

/// Renders a timestamp for the warehouse, mapping format failures.
fn render_timestamp(value: OffsetDateTime) -> Result<String, WarehouseError> {
    format_warehouse(value).map_err(|err| WarehouseError::Execution(err.to_string()))
}

/// Parses a scalar cell into a timestamp.
fn timestamp_from(value: &ScalarValue) -> Result<OffsetDateTime, WarehouseError> {
    match value {
        ScalarValue::Text(text) => {
            parse_timestamp(text).map_err(|err| WarehouseError::Execution(err.to_string()))
        }
        other => Err(WarehouseError::Execution(format!(
            "expected a timestamp cell, got {}",
            kind_of(other)
        ))),
    }
}

/// Returns a short label for a scalar kind, for error messages.
const fn kind_of(value: &ScalarValue) -> &'static str {
    match value {
        ScalarValue::Null => "null",
        ScalarValue::Bool(_) => "bool",
        ScalarValue::Int(_) => "int",
        ScalarValue::Float(_) => "float",
        ScalarValue::Text(_) => "text",
    }
}

/// Reads an optional text cell.
fn text_at(row: &[ScalarValue], index: usize) -> Option<String> {
    match row.get(index) {
        Some(ScalarValue::Text(text)) => Some(text.clone()),
        _ => None,
    }
}

/// Reads an optional integer cell.
fn int_at(row: &[ScalarValue], index: usize) -> Option<i64> {
    match row.get(index) {
        Some(ScalarValue::Int(value)) => Some(*value),
        _ => None,
    }
}

/// Reads an optional timestamp cell.
fn optional_timestamp_at(
    row: &[ScalarValue],
    index: usize,
) -> Result<Option<OffsetDateTime>, WarehouseError> {
    match row.get(index) {
        None | Some(ScalarValue::Null) => Ok(None),
        Some(value) => timestamp_from(value).map(Some),
    }
}

/// Reads a required timestamp cell.
fn required_timestamp_at(
    row: &[ScalarValue],
    index: usize,
) -> Result<OffsetDateTime, WarehouseError> {
    match row.get(index) {
        Some(value) if !value.is_null() => timestamp_from(value),
        _ => Err(WarehouseError::Execution(format!("missing timestamp in column {index}"))),
    }
}

/// Reads an optional status cell.
fn status_at(row: &[ScalarValue], index: usize) -> Result<Option<StepStatus>, WarehouseError> {
    match row.get(index) {
        None | Some(ScalarValue::Null) => Ok(None),
        Some(ScalarValue::Text(label)) => match StepStatus::from_label(label) {
            Some(status) => Ok(Some(status)),
            None => Err(WarehouseError::Execution(format!("unknown run status '{label}'"))),
        },
        Some(other) => Err(WarehouseError::Execution(format!(
            "expected a status cell, got {}",
            kind_of(other)
        ))),
    }
}
