// crates/duckpipe-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for duckpipe-core tests.
// Purpose: Provide a scripted warehouse double and analysis builders for
//          planner, executor, and facade tests.
// Dependencies: duckpipe-core
// ============================================================================

//! ## Overview
//! Provides a scripted [`Warehouse`] double that recognizes the engine's
//! ledger statements: run-state reads answer from a canned map, run-state
//! upserts update it, and failures can be injected by SQL substring. All
//! other statements are recorded and succeed.

#![allow(
    dead_code,
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only helpers shared across test binaries."
)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use duckpipe_core::Analysis;
use duckpipe_core::Materialization;
use duckpipe_core::QueryOutput;
use duckpipe_core::ScalarValue;
use duckpipe_core::Warehouse;
use duckpipe_core::WarehouseError;

/// Mutable state behind the mock warehouse.
#[derive(Debug, Default)]
struct MockState {
    executed: Vec<(String, Vec<ScalarValue>)>,
    queried: Vec<(String, Vec<ScalarValue>)>,
    run_state: BTreeMap<String, String>,
    existing_tables: BTreeSet<String>,
    fail_contains: Vec<String>,
    history_rows: Vec<Vec<ScalarValue>>,
    preview_output: Option<QueryOutput>,
    count_value: i64,
}

/// Scripted warehouse double for unit tests.
#[derive(Debug, Default)]
pub struct MockWarehouse {
    state: RefCell<MockState>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a run-state row (`last_run_at` as naive UTC text).
    pub fn with_run_state(self, analysis_id: &str, last_run_at: &str) -> Self {
        self.state
            .borrow_mut()
            .run_state
            .insert(analysis_id.to_string(), last_run_at.to_string());
        self
    }

    /// Marks a table as existing for `SELECT 1 FROM <t> LIMIT 0` probes.
    pub fn with_table(self, table: &str) -> Self {
        self.state.borrow_mut().existing_tables.insert(table.to_string());
        self
    }

    /// Injects a failure for statements containing the given fragment.
    pub fn fail_when(self, fragment: &str) -> Self {
        self.state.borrow_mut().fail_contains.push(fragment.to_string());
        self
    }

    /// Seeds one canned history row (eight ledger columns).
    pub fn with_history_row(self, row: Vec<ScalarValue>) -> Self {
        self.state.borrow_mut().history_rows.push(row);
        self
    }

    /// Seeds the output returned for unrecognized SELECT statements.
    pub fn with_preview_output(self, output: QueryOutput) -> Self {
        self.state.borrow_mut().preview_output = Some(output);
        self
    }

    /// Sets the value answered to `SELECT COUNT(*)` probes.
    pub fn with_count(self, count: i64) -> Self {
        self.state.borrow_mut().count_value = count;
        self
    }

    /// Returns every executed statement.
    pub fn executed(&self) -> Vec<(String, Vec<ScalarValue>)> {
        self.state.borrow().executed.clone()
    }

    /// Returns every queried statement.
    pub fn queried(&self) -> Vec<(String, Vec<ScalarValue>)> {
        self.state.borrow().queried.clone()
    }

    /// Counts executed statements containing the given fragment.
    pub fn executed_count(&self, fragment: &str) -> usize {
        self.state.borrow().executed.iter().filter(|(sql, _)| sql.contains(fragment)).count()
    }

    /// Returns the recorded run-state timestamp for an analysis, if any.
    pub fn run_state_of(&self, analysis_id: &str) -> Option<String> {
        self.state.borrow().run_state.get(analysis_id).cloned()
    }

    fn check_failure(state: &MockState, sql: &str) -> Result<(), WarehouseError> {
        if state.fail_contains.iter().any(|fragment| sql.contains(fragment)) {
            return Err(WarehouseError::Execution(format!("injected failure for '{sql}'")));
        }
        Ok(())
    }
}

impl Warehouse for MockWarehouse {
    fn execute(&self, sql: &str, params: &[ScalarValue]) -> Result<(), WarehouseError> {
        let mut state = self.state.borrow_mut();
        Self::check_failure(&state, sql)?;
        state.executed.push((sql.to_string(), params.to_vec()));

        if sql.starts_with("INSERT INTO _duckpipe.run_state") {
            if let (Some(ScalarValue::Text(analysis_id)), Some(ScalarValue::Text(at))) =
                (params.first(), params.get(2))
            {
                state.run_state.insert(analysis_id.clone(), at.clone());
            }
        }
        Ok(())
    }

    fn query(&self, sql: &str, params: &[ScalarValue]) -> Result<QueryOutput, WarehouseError> {
        let mut state = self.state.borrow_mut();
        Self::check_failure(&state, sql)?;
        state.queried.push((sql.to_string(), params.to_vec()));

        if sql.starts_with("SELECT last_run_at FROM _duckpipe.run_state") {
            let Some(ScalarValue::Text(analysis_id)) = params.first() else {
                return Ok(QueryOutput::default());
            };
            let rows = state
                .run_state
                .get(analysis_id)
                .map(|at| vec![vec![ScalarValue::Text(at.clone())]])
                .unwrap_or_default();
            return Ok(QueryOutput {
                columns: vec!["last_run_at".to_string()],
                rows,
            });
        }

        if sql.starts_with("SELECT last_run_id, last_run_at") {
            let Some(ScalarValue::Text(analysis_id)) = params.first() else {
                return Ok(QueryOutput::default());
            };
            let rows = state
                .run_state
                .get(analysis_id)
                .map(|at| {
                    vec![vec![
                        ScalarValue::Text("run-1".to_string()),
                        ScalarValue::Text(at.clone()),
                        ScalarValue::Text("success".to_string()),
                        ScalarValue::Null,
                    ]]
                })
                .unwrap_or_default();
            return Ok(QueryOutput {
                columns: vec![
                    "last_run_id".to_string(),
                    "last_run_at".to_string(),
                    "last_run_status".to_string(),
                    "last_run_error".to_string(),
                ],
                rows,
            });
        }

        if sql.contains("FROM _duckpipe.run_history") {
            return Ok(QueryOutput {
                columns: vec![
                    "run_id".to_string(),
                    "analysis_id".to_string(),
                    "started_at".to_string(),
                    "finished_at".to_string(),
                    "status".to_string(),
                    "rows_affected".to_string(),
                    "error".to_string(),
                    "duration_ms".to_string(),
                ],
                rows: state.history_rows.clone(),
            });
        }

        if sql.starts_with("SELECT 1 FROM ") {
            let probed = sql
                .trim_start_matches("SELECT 1 FROM ")
                .trim_end_matches(" LIMIT 0")
                .to_string();
            if state.existing_tables.contains(&probed) {
                return Ok(QueryOutput::default());
            }
            return Err(WarehouseError::Execution(format!("table '{probed}' does not exist")));
        }

        if sql.starts_with("SELECT COUNT(*)") {
            return Ok(QueryOutput {
                columns: vec!["count".to_string()],
                rows: vec![vec![ScalarValue::Int(state.count_value)]],
            });
        }

        Ok(state.preview_output.clone().unwrap_or_default())
    }
}

/// Builds a minimal analysis with the given id, SQL, and materialization.
pub fn analysis(id: &str, sql: &str, materialize: Materialization) -> Analysis {
    Analysis::new(id, id.to_uppercase(), sql, materialize)
}
