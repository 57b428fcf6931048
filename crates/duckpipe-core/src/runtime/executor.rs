// crates/duckpipe-core/src/runtime/executor.rs
// ============================================================================
// Module: duckpipe Executor
// Description: Plan execution with per-step run records.
// Purpose: Walk a compiled plan in order, record every attempt in the run
//          ledger, and propagate failures per the selected policy.
// Dependencies: uuid, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The executor is the single write path to the warehouse. Steps run
//! sequentially in plan order; each runnable step opens a history row
//! (`running`), executes its compiled SQL, and closes the row with the
//! outcome. Step failures never abort the walk directly: they are captured
//! into step results and either halt iteration (default) or poison the
//! failed analysis so dependent steps are skipped (continue-on-failure).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::core::params::ScalarValue;
use crate::core::plan::ExecutionPlan;
use crate::core::plan::ExecutionStep;
use crate::core::plan::OperationKind;
use crate::core::plan::StepAction;
use crate::core::result::ExecutionResult;
use crate::core::result::StepResult;
use crate::core::result::StepStatus;
use crate::core::time::elapsed_ms;
use crate::core::time::now_utc;
use crate::errors::PipelineError;
use crate::interfaces::MetadataStore;
use crate::interfaces::Warehouse;
use crate::interfaces::WarehouseError;
use crate::runtime::ledger::RunLedger;

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Error message recorded on steps skipped because a dependency failed.
const DEPENDENCY_FAILED: &str = "Skipped: dependency failed";

/// Plan executor over a metadata store.
pub struct Executor<'a, S> {
    /// Metadata store consulted for dependency edges and append targets.
    store: &'a S,
}

impl<'a, S: MetadataStore> Executor<'a, S> {
    /// Creates an executor over the given store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Executes a compiled plan against the warehouse.
    ///
    /// With `continue_on_failure`, independent subtrees keep running after a
    /// failure while steps depending on a failed analysis are skipped; by
    /// default the walk halts after the first failed step is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Execution`] when ledger writes fail and
    /// [`PipelineError::Storage`] when the metadata store fails; step-level
    /// SQL failures are captured into the result instead.
    pub fn execute(
        &self,
        warehouse: &dyn Warehouse,
        plan: &ExecutionPlan,
        continue_on_failure: bool,
    ) -> Result<ExecutionResult, PipelineError> {
        let ledger = RunLedger::new(warehouse);
        ledger.ensure().map_err(|err| PipelineError::execution(&plan.target_id, err))?;

        let mut step_results = Vec::with_capacity(plan.steps.len());
        let mut success = true;
        let mut poisoned: BTreeSet<String> = BTreeSet::new();

        for step in &plan.steps {
            if continue_on_failure
                && !poisoned.is_empty()
                && let Some(analysis) = self.store.get(&step.analysis_id)?
            {
                let dependency_failed = analysis.depends_on.iter().any(|reference| {
                    reference.is_analysis() && poisoned.contains(&reference.name)
                });
                if dependency_failed {
                    step_results.push(skipped_result(&step.analysis_id, Some(DEPENDENCY_FAILED)));
                    continue;
                }
            }

            match step.action {
                StepAction::Skip => {
                    step_results.push(skipped_result(&step.analysis_id, None));
                    continue;
                }
                StepAction::Fail => {
                    step_results.push(skipped_result(&step.analysis_id, Some(&step.reason)));
                    continue;
                }
                StepAction::Run => {}
            }

            let result = self.execute_step(warehouse, &ledger, step, plan)?;
            let failed = result.is_failed();
            step_results.push(result);

            if failed {
                success = false;
                poisoned.insert(step.analysis_id.clone());
                if !continue_on_failure {
                    break;
                }
            }
        }

        Ok(ExecutionResult {
            plan: plan.clone(),
            success,
            step_results,
        })
    }

    /// Executes one runnable step, recording its full run-record lifecycle.
    fn execute_step(
        &self,
        warehouse: &dyn Warehouse,
        ledger: &RunLedger<'_>,
        step: &ExecutionStep,
        plan: &ExecutionPlan,
    ) -> Result<StepResult, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = now_utc();
        let params_json = if step.analysis_id == plan.target_id && !plan.params.is_empty() {
            serde_json::to_string(&plan.params).ok()
        } else {
            None
        };

        ledger
            .begin(&run_id, &step.analysis_id, started_at, params_json)
            .map_err(|err| PipelineError::execution(&step.analysis_id, err))?;

        let outcome = self.run_step_sql(warehouse, step);
        let finished_at = now_utc();
        let duration_ms = elapsed_ms(started_at, finished_at);

        match outcome {
            Ok(rows_affected) => {
                ledger
                    .finish(
                        &run_id,
                        &step.analysis_id,
                        StepStatus::Success,
                        finished_at,
                        rows_affected,
                        None,
                        duration_ms,
                    )
                    .map_err(|err| PipelineError::execution(&step.analysis_id, err))?;
                tracing::info!(
                    analysis_id = %step.analysis_id,
                    run_id = %run_id,
                    duration_ms,
                    "step succeeded"
                );
                Ok(StepResult {
                    run_id,
                    analysis_id: step.analysis_id.clone(),
                    status: StepStatus::Success,
                    started_at,
                    finished_at: Some(finished_at),
                    rows_affected,
                    error: None,
                    duration_ms: Some(duration_ms),
                })
            }
            Err(err) => {
                let message = err.to_string();
                ledger
                    .finish(
                        &run_id,
                        &step.analysis_id,
                        StepStatus::Failed,
                        finished_at,
                        None,
                        Some(&message),
                        duration_ms,
                    )
                    .map_err(|ledger_err| {
                        PipelineError::execution(&step.analysis_id, ledger_err)
                    })?;
                tracing::warn!(
                    analysis_id = %step.analysis_id,
                    run_id = %run_id,
                    error = %message,
                    "step failed"
                );
                Ok(StepResult {
                    run_id,
                    analysis_id: step.analysis_id.clone(),
                    status: StepStatus::Failed,
                    started_at,
                    finished_at: Some(finished_at),
                    rows_affected: None,
                    error: Some(message),
                    duration_ms: Some(duration_ms),
                })
            }
        }
    }

    /// Runs the step's SQL, returning the rows left in the target when
    /// countable.
    fn run_step_sql(
        &self,
        warehouse: &dyn Warehouse,
        step: &ExecutionStep,
    ) -> Result<Option<i64>, WarehouseError> {
        let Some(sql) = step.compiled_sql.as_deref() else {
            return Err(WarehouseError::Execution(
                "runnable step carries no compiled SQL".to_string(),
            ));
        };

        if step.operation == Some(OperationKind::InsertInto) {
            self.ensure_append_table(warehouse, step)?;
        }

        let params = step.bound_params.as_deref().unwrap_or(&[]);
        warehouse.execute(sql, params)?;

        let mut rows_affected = None;
        if step.operation.is_some_and(OperationKind::counts_rows)
            && let Some(target) = step.target_table.as_deref()
        {
            rows_affected = count_rows(warehouse, target);
        }
        Ok(rows_affected)
    }

    /// Creates the append target from the query shape when it does not exist.
    ///
    /// Runs the raw SELECT behind a zero-row filter solely to infer column
    /// types.
    fn ensure_append_table(
        &self,
        warehouse: &dyn Warehouse,
        step: &ExecutionStep,
    ) -> Result<(), WarehouseError> {
        let Some(target) = step.target_table.as_deref() else {
            return Ok(());
        };
        if warehouse.query(&format!("SELECT 1 FROM {target} LIMIT 0"), &[]).is_ok() {
            return Ok(());
        }
        let analysis = self
            .store
            .get(&step.analysis_id)
            .map_err(|err| WarehouseError::Execution(err.to_string()))?;
        let Some(analysis) = analysis else {
            return Ok(());
        };
        warehouse.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {target} AS SELECT * FROM ({}) WHERE FALSE",
                analysis.sql
            ),
            &[],
        )
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a skipped step result with a fresh run id and no side effects.
fn skipped_result(analysis_id: &str, error: Option<&str>) -> StepResult {
    StepResult {
        run_id: Uuid::new_v4().to_string(),
        analysis_id: analysis_id.to_string(),
        status: StepStatus::Skipped,
        started_at: now_utc(),
        finished_at: None,
        rows_affected: None,
        error: error.map(str::to_string),
        duration_ms: None,
    }
}

/// Counts rows in the target table; counting failures are not fatal.
fn count_rows(warehouse: &dyn Warehouse, target: &str) -> Option<i64> {
    warehouse
        .query(&format!("SELECT COUNT(*) FROM {target}"), &[])
        .ok()
        .and_then(|output| output.first_value().and_then(ScalarValue::as_int))
}
