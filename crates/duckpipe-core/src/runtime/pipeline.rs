// crates/duckpipe-core/src/runtime/pipeline.rs
// ============================================================================
// Module: duckpipe Pipeline Facade
// Description: The public orchestration surface of the engine.
// Purpose: Own the metadata store handle and the DAG cache; delegate to the
//          planner and executor.
// Dependencies: crate::{core, interfaces, runtime, sql}
// ============================================================================

//! ## Overview
//! A [`Pipeline`] instance owns one metadata store and a small memoized
//! dependency DAG. Warehouse connections are injected per call so callers
//! control connection lifecycle and isolation. `compile` never writes
//! analysis results; `execute` is the only path that materializes them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::analysis::Analysis;
use crate::core::params::ParamMap;
use crate::core::params::ScalarValue;
use crate::core::plan::ExecutionPlan;
use crate::core::reference::Reference;
use crate::core::result::AnalysisStatus;
use crate::core::result::ExecutionResult;
use crate::core::result::StepResult;
use crate::core::time::now_utc;
use crate::errors::PipelineError;
use crate::interfaces::MetadataStore;
use crate::interfaces::Warehouse;
use crate::runtime::executor::Executor;
use crate::runtime::ledger::RunLedger;
use crate::runtime::planner::Planner;
use crate::sql::compiler::compile_preview_sql;
use crate::sql::compiler::validate_identifier;
use crate::sql::deps::extract_dependencies;

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Dependency DAG: analysis id to its analysis-kind dependency ids.
pub type DependencyDag = BTreeMap<String, Vec<String>>;

/// The engine facade.
///
/// # Invariants
/// - The metadata store is single-writer for the lifetime of the instance.
/// - The DAG cache is invalidated on every `register` and `delete`.
pub struct Pipeline<S> {
    /// Owned metadata store.
    metadata: S,
    /// Memoized dependency DAG, rebuilt lazily after invalidation.
    dag_cache: Mutex<Option<DependencyDag>>,
}

impl<S: MetadataStore> Pipeline<S> {
    /// Creates a pipeline owning the given metadata store.
    #[must_use]
    pub const fn new(metadata_store: S) -> Self {
        Self {
            metadata: metadata_store,
            dag_cache: Mutex::new(None),
        }
    }

    /// Returns a reference to the owned metadata store.
    #[must_use]
    pub const fn metadata(&self) -> &S {
        &self.metadata
    }

    // ─────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────

    /// Registers or updates an Analysis, returning the stored value.
    ///
    /// Validates the id and parameter names, auto-extracts `depends_on`
    /// from the SQL when none are declared, dedups declared references,
    /// stamps timestamps, and invalidates the DAG cache.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for a malformed id or duplicate
    /// parameter names and [`PipelineError::Storage`] on store failure.
    pub fn register(&self, analysis: Analysis) -> Result<Analysis, PipelineError> {
        validate_identifier(&analysis.id)?;
        validate_parameter_names(&analysis)?;

        let mut analysis = analysis;
        if analysis.depends_on.is_empty() {
            analysis.depends_on = extract_dependencies(&analysis.sql);
        } else {
            analysis.depends_on = dedup_references(analysis.depends_on);
        }
        if analysis.created_at.is_none() {
            analysis.created_at = Some(now_utc());
        }
        analysis.updated_at = Some(now_utc());

        let stored = self.metadata.save(&analysis)?;
        self.invalidate_dag_cache();
        tracing::info!(analysis_id = %stored.id, "registered analysis");
        Ok(stored)
    }

    /// Returns an Analysis by id, or `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] on store failure.
    pub fn get(&self, analysis_id: &str) -> Result<Option<Analysis>, PipelineError> {
        Ok(self.metadata.get(analysis_id)?)
    }

    /// Lists all registered analyses.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] on store failure.
    pub fn list_all(&self) -> Result<Vec<Analysis>, PipelineError> {
        Ok(self.metadata.list_all()?)
    }

    /// Deletes an Analysis by id and invalidates the DAG cache.
    ///
    /// Warehouse artifacts of the Analysis are left in place; dropping them
    /// is caller policy.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] on store failure.
    pub fn delete(&self, analysis_id: &str) -> Result<(), PipelineError> {
        self.metadata.delete(analysis_id)?;
        self.invalidate_dag_cache();
        Ok(())
    }

    // ─────────────────────────────────────────────────
    // Compile and Execute
    // ─────────────────────────────────────────────────

    /// Compiles an execution plan for the target analysis (no writes).
    ///
    /// # Errors
    ///
    /// See [`Planner::compile`].
    pub fn compile(
        &self,
        analysis_id: &str,
        params: Option<&ParamMap>,
        force: bool,
        warehouse: Option<&dyn Warehouse>,
    ) -> Result<ExecutionPlan, PipelineError> {
        Planner::new(&self.metadata).compile(analysis_id, params, force, warehouse)
    }

    /// Executes a compiled plan against the warehouse.
    ///
    /// # Errors
    ///
    /// See [`Executor::execute`].
    pub fn execute(
        &self,
        warehouse: &dyn Warehouse,
        plan: &ExecutionPlan,
        continue_on_failure: bool,
    ) -> Result<ExecutionResult, PipelineError> {
        Executor::new(&self.metadata).execute(warehouse, plan, continue_on_failure)
    }

    /// Compiles and executes in one call.
    ///
    /// # Errors
    ///
    /// See [`Planner::compile`] and [`Executor::execute`].
    pub fn run(
        &self,
        warehouse: &dyn Warehouse,
        analysis_id: &str,
        params: Option<&ParamMap>,
        force: bool,
        continue_on_failure: bool,
    ) -> Result<ExecutionResult, PipelineError> {
        let plan = self.compile(analysis_id, params, force, Some(warehouse))?;
        self.execute(warehouse, &plan, continue_on_failure)
    }

    // ─────────────────────────────────────────────────
    // Status and History
    // ─────────────────────────────────────────────────

    /// Returns freshness, last-run metadata, and dependency edges for an
    /// Analysis.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AnalysisNotFound`] for an unknown id,
    /// [`PipelineError::Execution`] on warehouse failure, and
    /// [`PipelineError::Storage`] on store failure.
    pub fn status(
        &self,
        warehouse: &dyn Warehouse,
        analysis_id: &str,
    ) -> Result<AnalysisStatus, PipelineError> {
        let analysis =
            self.metadata.get(analysis_id)?.ok_or_else(|| PipelineError::AnalysisNotFound {
                analysis_id: analysis_id.to_string(),
            })?;

        let ledger = RunLedger::new(warehouse);
        ledger.ensure().map_err(|err| PipelineError::execution(analysis_id, err))?;
        let state = ledger
            .run_state(analysis_id)
            .map_err(|err| PipelineError::execution(analysis_id, err))?;

        let mut depended_by = Vec::new();
        for other in self.metadata.list_all()? {
            let depends_on_this = other
                .depends_on
                .iter()
                .any(|reference| reference.is_analysis() && reference.name == analysis_id);
            if depends_on_this {
                depended_by.push(other.id);
            }
        }

        let is_stale = Planner::new(&self.metadata).is_stale(&ledger, &analysis)?;
        Ok(AnalysisStatus {
            analysis_id: analysis_id.to_string(),
            is_stale,
            last_run_at: state.as_ref().and_then(|row| row.last_run_at),
            last_run_status: state.as_ref().and_then(|row| row.last_run_status),
            depends_on: analysis.depends_on.iter().map(ToString::to_string).collect(),
            depended_by,
        })
    }

    /// Returns the most recent run attempts for an Analysis, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Execution`] on warehouse failure.
    pub fn get_run_history(
        &self,
        warehouse: &dyn Warehouse,
        analysis_id: &str,
        limit: usize,
    ) -> Result<Vec<StepResult>, PipelineError> {
        let ledger = RunLedger::new(warehouse);
        ledger.ensure().map_err(|err| PipelineError::execution(analysis_id, err))?;
        ledger.history(analysis_id, limit).map_err(|err| PipelineError::execution(analysis_id, err))
    }

    /// Runs an Analysis query without materializing, returning up to
    /// `limit` rows as column-name to value maps.
    ///
    /// Never writes to the warehouse and records no history.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AnalysisNotFound`] for an unknown id and
    /// [`PipelineError::Execution`] on warehouse failure.
    pub fn preview(
        &self,
        warehouse: &dyn Warehouse,
        analysis_id: &str,
        params: Option<&ParamMap>,
        limit: usize,
    ) -> Result<Vec<BTreeMap<String, ScalarValue>>, PipelineError> {
        let analysis =
            self.metadata.get(analysis_id)?.ok_or_else(|| PipelineError::AnalysisNotFound {
                analysis_id: analysis_id.to_string(),
            })?;

        let compiled = compile_preview_sql(&analysis.sql, params)?;
        let preview_sql = format!("SELECT * FROM ({}) AS _preview LIMIT {limit}", compiled.sql);
        let bound = compiled.params.unwrap_or_default();
        let output = warehouse
            .query(&preview_sql, &bound)
            .map_err(|err| PipelineError::execution(analysis_id, err))?;

        let rows = output
            .rows
            .iter()
            .map(|row| {
                output
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<BTreeMap<String, ScalarValue>>()
            })
            .collect();
        Ok(rows)
    }

    // ─────────────────────────────────────────────────
    // DAG
    // ─────────────────────────────────────────────────

    /// Returns the dependency DAG (analysis-kind edges only), memoized
    /// until the next `register` or `delete`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] on store failure.
    pub fn get_dag(&self) -> Result<DependencyDag, PipelineError> {
        {
            let cache = self.dag_cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(dag) = cache.as_ref() {
                return Ok(dag.clone());
            }
        }

        let mut dag = DependencyDag::new();
        for analysis in self.metadata.list_all()? {
            dag.insert(analysis.id.clone(), analysis.analysis_dependencies());
        }

        let mut cache = self.dag_cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(dag.clone());
        Ok(dag)
    }

    /// Drops the memoized DAG.
    fn invalidate_dag_cache(&self) {
        let mut cache = self.dag_cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = None;
    }
}

// ============================================================================
// SECTION: Registration Helpers
// ============================================================================

/// Rejects analyses declaring the same parameter name twice.
fn validate_parameter_names(analysis: &Analysis) -> Result<(), PipelineError> {
    let mut seen = std::collections::BTreeSet::new();
    for parameter in &analysis.parameters {
        if !seen.insert(parameter.name.as_str()) {
            return Err(PipelineError::Validation(format!(
                "duplicate parameter '{}' in analysis '{}'",
                parameter.name, analysis.id
            )));
        }
    }
    Ok(())
}

/// Removes duplicate references (by canonical string), keeping first-seen
/// order.
fn dedup_references(references: Vec<Reference>) -> Vec<Reference> {
    let mut seen = std::collections::BTreeSet::new();
    references.into_iter().filter(|reference| seen.insert(reference.to_string())).collect()
}
