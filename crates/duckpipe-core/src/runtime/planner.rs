// crates/duckpipe-core/src/runtime/planner.rs
// ============================================================================
// Module: duckpipe Planner
// Description: Dependency collection, ordering, freshness, plan assembly.
// Purpose: Turn a target analysis into a concrete, inspectable plan without
//          writing to the warehouse.
// Dependencies: petgraph, crate::{core, interfaces, runtime, sql}
// ============================================================================

//! ## Overview
//! Planning collects every Analysis reachable from the target through
//! analysis-kind references, orders the restricted subgraph topologically
//! (cycles abort with a typed error), decides per step whether it must run,
//! and compiles SQL for runnable steps. Caller params apply only to the
//! target step; dependency runs stay reproducible. Referenced analyses that
//! are not registered are skipped silently, since they may be external
//! sources that merely look like analyses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::core::analysis::Analysis;
use crate::core::params::ParamMap;
use crate::core::plan::ExecutionPlan;
use crate::core::plan::ExecutionStep;
use crate::core::plan::StepAction;
use crate::errors::PipelineError;
use crate::interfaces::MetadataStore;
use crate::interfaces::Warehouse;
use crate::runtime::ledger::RunLedger;
use crate::sql::compiler::compile_analysis_sql;

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Plan builder over a metadata store.
pub struct Planner<'a, S> {
    /// Metadata store the planner reads from.
    store: &'a S,
}

impl<'a, S: MetadataStore> Planner<'a, S> {
    /// Creates a planner over the given store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Compiles an execution plan for the target analysis.
    ///
    /// With a warehouse connection, freshness is evaluated against the run
    /// ledger (created on demand); without one, every step runs. `force`
    /// overrides freshness entirely.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AnalysisNotFound`] for an unknown target,
    /// [`PipelineError::CircularDependency`] when the collected subgraph has
    /// a cycle, [`PipelineError::Compilation`] when a step fails to compile,
    /// and [`PipelineError::Execution`] or [`PipelineError::Storage`] for
    /// backend failures.
    pub fn compile(
        &self,
        target_id: &str,
        params: Option<&ParamMap>,
        force: bool,
        warehouse: Option<&dyn Warehouse>,
    ) -> Result<ExecutionPlan, PipelineError> {
        if self.store.get(target_id)?.is_none() {
            return Err(PipelineError::AnalysisNotFound {
                analysis_id: target_id.to_string(),
            });
        }

        if let Some(connection) = warehouse {
            RunLedger::new(connection)
                .ensure()
                .map_err(|err| PipelineError::execution(target_id, err))?;
        }

        let collected = self.collect(target_id)?;
        let ordered = self.order(&collected)?;

        let mut steps = Vec::with_capacity(ordered.len());
        for analysis_id in &ordered {
            let Some(analysis) = self.store.get(analysis_id)? else {
                continue;
            };

            let (action, reason) = if force {
                (StepAction::Run, "forced")
            } else if let Some(connection) = warehouse {
                let ledger = RunLedger::new(connection);
                if self.is_stale(&ledger, &analysis)? {
                    (StepAction::Run, "stale")
                } else {
                    (StepAction::Skip, "already fresh")
                }
            } else {
                (StepAction::Run, "no freshness check")
            };

            steps.push(match action {
                StepAction::Run => {
                    let step_params = if analysis_id == target_id { params } else { None };
                    let compiled = compile_analysis_sql(
                        &analysis.sql,
                        analysis.materialize,
                        &analysis.result_table(),
                        step_params,
                    )
                    .map_err(|err| PipelineError::Compilation {
                        analysis_id: analysis_id.clone(),
                        message: err.to_string(),
                    })?;
                    ExecutionStep {
                        analysis_id: analysis_id.clone(),
                        action,
                        reason: reason.to_string(),
                        compiled_sql: Some(compiled.sql),
                        bound_params: compiled.params,
                        target_table: Some(analysis.result_table()),
                        operation: Some(analysis.materialize.operation()),
                    }
                }
                StepAction::Skip | StepAction::Fail => ExecutionStep {
                    analysis_id: analysis_id.clone(),
                    action,
                    reason: reason.to_string(),
                    compiled_sql: None,
                    bound_params: None,
                    target_table: None,
                    operation: None,
                },
            });
        }

        tracing::debug!(
            target_id,
            steps = steps.len(),
            runnable = steps.iter().filter(|step| step.is_runnable()).count(),
            "compiled execution plan"
        );

        Ok(ExecutionPlan::new(target_id, steps, params.cloned().unwrap_or_default()))
    }

    /// Decides whether an analysis must re-run to be current.
    ///
    /// Never-run analyses are stale; otherwise an analysis is stale iff any
    /// analysis-kind dependency ran strictly after it. Source- and file-kind
    /// dependencies have no timestamp oracle and count as always fresh.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Execution`] when ledger reads fail.
    pub fn is_stale(
        &self,
        ledger: &RunLedger<'_>,
        analysis: &Analysis,
    ) -> Result<bool, PipelineError> {
        let own_last_run = ledger
            .last_run_at(&analysis.id)
            .map_err(|err| PipelineError::execution(&analysis.id, err))?;
        let Some(own_last_run) = own_last_run else {
            return Ok(true);
        };
        for reference in &analysis.depends_on {
            if !reference.is_analysis() {
                continue;
            }
            let dependency_run = ledger
                .last_run_at(&reference.name)
                .map_err(|err| PipelineError::execution(&reference.name, err))?;
            if dependency_run.is_some_and(|at| at > own_last_run) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Collects the target and every transitively reachable analysis id.
    ///
    /// Depth-first preorder; the resulting order seeds deterministic
    /// topological tie-breaking.
    fn collect(&self, target_id: &str) -> Result<Vec<String>, PipelineError> {
        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        self.collect_into(target_id, &mut visited, &mut order)?;
        Ok(order)
    }

    /// Recursive helper for [`Planner::collect`].
    fn collect_into(
        &self,
        analysis_id: &str,
        visited: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), PipelineError> {
        if !visited.insert(analysis_id.to_string()) {
            return Ok(());
        }
        order.push(analysis_id.to_string());
        let Some(analysis) = self.store.get(analysis_id)? else {
            return Ok(());
        };
        for dependency in analysis.analysis_dependencies() {
            self.collect_into(&dependency, visited, order)?;
        }
        Ok(())
    }

    /// Topologically sorts the collected ids over the restricted subgraph.
    fn order(&self, ids: &[String]) -> Result<Vec<String>, PipelineError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices = BTreeMap::new();
        for id in ids {
            indices.insert(id.as_str(), graph.add_node(id.as_str()));
        }
        for id in ids {
            let Some(analysis) = self.store.get(id)? else {
                continue;
            };
            for dependency in analysis.analysis_dependencies() {
                if let (Some(&from), Some(&to)) =
                    (indices.get(dependency.as_str()), indices.get(id.as_str()))
                {
                    graph.add_edge(from, to, ());
                }
            }
        }
        match toposort(&graph, None) {
            Ok(sorted) => Ok(sorted.into_iter().map(|index| graph[index].to_string()).collect()),
            Err(cycle) => Err(PipelineError::CircularDependency {
                cycle: format!("cycle involving analysis '{}'", graph[cycle.node_id()]),
            }),
        }
    }
}
