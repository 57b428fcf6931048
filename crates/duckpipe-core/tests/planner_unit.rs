// crates/duckpipe-core/tests/planner_unit.rs
// ============================================================================
// Module: Planner Unit Tests
// Description: Collection, ordering, freshness, and action assignment.
// Purpose: Validate plan shape against canned metadata and run state.
// ============================================================================

//! Unit tests for the planner:
//! - topological ordering with the target last, every dependency first
//! - cycle detection over the collected subgraph
//! - freshness reasons (`forced`, `no freshness check`, `stale`,
//!   `already fresh`)
//! - caller params bound only on the target step

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::MockWarehouse;
use common::analysis;
use duckpipe_core::InMemoryMetadataStore;
use duckpipe_core::Materialization;
use duckpipe_core::ParamMap;
use duckpipe_core::ParamValue;
use duckpipe_core::Pipeline;
use duckpipe_core::PipelineError;
use duckpipe_core::Reference;
use duckpipe_core::StepAction;

fn chain_pipeline() -> Pipeline<InMemoryMetadataStore> {
    let pipeline = Pipeline::new(InMemoryMetadataStore::new());
    pipeline
        .register(analysis("a", "SELECT 1 AS value", Materialization::Table))
        .unwrap();
    pipeline
        .register(analysis(
            "b",
            "SELECT value * 2 AS value FROM analysis.a",
            Materialization::Table,
        ))
        .unwrap();
    pipeline
        .register(analysis(
            "c",
            "SELECT value * 3 AS value FROM analysis.b",
            Materialization::Table,
        ))
        .unwrap();
    pipeline
}

fn step_ids(plan: &duckpipe_core::ExecutionPlan) -> Vec<&str> {
    plan.steps.iter().map(|step| step.analysis_id.as_str()).collect()
}

#[test]
fn orders_chain_dependencies_before_target() {
    let pipeline = chain_pipeline();
    let plan = pipeline.compile("c", None, false, None).unwrap();
    assert_eq!(step_ids(&plan), vec!["a", "b", "c"]);
    assert_eq!(plan.target_id, "c");
}

#[test]
fn diamond_dependencies_appear_exactly_once() {
    let pipeline = chain_pipeline();
    pipeline
        .register(analysis(
            "d",
            "SELECT * FROM analysis.b JOIN analysis.c USING (value)",
            Materialization::Table,
        ))
        .unwrap();
    let plan = pipeline.compile("d", None, false, None).unwrap();
    let ids = step_ids(&plan);
    assert_eq!(ids.len(), 4);
    for id in ["a", "b", "c", "d"] {
        assert_eq!(ids.iter().filter(|found| **found == *id).count(), 1, "{id} once");
    }
    assert_eq!(ids.last(), Some(&"d"));
    let index_of = |id: &str| ids.iter().position(|found| *found == id).unwrap();
    assert!(index_of("a") < index_of("b"));
    assert!(index_of("b") < index_of("c"));
}

#[test]
fn without_connection_every_step_runs() {
    let pipeline = chain_pipeline();
    let plan = pipeline.compile("c", None, false, None).unwrap();
    for step in &plan.steps {
        assert_eq!(step.action, StepAction::Run);
        assert_eq!(step.reason, "no freshness check");
    }
}

#[test]
fn force_overrides_freshness() {
    let pipeline = chain_pipeline();
    let warehouse = MockWarehouse::new()
        .with_run_state("a", "2026-08-01 10:00:00.000000")
        .with_run_state("b", "2026-08-01 10:00:01.000000")
        .with_run_state("c", "2026-08-01 10:00:02.000000");
    let plan = pipeline.compile("c", None, true, Some(&warehouse)).unwrap();
    for step in &plan.steps {
        assert_eq!(step.action, StepAction::Run);
        assert_eq!(step.reason, "forced");
    }
}

#[test]
fn fresh_chain_is_skipped() {
    let pipeline = chain_pipeline();
    let warehouse = MockWarehouse::new()
        .with_run_state("a", "2026-08-01 10:00:00.000000")
        .with_run_state("b", "2026-08-01 10:00:01.000000")
        .with_run_state("c", "2026-08-01 10:00:02.000000");
    let plan = pipeline.compile("c", None, false, Some(&warehouse)).unwrap();
    for step in &plan.steps {
        assert_eq!(step.action, StepAction::Skip);
        assert_eq!(step.reason, "already fresh");
        assert!(step.compiled_sql.is_none());
        assert!(step.target_table.is_none());
    }
}

#[test]
fn never_run_analysis_is_stale() {
    let pipeline = chain_pipeline();
    let warehouse = MockWarehouse::new();
    let plan = pipeline.compile("a", None, false, Some(&warehouse)).unwrap();
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].action, StepAction::Run);
    assert_eq!(plan.steps[0].reason, "stale");
}

#[test]
fn dependency_newer_than_dependent_is_stale() {
    let pipeline = chain_pipeline();
    let warehouse = MockWarehouse::new()
        .with_run_state("a", "2026-08-01 12:00:00.000000")
        .with_run_state("b", "2026-08-01 10:00:01.000000")
        .with_run_state("c", "2026-08-01 10:00:02.000000");
    let plan = pipeline.compile("c", None, false, Some(&warehouse)).unwrap();
    let action_of = |id: &str| {
        plan.steps
            .iter()
            .find(|step| step.analysis_id == id)
            .map(|step| (step.action, step.reason.clone()))
            .unwrap()
    };
    assert_eq!(action_of("a"), (StepAction::Skip, "already fresh".to_string()));
    assert_eq!(action_of("b"), (StepAction::Run, "stale".to_string()));
    // Freshness compares direct dependencies only: b's last run predates
    // c's, so c is current even while b itself is stale.
    assert_eq!(action_of("c"), (StepAction::Skip, "already fresh".to_string()));
}

#[test]
fn cycle_detection_aborts_planning() {
    let pipeline = Pipeline::new(InMemoryMetadataStore::new());
    let mut x = analysis("x", "SELECT * FROM analysis.y", Materialization::Table);
    x.depends_on = vec![Reference::analysis("y")];
    let mut y = analysis("y", "SELECT * FROM analysis.x", Materialization::Table);
    y.depends_on = vec![Reference::analysis("x")];
    pipeline.register(x).unwrap();
    pipeline.register(y).unwrap();

    let result = pipeline.compile("x", None, false, None);
    assert!(matches!(result, Err(PipelineError::CircularDependency { .. })));
}

#[test]
fn unknown_target_is_reported() {
    let pipeline = Pipeline::new(InMemoryMetadataStore::new());
    let result = pipeline.compile("ghost", None, false, None);
    assert!(matches!(
        result,
        Err(PipelineError::AnalysisNotFound { analysis_id }) if analysis_id == "ghost"
    ));
}

#[test]
fn missing_referenced_analyses_are_skipped() {
    let pipeline = Pipeline::new(InMemoryMetadataStore::new());
    let mut lonely = analysis("lonely", "SELECT 1 AS value", Materialization::Table);
    lonely.depends_on = vec![Reference::analysis("ghost")];
    pipeline.register(lonely).unwrap();

    let plan = pipeline.compile("lonely", None, false, None).unwrap();
    assert_eq!(step_ids(&plan), vec!["lonely"]);
}

#[test]
fn params_apply_only_to_the_target_step() {
    let pipeline = Pipeline::new(InMemoryMetadataStore::new());
    pipeline
        .register(analysis("base", "SELECT :v AS value", Materialization::Table))
        .unwrap();
    pipeline
        .register(analysis(
            "top",
            "SELECT value + :v AS value FROM analysis.base",
            Materialization::Table,
        ))
        .unwrap();

    let mut params = ParamMap::new();
    params.insert("v".to_string(), ParamValue::int(7));
    let plan = pipeline.compile("top", Some(&params), false, None).unwrap();

    let base_step = plan.steps.iter().find(|step| step.analysis_id == "base").unwrap();
    assert!(base_step.compiled_sql.as_deref().unwrap().contains(":v"));
    assert_eq!(base_step.bound_params, None);

    let top_step = plan.steps.iter().find(|step| step.analysis_id == "top").unwrap();
    assert!(top_step.compiled_sql.as_deref().unwrap().contains("$1"));
    assert_eq!(
        top_step.bound_params,
        Some(vec![duckpipe_core::ScalarValue::Int(7)])
    );
}

#[test]
fn runnable_steps_carry_target_and_operation() {
    let pipeline = chain_pipeline();
    let plan = pipeline.compile("a", None, false, None).unwrap();
    let step = &plan.steps[0];
    assert_eq!(step.target_table.as_deref(), Some("analysis.a"));
    assert_eq!(
        step.operation,
        Some(duckpipe_core::OperationKind::CreateOrReplaceTable)
    );
    assert_eq!(
        step.compiled_sql.as_deref(),
        Some("CREATE OR REPLACE TABLE analysis.a AS SELECT 1 AS value")
    );
}
