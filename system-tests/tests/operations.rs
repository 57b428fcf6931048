// system-tests/tests/operations.rs
// ============================================================================
// Module: Operational Scenarios
// Description: Status, history, preview, and DAG retrieval end to end.
// Purpose: Validate the inspection surface against persisted state.
// ============================================================================

//! End-to-end operational scenarios:
//! - status combines ledger state with reverse dependency edges
//! - run history returns newest-first attempts with parameters recorded
//! - preview reads sample rows without writing anything
//! - the DAG reflects registered analysis-kind edges

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

mod helpers;

use duckpipe_core::Materialization;
use duckpipe_core::ParamMap;
use duckpipe_core::ParamValue;
use duckpipe_core::ScalarValue;
use duckpipe_core::StepStatus;
use duckpipe_core::Warehouse;
use helpers::pipeline_in;
use helpers::register;
use helpers::warehouse;
use tempfile::TempDir;

#[test]
fn status_reports_run_state_and_reverse_edges() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(dir.path());
    let connection = warehouse();

    register(&pipeline, "base", "SELECT 1 AS value", Materialization::Table);
    register(
        &pipeline,
        "derived",
        "SELECT value FROM analysis.base",
        Materialization::Table,
    );
    assert!(pipeline.run(&connection, "base", None, false, false).unwrap().success);

    let base = pipeline.status(&connection, "base").unwrap();
    assert!(!base.is_stale);
    assert!(base.last_run_at.is_some());
    assert_eq!(base.last_run_status, Some(StepStatus::Success));
    assert_eq!(base.depended_by, vec!["derived".to_string()]);

    let derived = pipeline.status(&connection, "derived").unwrap();
    assert!(derived.is_stale);
    assert_eq!(derived.last_run_at, None);
    assert_eq!(derived.depends_on, vec!["analysis:base".to_string()]);
}

#[test]
fn run_history_is_newest_first_with_params_recorded() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(dir.path());
    let connection = warehouse();

    register(&pipeline, "p", "SELECT :n AS n", Materialization::Table);
    let mut params = ParamMap::new();
    params.insert("n".to_string(), ParamValue::int(1));
    assert!(pipeline.run(&connection, "p", Some(&params), true, false).unwrap().success);

    std::thread::sleep(std::time::Duration::from_millis(5));
    params.insert("n".to_string(), ParamValue::int(2));
    assert!(pipeline.run(&connection, "p", Some(&params), true, false).unwrap().success);

    let history = pipeline.get_run_history(&connection, "p", 10).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].started_at >= history[1].started_at);
    for entry in &history {
        assert_eq!(entry.status, StepStatus::Success);
        assert_eq!(entry.analysis_id, "p");
    }

    let limited = pipeline.get_run_history(&connection, "p", 1).unwrap();
    assert_eq!(limited.len(), 1);

    let recorded = connection
        .query(
            "SELECT params FROM _duckpipe.run_history WHERE analysis_id = $1 \
             AND params IS NOT NULL",
            &[ScalarValue::Text("p".to_string())],
        )
        .unwrap();
    assert_eq!(recorded.rows.len(), 2);
}

#[test]
fn preview_reads_rows_without_materializing() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(dir.path());
    let connection = warehouse();

    register(
        &pipeline,
        "numbers",
        "SELECT range AS n FROM range(10)",
        Materialization::Table,
    );

    let rows = pipeline.preview(&connection, "numbers", None, 3).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("n"), Some(&ScalarValue::Int(0)));

    // Nothing was materialized and no history was written.
    assert!(connection.query("SELECT * FROM analysis.numbers", &[]).is_err());
    let history = pipeline.get_run_history(&connection, "numbers", 10).unwrap();
    assert!(history.is_empty());
}

#[test]
fn preview_binds_parameters() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(dir.path());
    let connection = warehouse();

    register(&pipeline, "echo", "SELECT :v AS v", Materialization::Table);
    let mut params = ParamMap::new();
    params.insert("v".to_string(), ParamValue::text("hello"));

    let rows = pipeline.preview(&connection, "echo", Some(&params), 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("v"), Some(&ScalarValue::Text("hello".to_string())));
}

#[test]
fn dag_reflects_registered_edges() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(dir.path());

    register(&pipeline, "base", "SELECT 1 AS value", Materialization::Table);
    register(
        &pipeline,
        "mid",
        "SELECT value FROM analysis.base",
        Materialization::Table,
    );
    register(
        &pipeline,
        "top",
        "SELECT value FROM analysis.mid JOIN source.raw USING (value)",
        Materialization::Table,
    );

    let dag = pipeline.get_dag().unwrap();
    assert_eq!(dag.get("base"), Some(&Vec::new()));
    assert_eq!(dag.get("mid"), Some(&vec!["base".to_string()]));
    assert_eq!(dag.get("top"), Some(&vec!["mid".to_string()]));

    pipeline.delete("top").unwrap();
    assert!(!pipeline.get_dag().unwrap().contains_key("top"));
}
