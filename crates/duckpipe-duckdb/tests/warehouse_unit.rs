// crates/duckpipe-duckdb/tests/warehouse_unit.rs
// ============================================================================
// Module: DuckDB Warehouse Unit Tests
// Description: Statement execution and result-cell mapping.
// Purpose: Validate positional binding and scalar conversions against an
//          in-memory DuckDB database.
// ============================================================================

//! Unit tests for the DuckDB warehouse:
//! - positional `$N` binding on execute and query
//! - result cells mapped to engine scalars (ints, floats, text, temporal)
//! - execution errors surfaced as warehouse errors

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

use duckpipe_core::ScalarValue;
use duckpipe_core::Warehouse;
use duckpipe_duckdb::DuckDbWarehouse;

#[test]
fn executes_statements_with_positional_bindings() {
    let warehouse = DuckDbWarehouse::open_in_memory().unwrap();
    warehouse.execute("CREATE TABLE t (id BIGINT, label TEXT)", &[]).unwrap();
    warehouse
        .execute(
            "INSERT INTO t VALUES ($1, $2), ($3, $4)",
            &[
                ScalarValue::Int(1),
                ScalarValue::Text("one".to_string()),
                ScalarValue::Int(2),
                ScalarValue::Text("two".to_string()),
            ],
        )
        .unwrap();

    let output = warehouse
        .query("SELECT id, label FROM t WHERE id > $1 ORDER BY id", &[ScalarValue::Int(0)])
        .unwrap();
    assert_eq!(output.columns, vec!["id".to_string(), "label".to_string()]);
    assert_eq!(output.rows.len(), 2);
    assert_eq!(output.rows[0][0], ScalarValue::Int(1));
    assert_eq!(output.rows[1][1], ScalarValue::Text("two".to_string()));
}

#[test]
fn maps_result_cells_to_engine_scalars() {
    let warehouse = DuckDbWarehouse::open_in_memory().unwrap();
    let output = warehouse
        .query(
            "SELECT 1::INTEGER AS i, 2.5::DOUBLE AS f, TRUE AS b, NULL AS n, 'x' AS t",
            &[],
        )
        .unwrap();
    let row = output.first_row().unwrap();
    assert_eq!(row[0], ScalarValue::Int(1));
    assert_eq!(row[1], ScalarValue::Float(2.5));
    assert_eq!(row[2], ScalarValue::Bool(true));
    assert_eq!(row[3], ScalarValue::Null);
    assert_eq!(row[4], ScalarValue::Text("x".to_string()));
}

#[test]
fn temporal_cells_become_iso_text() {
    let warehouse = DuckDbWarehouse::open_in_memory().unwrap();
    let output = warehouse
        .query(
            "SELECT TIMESTAMP '2026-08-01 10:20:30.000500' AS ts, DATE '2026-08-01' AS d",
            &[],
        )
        .unwrap();
    let row = output.first_row().unwrap();
    assert_eq!(row[0], ScalarValue::Text("2026-08-01 10:20:30.000500".to_string()));
    assert_eq!(row[1], ScalarValue::Text("2026-08-01".to_string()));
}

#[test]
fn timestamp_round_trips_through_a_table() {
    let warehouse = DuckDbWarehouse::open_in_memory().unwrap();
    warehouse.execute("CREATE TABLE marks (at TIMESTAMP)", &[]).unwrap();
    warehouse
        .execute(
            "INSERT INTO marks VALUES ($1)",
            &[ScalarValue::Text("2026-08-01 10:20:30.123456".to_string())],
        )
        .unwrap();
    let output = warehouse.query("SELECT at FROM marks", &[]).unwrap();
    assert_eq!(
        output.first_value(),
        Some(&ScalarValue::Text("2026-08-01 10:20:30.123456".to_string()))
    );
}

#[test]
fn failed_statements_surface_as_errors() {
    let warehouse = DuckDbWarehouse::open_in_memory().unwrap();
    assert!(warehouse.execute("SELECT * FROM does_not_exist", &[]).is_err());
    assert!(warehouse.query("SELECT * FROM does_not_exist", &[]).is_err());
}
