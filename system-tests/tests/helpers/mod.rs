// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared fixtures for end-to-end scenarios.
// Purpose: Build pipelines over a temp-dir file store and an in-memory
//          DuckDB warehouse.
// Dependencies: duckpipe-core, duckpipe-duckdb, duckpipe-store-file
// ============================================================================

//! ## Overview
//! Provides pipeline and warehouse fixtures plus small query helpers shared
//! by the end-to-end scenarios.

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

use std::path::Path;

use duckpipe_core::Analysis;
use duckpipe_core::Materialization;
use duckpipe_core::Pipeline;
use duckpipe_core::ScalarValue;
use duckpipe_core::Warehouse;
use duckpipe_duckdb::DuckDbWarehouse;
use duckpipe_store_file::FileMetadataStore;

/// Builds a pipeline over a file store rooted in the given directory.
pub fn pipeline_in(dir: &Path) -> Pipeline<FileMetadataStore> {
    Pipeline::new(FileMetadataStore::new(dir.join("analyses")).unwrap())
}

/// Opens an in-memory DuckDB warehouse.
pub fn warehouse() -> DuckDbWarehouse {
    DuckDbWarehouse::open_in_memory().unwrap()
}

/// Registers a minimal analysis.
pub fn register(
    pipeline: &Pipeline<FileMetadataStore>,
    id: &str,
    sql: &str,
    materialize: Materialization,
) -> Analysis {
    pipeline.register(Analysis::new(id, id.to_uppercase(), sql, materialize)).unwrap()
}

/// Fetches the single integer produced by a query.
pub fn int_value(warehouse: &dyn Warehouse, sql: &str) -> i64 {
    let output = warehouse.query(sql, &[]).unwrap();
    match output.first_value() {
        Some(ScalarValue::Int(value)) => *value,
        other => panic!("expected one integer, got {other:?}"),
    }
}

/// Counts the rows produced by a query.
pub fn row_count(warehouse: &dyn Warehouse, sql: &str) -> usize {
    warehouse.query(sql, &[]).unwrap().rows.len()
}
