// crates/duckpipe-core/tests/dependency_extraction.rs
// ============================================================================
// Module: Dependency Extraction Unit Tests
// Description: Table-reference extraction from analysis SQL.
// Purpose: Validate schema classification, CTE exclusion, and dedup.
// ============================================================================

//! Unit tests for SQL dependency extraction:
//! - schema-prefix classification into analysis/source/file references
//! - CTE names excluded, duplicates removed
//! - unparseable SQL yields no references

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

use duckpipe_core::Reference;
use duckpipe_core::sql::deps::extract_dependencies;
use duckpipe_core::sql::deps::validate_sql;

#[test]
fn classifies_analysis_and_source_schemas() {
    let refs = extract_dependencies(
        "SELECT * FROM analysis.monthly_revenue JOIN source.pg_orders USING (id)",
    );
    assert_eq!(
        refs,
        vec![Reference::analysis("monthly_revenue"), Reference::source("pg_orders")]
    );
}

#[test]
fn unprefixed_tables_default_to_source() {
    let refs = extract_dependencies("SELECT * FROM orders");
    assert_eq!(refs, vec![Reference::source("orders")]);
}

#[test]
fn fully_qualified_foreign_schema_is_source() {
    let refs = extract_dependencies("SELECT * FROM staging.orders");
    assert_eq!(refs, vec![Reference::source("staging.orders")]);
}

#[test]
fn quoted_file_like_names_become_file_references() {
    let refs = extract_dependencies("SELECT * FROM \"sales.csv\"");
    assert_eq!(refs, vec![Reference::file("sales.csv")]);
}

#[test]
fn cte_names_are_excluded() {
    let refs = extract_dependencies(
        "WITH temp AS (SELECT 1 AS one) SELECT * FROM temp, analysis.foo",
    );
    assert_eq!(refs, vec![Reference::analysis("foo")]);
}

#[test]
fn nested_cte_names_are_excluded() {
    let sql = "WITH outer_cte AS ( \
                   WITH inner_cte AS (SELECT 1 AS one) \
                   SELECT * FROM inner_cte \
               ) \
               SELECT * FROM outer_cte JOIN analysis.base USING (one)";
    let refs = extract_dependencies(sql);
    assert_eq!(refs, vec![Reference::analysis("base")]);
}

#[test]
fn duplicates_are_removed_in_first_seen_order() {
    let sql = "SELECT * FROM analysis.a \
               UNION ALL SELECT * FROM analysis.b \
               UNION ALL SELECT * FROM analysis.a";
    let refs = extract_dependencies(sql);
    assert_eq!(refs, vec![Reference::analysis("a"), Reference::analysis("b")]);
}

#[test]
fn unparseable_sql_yields_no_references() {
    assert!(extract_dependencies("SELECT FROM WHERE").is_empty());
    assert!(extract_dependencies("").is_empty());
}

#[test]
fn only_the_first_statement_is_inspected() {
    let refs = extract_dependencies("SELECT * FROM analysis.a; SELECT * FROM analysis.b");
    assert_eq!(refs, vec![Reference::analysis("a")]);
}

#[test]
fn validate_sql_accepts_and_rejects() {
    assert!(validate_sql("SELECT 1 AS value").is_ok());
    assert!(validate_sql("SELECT FROM WHERE").is_err());
}
