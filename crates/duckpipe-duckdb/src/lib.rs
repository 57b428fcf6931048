// crates/duckpipe-duckdb/src/lib.rs
// ============================================================================
// Module: duckpipe DuckDB Library
// Description: Public surface of the DuckDB warehouse backend.
// Purpose: Expose the DuckDB-backed Warehouse implementation.
// Dependencies: crate::warehouse
// ============================================================================

//! ## Overview
//! DuckDB-backed warehouse for duckpipe: an embedded analytical database
//! opened on a file or in memory, driven one statement at a time with
//! positional `$N` bindings.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod warehouse;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use warehouse::DuckDbWarehouse;
