// system-tests/src/lib.rs
// ============================================================================
// Module: duckpipe System Tests
// Description: Crate anchor for end-to-end test binaries.
// Purpose: Host the integration scenarios under tests/.
// Dependencies: duckpipe-core, duckpipe-duckdb, duckpipe-store-file
// ============================================================================

//! ## Overview
//! This crate exists to host the end-to-end scenarios in `tests/`: pipeline
//! flows over a real file store and an in-memory DuckDB warehouse. It
//! intentionally exports nothing.
