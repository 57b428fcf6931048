// crates/duckpipe-core/src/sql/mod.rs
// ============================================================================
// Module: duckpipe SQL Layer
// Description: Dependency extraction and SQL compilation.
// Purpose: Bridge analysis SQL text and executable warehouse statements.
// Dependencies: regex, sqlparser, crate::core
// ============================================================================

//! ## Overview
//! The SQL layer has two halves: [`deps`] parses analysis SQL to discover
//! what it reads, and [`compiler`] binds parameters and wraps queries in
//! their materialization statements. Neither half touches the warehouse.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod compiler;
pub mod deps;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use compiler::CompiledSql;
pub use compiler::compile_analysis_sql;
pub use compiler::compile_preview_sql;
pub use compiler::quote_identifier;
pub use compiler::validate_identifier;
pub use deps::extract_dependencies;
pub use deps::validate_sql;
