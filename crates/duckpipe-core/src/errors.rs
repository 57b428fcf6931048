// crates/duckpipe-core/src/errors.rs
// ============================================================================
// Module: duckpipe Error Set
// Description: The closed error set surfaced by the engine.
// Purpose: Give callers a stable, matchable error contract.
// Dependencies: thiserror, crate::interfaces
// ============================================================================

//! ## Overview
//! Every fallible engine surface returns [`PipelineError`]. Planner-side
//! kinds (`AnalysisNotFound`, `CircularDependency`, `Validation`,
//! `Parameter`, `Compilation`) abort planning and surface to the caller.
//! `Execution` is raised by warehouse-touching queries (`status`, `preview`,
//! history reads, freshness checks); during `execute` itself, step failures
//! are captured into step results instead of propagating. `Storage` wraps
//! metadata-store failures unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::interfaces::StoreError;
use crate::interfaces::WarehouseError;

// ============================================================================
// SECTION: Pipeline Errors
// ============================================================================

/// The closed error set of the pipeline engine.
///
/// # Invariants
/// - Variants are stable for programmatic handling across implementations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A requested analysis id is not present in the metadata store.
    #[error("analysis '{analysis_id}' not found")]
    AnalysisNotFound {
        /// The missing analysis id.
        analysis_id: String,
    },
    /// The collected dependency subgraph contains a cycle.
    #[error("circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the offending cycle.
        cycle: String,
    },
    /// An identifier or parameter definition is malformed.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Parameter coercion or binding failed.
    #[error("parameter '{param_name}': {message}")]
    Parameter {
        /// Name of the offending parameter.
        param_name: String,
        /// What went wrong.
        message: String,
    },
    /// SQL compilation failed for an analysis.
    #[error("failed to compile '{analysis_id}': {message}")]
    Compilation {
        /// Analysis whose SQL failed to compile.
        analysis_id: String,
        /// What went wrong.
        message: String,
    },
    /// A warehouse statement failed outside the step-result capture path.
    #[error("failed to execute '{analysis_id}': {source}")]
    Execution {
        /// Analysis the statement was issued for.
        analysis_id: String,
        /// The underlying warehouse error.
        source: WarehouseError,
    },
    /// The metadata store reported an I/O or serialization failure.
    #[error("metadata store error: {0}")]
    Storage(#[from] StoreError),
}

impl PipelineError {
    /// Builds an [`PipelineError::Execution`] for the given analysis.
    #[must_use]
    pub fn execution(analysis_id: impl Into<String>, source: WarehouseError) -> Self {
        Self::Execution {
            analysis_id: analysis_id.into(),
            source,
        }
    }
}
