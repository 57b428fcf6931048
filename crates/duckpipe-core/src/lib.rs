// crates/duckpipe-core/src/lib.rs
// ============================================================================
// Module: duckpipe Core Library
// Description: Public API surface for the duckpipe engine.
// Purpose: Expose model types, interfaces, the SQL layer, and the runtime.
// Dependencies: crate::{core, errors, interfaces, runtime, sql}
// ============================================================================

//! ## Overview
//! duckpipe turns user-authored SQL into registered, reusable **Analyses**
//! whose results are materialized into an analytical warehouse. The engine
//! resolves transitive dependencies, orders them topologically, decides
//! which steps must re-run based on freshness, produces an inspectable
//! [`ExecutionPlan`], and executes it with per-step run records. It is
//! backend-agnostic: metadata stores and warehouse connections plug in
//! through the [`interfaces`] traits.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod errors;
pub mod interfaces;
pub mod runtime;
pub mod sql;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::Analysis;
pub use crate::core::AnalysisStatus;
pub use crate::core::ExecutionPlan;
pub use crate::core::ExecutionResult;
pub use crate::core::ExecutionStep;
pub use crate::core::Materialization;
pub use crate::core::OperationKind;
pub use crate::core::ParamMap;
pub use crate::core::ParamType;
pub use crate::core::ParamValue;
pub use crate::core::ParameterDef;
pub use crate::core::RefKind;
pub use crate::core::Reference;
pub use crate::core::ScalarValue;
pub use crate::core::StepAction;
pub use crate::core::StepResult;
pub use crate::core::StepStatus;
pub use crate::errors::PipelineError;
pub use crate::interfaces::MetadataStore;
pub use crate::interfaces::QueryOutput;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::Warehouse;
pub use crate::interfaces::WarehouseError;
pub use crate::runtime::InMemoryMetadataStore;
pub use crate::runtime::Pipeline;
