// crates/duckpipe-core/src/interfaces/mod.rs
// ============================================================================
// Module: duckpipe Interfaces
// Description: Backend-agnostic contracts for metadata storage and the
//              analytical warehouse.
// Purpose: Keep the engine free of backend detail; implementations slot in
//          behind these traits.
// Dependencies: serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! The engine touches the outside world through two traits. A
//! [`MetadataStore`] persists Analyses keyed by id; the default backend is
//! one YAML document per Analysis on disk, with an in-memory variant for
//! tests. A [`Warehouse`] executes single SQL statements with positional
//! `$N` bindings against the analytical database; the engine assumes
//! implicit-transaction granularity per statement and never spans
//! transactions across steps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::analysis::Analysis;
use crate::core::params::ScalarValue;

// ============================================================================
// SECTION: Metadata Store
// ============================================================================

/// Metadata store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage I/O failed.
    #[error("metadata store io error: {0}")]
    Io(String),
    /// An Analysis could not be serialized to its document form.
    #[error("metadata store serialize error: {0}")]
    Serialize(String),
    /// A stored document could not be deserialized.
    #[error("metadata store deserialize error: {0}")]
    Deserialize(String),
}

/// Abstract persistence of Analyses keyed by id.
///
/// Implementations must make `save` durable (a subsequent `get` observes the
/// written value; partial writes are never visible), preserve the prior
/// `created_at` for an existing id, and refresh `updated_at` on every save.
pub trait MetadataStore {
    /// Retrieves an Analysis by id; absent ids yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O or deserialization failure.
    fn get(&self, analysis_id: &str) -> Result<Option<Analysis>, StoreError>;

    /// Lists every stored Analysis; ordering is unspecified.
    ///
    /// Malformed documents are skipped rather than failing the listing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_all(&self) -> Result<Vec<Analysis>, StoreError>;

    /// Creates or replaces an Analysis, returning the stored value with
    /// resolved timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O or serialization failure.
    fn save(&self, analysis: &Analysis) -> Result<Analysis, StoreError>;

    /// Deletes an Analysis by id; deleting a missing id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn delete(&self, analysis_id: &str) -> Result<(), StoreError>;

    /// Returns true when an Analysis with the id is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn exists(&self, analysis_id: &str) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Warehouse
// ============================================================================

/// Warehouse errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WarehouseError {
    /// The warehouse connection could not be established.
    #[error("warehouse connection error: {0}")]
    Connection(String),
    /// A SQL statement failed to execute.
    #[error("warehouse execution error: {0}")]
    Execution(String),
}

/// Column-labeled result rows from a warehouse query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Column names in select order.
    pub columns: Vec<String>,
    /// Rows of scalar values, one entry per column.
    pub rows: Vec<Vec<ScalarValue>>,
}

impl QueryOutput {
    /// Returns the first row, if any.
    #[must_use]
    pub fn first_row(&self) -> Option<&[ScalarValue]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Returns the first value of the first row, if any.
    #[must_use]
    pub fn first_value(&self) -> Option<&ScalarValue> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// Connection to the analytical warehouse.
///
/// One call maps to one statement at the connection's implicit-transaction
/// granularity. Positional parameters bind to `$1..$N` markers in order.
pub trait Warehouse {
    /// Executes a statement for its side effects.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the statement fails.
    fn execute(&self, sql: &str, params: &[ScalarValue]) -> Result<(), WarehouseError>;

    /// Executes a statement and fetches all result rows.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the statement fails.
    fn query(&self, sql: &str, params: &[ScalarValue]) -> Result<QueryOutput, WarehouseError>;
}
