// crates/duckpipe-core/src/runtime/store.rs
// ============================================================================
// Module: duckpipe In-Memory Store
// Description: Simple in-memory metadata store for tests and examples.
// Purpose: Provide a deterministic store implementation without external
//          dependencies.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of
//! [`MetadataStore`] for tests and local demos. It honors the same save
//! semantics as durable backends (prior `created_at` preserved,
//! `updated_at` refreshed) but is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::analysis::Analysis;
use crate::core::time::now_utc;
use crate::interfaces::MetadataStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory metadata store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMetadataStore {
    /// Analysis map protected by a mutex.
    analyses: Arc<Mutex<BTreeMap<String, Analysis>>>,
}

impl InMemoryMetadataStore {
    /// Creates a new in-memory metadata store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            analyses: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, analysis_id: &str) -> Result<Option<Analysis>, StoreError> {
        let guard = self
            .analyses
            .lock()
            .map_err(|_| StoreError::Io("metadata store mutex poisoned".to_string()))?;
        Ok(guard.get(analysis_id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Analysis>, StoreError> {
        let guard = self
            .analyses
            .lock()
            .map_err(|_| StoreError::Io("metadata store mutex poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }

    fn save(&self, analysis: &Analysis) -> Result<Analysis, StoreError> {
        let mut guard = self
            .analyses
            .lock()
            .map_err(|_| StoreError::Io("metadata store mutex poisoned".to_string()))?;
        let mut stored = analysis.clone();
        if let Some(existing) = guard.get(&stored.id)
            && existing.created_at.is_some()
        {
            stored.created_at = existing.created_at;
        }
        if stored.created_at.is_none() {
            stored.created_at = Some(now_utc());
        }
        stored.updated_at = Some(now_utc());
        guard.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn delete(&self, analysis_id: &str) -> Result<(), StoreError> {
        let mut guard = self
            .analyses
            .lock()
            .map_err(|_| StoreError::Io("metadata store mutex poisoned".to_string()))?;
        guard.remove(analysis_id);
        Ok(())
    }

    fn exists(&self, analysis_id: &str) -> Result<bool, StoreError> {
        let guard = self
            .analyses
            .lock()
            .map_err(|_| StoreError::Io("metadata store mutex poisoned".to_string()))?;
        Ok(guard.contains_key(analysis_id))
    }
}
