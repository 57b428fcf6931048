// crates/duckpipe-store-file/src/store.rs
// ============================================================================
// Module: YAML File Metadata Store
// Description: Durable MetadataStore with one YAML document per Analysis.
// Purpose: Persist analysis definitions as diff-friendly, git-trackable
//          files with atomic replacement on save.
// Dependencies: duckpipe-core, serde_yaml, tempfile, thiserror
// ============================================================================

//! ## Overview
//! Each Analysis is stored as `<base_path>/<id>.yaml`. Saves serialize to a
//! temporary file in the same directory and atomically rename it over the
//! target, so a crash never leaves a partially written document visible.
//! Prior `created_at` values are preserved across saves and `updated_at` is
//! refreshed. Listing skips documents that fail to deserialize; repairing
//! them is the caller's responsibility.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use duckpipe_core::Analysis;
use duckpipe_core::StoreError;
use duckpipe_core::core::time::now_utc;
use duckpipe_core::interfaces::MetadataStore;
use tempfile::NamedTempFile;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File extension of stored analysis documents.
const DOCUMENT_EXTENSION: &str = "yaml";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// File store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// Filesystem operation failed.
    #[error("file store io error: {0}")]
    Io(String),
    /// An Analysis could not be serialized to YAML.
    #[error("file store serialize error: {0}")]
    Serialize(String),
    /// A stored document could not be deserialized.
    #[error("file store deserialize error: {0}")]
    Deserialize(String),
}

impl From<FileStoreError> for StoreError {
    fn from(error: FileStoreError) -> Self {
        match error {
            FileStoreError::Io(message) => Self::Io(message),
            FileStoreError::Serialize(message) => Self::Serialize(message),
            FileStoreError::Deserialize(message) => Self::Deserialize(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// YAML file-backed metadata store.
///
/// # Invariants
/// - One document per Analysis, named `<id>.yaml`.
/// - Saves are atomic (write to a sibling temp file, then rename).
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    /// Directory holding the analysis documents.
    base_path: PathBuf,
}

impl FileMetadataStore {
    /// Opens a file store rooted at the given directory, creating it when
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] when the directory cannot be created.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).map_err(|err| FileStoreError::Io(err.to_string()))?;
        Ok(Self { base_path })
    }

    /// Returns the directory holding the analysis documents.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the document path for an analysis id.
    fn path_for(&self, analysis_id: &str) -> PathBuf {
        self.base_path.join(format!("{analysis_id}.{DOCUMENT_EXTENSION}"))
    }

    /// Reads and deserializes one document; missing files yield `None`.
    fn read_document(&self, path: &Path) -> Result<Option<Analysis>, FileStoreError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FileStoreError::Io(err.to_string())),
        };
        serde_yaml::from_str(&text)
            .map(Some)
            .map_err(|err| FileStoreError::Deserialize(err.to_string()))
    }

    /// Serializes and atomically replaces one document.
    fn write_document(&self, path: &Path, analysis: &Analysis) -> Result<(), FileStoreError> {
        let text = serde_yaml::to_string(analysis)
            .map_err(|err| FileStoreError::Serialize(err.to_string()))?;
        let mut temp = NamedTempFile::new_in(&self.base_path)
            .map_err(|err| FileStoreError::Io(err.to_string()))?;
        temp.write_all(text.as_bytes()).map_err(|err| FileStoreError::Io(err.to_string()))?;
        temp.persist(path).map_err(|err| FileStoreError::Io(err.to_string()))?;
        Ok(())
    }
}

impl MetadataStore for FileMetadataStore {
    fn get(&self, analysis_id: &str) -> Result<Option<Analysis>, StoreError> {
        self.read_document(&self.path_for(analysis_id)).map_err(StoreError::from)
    }

    fn list_all(&self) -> Result<Vec<Analysis>, StoreError> {
        let entries =
            fs::read_dir(&self.base_path).map_err(|err| StoreError::Io(err.to_string()))?;
        let mut analyses = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::Io(err.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            match self.read_document(&path) {
                Ok(Some(analysis)) => analyses.push(analysis),
                Ok(None) | Err(FileStoreError::Deserialize(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(analyses)
    }

    fn save(&self, analysis: &Analysis) -> Result<Analysis, StoreError> {
        let path = self.path_for(&analysis.id);
        let mut stored = analysis.clone();

        let existing = self.read_document(&path).ok().flatten();
        if let Some(previous) = existing
            && previous.created_at.is_some()
        {
            stored.created_at = previous.created_at;
        }
        if stored.created_at.is_none() {
            stored.created_at = Some(now_utc());
        }
        stored.updated_at = Some(now_utc());

        self.write_document(&path, &stored)?;
        Ok(stored)
    }

    fn delete(&self, analysis_id: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(analysis_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err.to_string())),
        }
    }

    fn exists(&self, analysis_id: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(analysis_id).exists())
    }
}
