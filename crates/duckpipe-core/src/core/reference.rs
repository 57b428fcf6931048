// crates/duckpipe-core/src/core/reference.rs
// ============================================================================
// Module: duckpipe Dependency References
// Description: Typed references to analyses, external sources, and files.
// Purpose: Provide the unit of a dependency edge with a stable wire form.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Reference`] is a tagged `(kind, name)` pair identifying what an
//! Analysis reads from: another Analysis, an external source table, or a
//! local file. References serialize as `kind:name` strings so stored
//! documents remain portable, and a bare name parses as an analysis
//! reference for backwards compatibility with early documents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Visitor;

// ============================================================================
// SECTION: Reference Kind
// ============================================================================

/// Kind of a dependency reference.
///
/// # Invariants
/// - Wire labels (`analysis`, `source`, `file`) are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefKind {
    /// Reference to another registered Analysis.
    Analysis,
    /// Reference to an external data source.
    Source,
    /// Reference to a local file.
    File,
}

impl RefKind {
    /// Returns the stable wire label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Source => "source",
            Self::File => "file",
        }
    }

    /// Parses a wire label into a kind.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "analysis" => Some(Self::Analysis),
            "source" => Some(Self::Source),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Reference
// ============================================================================

/// Typed dependency reference.
///
/// # Invariants
/// - Value semantics: two references are equal iff kind and name are equal.
/// - `name` is never empty for references produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    /// Reference kind.
    pub kind: RefKind,
    /// Referenced name (analysis id, source name, or file path).
    pub name: String,
}

impl Reference {
    /// Creates a reference of the given kind.
    #[must_use]
    pub fn new(kind: RefKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Creates an analysis reference.
    #[must_use]
    pub fn analysis(name: impl Into<String>) -> Self {
        Self::new(RefKind::Analysis, name)
    }

    /// Creates a source reference.
    #[must_use]
    pub fn source(name: impl Into<String>) -> Self {
        Self::new(RefKind::Source, name)
    }

    /// Creates a file reference.
    #[must_use]
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(RefKind::File, name)
    }

    /// Parses a reference string.
    ///
    /// `kind:name` maps to the tagged kind; a bare name is treated as an
    /// analysis reference; an unknown kind prefix yields a source reference
    /// carrying the full original string.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            None => Self::analysis(text),
            Some((label, name)) => match RefKind::from_label(label) {
                Some(kind) => Self::new(kind, name),
                None => Self::source(text),
            },
        }
    }

    /// Returns true when this references another Analysis.
    #[must_use]
    pub const fn is_analysis(&self) -> bool {
        matches!(self.kind, RefKind::Analysis)
    }

    /// Returns true when this references an external source.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self.kind, RefKind::Source)
    }

    /// Returns true when this references a local file.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, RefKind::File)
    }

    /// Renders the reference as a warehouse table expression.
    ///
    /// Analyses live under the `analysis` schema, sources under `source`
    /// with dots flattened to underscores, and files become a parquet read
    /// over the path.
    #[must_use]
    pub fn to_table_name(&self) -> String {
        match self.kind {
            RefKind::Analysis => format!("analysis.{}", self.name),
            RefKind::Source => format!("source.{}", self.name.replace('.', "_")),
            RefKind::File => format!("read_parquet('{}')", self.name),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

// ============================================================================
// SECTION: Serde
// ============================================================================

impl Serialize for Reference {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Visitor deserializing a reference from its canonical string form.
struct ReferenceVisitor;

impl<'de> Visitor<'de> for ReferenceVisitor {
    type Value = Reference;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a reference string of the form 'kind:name'")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(Reference::parse(value))
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(ReferenceVisitor)
    }
}
