// crates/duckpipe-core/src/core/analysis.rs
// ============================================================================
// Module: duckpipe Analysis Model
// Description: The registered, reusable SQL analysis unit.
// Purpose: Carry SQL text, materialization strategy, parameters, and
//          declared dependencies with a portable document form.
// Dependencies: serde, time, crate::core::{params, reference, time}
// ============================================================================

//! ## Overview
//! An [`Analysis`] is the central entity of the engine: a named SQL query
//! with a stable id, a materialization strategy, declared parameters, and
//! typed dependencies. Instances are value-shaped; the engine never mutates
//! a stored Analysis in place. Document serialization keeps the exact key
//! names of the on-disk format so stored files stay portable, and accepts
//! the legacy list form of `parameters` on read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::params::ParameterDef;
use crate::core::plan::OperationKind;
use crate::core::reference::Reference;
use crate::core::time::serde_rfc3339_option;

// ============================================================================
// SECTION: Materialization
// ============================================================================

/// Physical form in which an Analysis result is written to the warehouse.
///
/// # Invariants
/// - Wire labels are stable (`view`, `table`, `append`, `parquet`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    /// `CREATE OR REPLACE VIEW` over the query.
    View,
    /// `CREATE OR REPLACE TABLE` from the query result.
    #[default]
    Table,
    /// `INSERT INTO` an existing (or executor-created) table.
    Append,
    /// `COPY` the query result to a parquet file.
    Parquet,
}

impl Materialization {
    /// Returns the warehouse operation performed by this strategy.
    #[must_use]
    pub const fn operation(self) -> OperationKind {
        match self {
            Self::View => OperationKind::CreateOrReplaceView,
            Self::Table => OperationKind::CreateOrReplaceTable,
            Self::Append => OperationKind::InsertInto,
            Self::Parquet => OperationKind::CopyToFile,
        }
    }
}

// ============================================================================
// SECTION: Analysis
// ============================================================================

/// A registered, reusable SQL analysis.
///
/// # Invariants
/// - `id` matches `[a-zA-Z_][a-zA-Z0-9_]*` once registered.
/// - `depends_on` entries are unique as canonical strings once registered.
/// - The result table `analysis.<id>` is owned exclusively by this Analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Stable unique identifier; forms the result table `analysis.<id>`.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// SELECT-shaped SQL text, optionally with `:param` placeholders.
    pub sql: String,
    /// Materialization strategy.
    #[serde(default)]
    pub materialize: Materialization,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared parameters, name-unique, in declaration order.
    #[serde(
        default,
        serialize_with = "parameters_serde::serialize",
        deserialize_with = "parameters_serde::deserialize",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parameters: Vec<ParameterDef>,
    /// Declared dependencies; auto-extracted at registration when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<Reference>,
    /// Organizational tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Creation timestamp (UTC), preserved across updates.
    #[serde(default, with = "serde_rfc3339_option", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<OffsetDateTime>,
    /// Last-update timestamp (UTC), refreshed on every save.
    #[serde(default, with = "serde_rfc3339_option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Analysis {
    /// Creates an Analysis with the required fields and empty metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        sql: impl Into<String>,
        materialize: Materialization,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sql: sql.into(),
            materialize,
            description: None,
            parameters: Vec::new(),
            depends_on: Vec::new(),
            tags: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns the result table name, always `analysis.<id>`.
    #[must_use]
    pub fn result_table(&self) -> String {
        format!("analysis.{}", self.id)
    }

    /// Returns the ids of analysis-kind dependencies, in declaration order.
    #[must_use]
    pub fn analysis_dependencies(&self) -> Vec<String> {
        self.depends_on
            .iter()
            .filter(|reference| reference.is_analysis())
            .map(|reference| reference.name.clone())
            .collect()
    }

    /// Returns the names of source-kind dependencies, in declaration order.
    #[must_use]
    pub fn source_dependencies(&self) -> Vec<String> {
        self.depends_on
            .iter()
            .filter(|reference| reference.is_source())
            .map(|reference| reference.name.clone())
            .collect()
    }
}

// ============================================================================
// SECTION: Parameter Document Form
// ============================================================================

/// Serde adapters for the `parameters` document key.
///
/// The canonical form is a mapping of parameter name to definition; the
/// legacy form is a list of definitions with inline names. Both are accepted
/// on read, only the mapping form is written.
mod parameters_serde {
    use std::fmt;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serialize;
    use serde::Serializer;
    use serde::de::MapAccess;
    use serde::de::SeqAccess;
    use serde::de::Visitor;

    use crate::core::params::ParamType;
    use crate::core::params::ParamValue;
    use crate::core::params::ParameterDef;

    /// Body of a parameter definition in mapping form (name is the key).
    #[derive(Serialize, Deserialize)]
    struct ParamBody {
        /// Declared parameter type.
        #[serde(rename = "type", default)]
        param_type: ParamType,
        /// Optional default value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<ParamValue>,
        /// Optional description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    }

    /// Serializes parameter definitions as a name-keyed mapping.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S>(parameters: &[ParameterDef], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(parameters.iter().map(|def| {
            (
                def.name.clone(),
                ParamBody {
                    param_type: def.param_type,
                    default: def.default.clone(),
                    description: def.description.clone(),
                },
            )
        }))
    }

    /// Visitor accepting mapping-form and legacy list-form parameters.
    struct ParametersVisitor;

    impl<'de> Visitor<'de> for ParametersVisitor {
        type Value = Vec<ParameterDef>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a mapping of parameter definitions or a list of them")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut parameters = Vec::new();
            while let Some((name, body)) = access.next_entry::<String, ParamBody>()? {
                parameters.push(ParameterDef {
                    name,
                    param_type: body.param_type,
                    default: body.default,
                    description: body.description,
                });
            }
            Ok(parameters)
        }

        fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut parameters = Vec::new();
            while let Some(def) = access.next_element::<ParameterDef>()? {
                parameters.push(def);
            }
            Ok(parameters)
        }
    }

    /// Deserializes parameter definitions from either accepted form.
    ///
    /// # Errors
    ///
    /// Propagates deserializer errors for malformed definitions.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<ParameterDef>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ParametersVisitor)
    }
}
