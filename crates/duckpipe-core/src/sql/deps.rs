// crates/duckpipe-core/src/sql/deps.rs
// ============================================================================
// Module: duckpipe Dependency Extraction
// Description: Table-reference extraction from analysis SQL.
// Purpose: Turn referenced tables into typed references, excluding CTEs.
// Dependencies: sqlparser, crate::core::reference
// ============================================================================

//! ## Overview
//! Registration auto-populates `depends_on` by parsing the analysis SQL with
//! the DuckDB dialect and walking it for table references. Tables under the
//! `analysis` schema become analysis references, tables under `source`
//! become source references, path-shaped names become file references, and
//! everything else is assumed to be an external source. Names defined as
//! common table expressions in the same query are excluded. A SQL text that
//! fails to parse yields no references; the caller may still declare
//! `depends_on` explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use sqlparser::ast::ObjectName;
use sqlparser::ast::Query;
use sqlparser::ast::Visit;
use sqlparser::ast::Visitor;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

use crate::core::reference::Reference;
use crate::errors::PipelineError;

// ============================================================================
// SECTION: Collector
// ============================================================================

/// A table reference observed in the statement, split into naming parts.
#[derive(Debug)]
struct ObservedTable {
    /// Schema prefix (dot-joined when multi-part), empty for bare names.
    schema: String,
    /// Unqualified table name.
    name: String,
    /// Fully qualified name as written.
    full_name: String,
}

/// AST visitor collecting table relations and CTE aliases in one pass.
#[derive(Debug, Default)]
struct TableCollector {
    /// Lowercased CTE aliases defined anywhere in the statement.
    cte_names: BTreeSet<String>,
    /// Table relations in first-seen order.
    tables: Vec<ObservedTable>,
}

impl Visitor for TableCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names.insert(cte.alias.name.value.to_lowercase());
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let mut parts = Vec::with_capacity(relation.0.len());
        for part in &relation.0 {
            match part.as_ident() {
                Some(ident) => parts.push(ident.value.clone()),
                None => return ControlFlow::Continue(()),
            }
        }
        if let Some((name, schema_parts)) = parts.split_last() {
            if name.is_empty() {
                return ControlFlow::Continue(());
            }
            let schema = schema_parts.join(".");
            let full_name = if schema.is_empty() {
                name.clone()
            } else {
                format!("{schema}.{name}")
            };
            self.tables.push(ObservedTable {
                schema,
                name: name.clone(),
                full_name,
            });
        }
        ControlFlow::Continue(())
    }
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts typed dependencies from analysis SQL.
///
/// Only the first statement of the text is inspected. Parse failures yield
/// an empty list; duplicates are removed in first-seen order.
#[must_use]
pub fn extract_dependencies(sql: &str) -> Vec<Reference> {
    let Ok(statements) = Parser::parse_sql(&DuckDbDialect {}, sql) else {
        return Vec::new();
    };
    let Some(statement) = statements.first() else {
        return Vec::new();
    };

    let mut collector = TableCollector::default();
    let _ = statement.visit(&mut collector);

    let mut seen = BTreeSet::new();
    let mut references = Vec::new();
    for table in &collector.tables {
        if collector.cte_names.contains(&table.full_name.to_lowercase())
            || collector.cte_names.contains(&table.name.to_lowercase())
        {
            continue;
        }
        if !seen.insert(table.full_name.clone()) {
            continue;
        }
        references.push(classify(table));
    }
    references
}

/// Classifies one observed table into a typed reference.
fn classify(table: &ObservedTable) -> Reference {
    match table.schema.to_lowercase().as_str() {
        "analysis" => Reference::analysis(&table.name),
        "source" => Reference::source(&table.name),
        _ if is_file_path(&table.full_name) => Reference::file(&table.full_name),
        _ => Reference::source(&table.full_name),
    }
}

/// Returns true for names that look like local data files.
fn is_file_path(name: &str) -> bool {
    name.starts_with('/') || name.ends_with(".parquet") || name.ends_with(".csv")
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Checks that a SQL text parses under the DuckDB dialect.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] with the parser message when the
/// text does not parse.
pub fn validate_sql(sql: &str) -> Result<(), PipelineError> {
    Parser::parse_sql(&DuckDbDialect {}, sql)
        .map(|_| ())
        .map_err(|err| PipelineError::Validation(format!("invalid SQL: {err}")))
}
