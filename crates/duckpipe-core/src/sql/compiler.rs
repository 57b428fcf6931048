// crates/duckpipe-core/src/sql/compiler.rs
// ============================================================================
// Module: duckpipe SQL Compiler
// Description: Placeholder binding, identifier quoting, materialization
//              wrapping.
// Purpose: Turn analysis SQL plus caller params into a single executable
//          statement with positional bindings.
// Dependencies: regex, crate::core::{analysis, params}
// ============================================================================

//! ## Overview
//! Compilation binds `:name` placeholders to positional `$N` markers
//! (1-indexed, in textual order) and wraps the bound SELECT with the
//! statement required by the materialization strategy. Binding is textual
//! and regex-scoped: placeholders inside string literals or comments may
//! match, which callers accept in exchange for predictable semantics.
//! `::` type casts and `:name:`-shaped tokens are left intact, as are
//! placeholders with no matching parameter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;

use crate::core::analysis::Materialization;
use crate::core::params::ParamMap;
use crate::core::params::ParamValue;
use crate::core::params::ScalarValue;
use crate::errors::PipelineError;

// ============================================================================
// SECTION: Reserved Words
// ============================================================================

/// Reserved SQL words that force double-quote escaping at render time.
const RESERVED_WORDS: &[&str] = &[
    "all", "alter", "and", "as", "between", "by", "case", "check", "constraint", "create",
    "default", "delete", "distinct", "drop", "else", "end", "false", "foreign", "from", "group",
    "having", "in", "index", "insert", "into", "is", "join", "key", "like", "limit", "not",
    "null", "offset", "on", "or", "order", "primary", "references", "select", "set", "table",
    "then", "true", "union", "unique", "update", "values", "view", "when", "where",
];

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Returns true when one identifier part is well-formed.
fn is_valid_identifier_part(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Returns true when an identifier part collides with a reserved word.
fn needs_quoting(part: &str) -> bool {
    RESERVED_WORDS.contains(&part.to_lowercase().as_str())
}

/// Validates a dot-separated identifier.
///
/// Each part must start with a letter or underscore and contain only
/// letters, digits, and underscores.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] for empty or malformed identifiers.
pub fn validate_identifier(identifier: &str) -> Result<(), PipelineError> {
    if identifier.is_empty() {
        return Err(PipelineError::Validation("identifier cannot be empty".to_string()));
    }
    for part in identifier.split('.') {
        if !is_valid_identifier_part(part) {
            return Err(PipelineError::Validation(format!(
                "invalid identifier '{part}': must start with a letter or underscore and \
                 contain only letters, digits, and underscores"
            )));
        }
    }
    Ok(())
}

/// Validates and renders a dot-separated identifier, quoting reserved parts.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] for empty or malformed identifiers.
pub fn quote_identifier(identifier: &str) -> Result<String, PipelineError> {
    validate_identifier(identifier)?;
    let quoted: Vec<String> = identifier
        .split('.')
        .map(|part| {
            if needs_quoting(part) {
                format!("\"{part}\"")
            } else {
                part.to_string()
            }
        })
        .collect();
    Ok(quoted.join("."))
}

// ============================================================================
// SECTION: Parameter Binding
// ============================================================================

/// Compiled SQL with its positional bindings.
///
/// `params` is absent when the statement requires no bindings; callers must
/// not supply any at execute time.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    /// Final executable statement.
    pub sql: String,
    /// Positional bindings in `$1..$N` order, absent when none are required.
    pub params: Option<Vec<ScalarValue>>,
}

/// Returns the compiled placeholder pattern (`:name`, including `::` casts).
fn param_pattern() -> Result<&'static Regex, PipelineError> {
    /// Lazily compiled placeholder pattern shared across calls.
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    match PATTERN.get_or_init(|| Regex::new(r":{1,2}[A-Za-z_0-9]+")) {
        Ok(regex) => Ok(regex),
        Err(err) => Err(PipelineError::Validation(format!("placeholder pattern: {err}"))),
    }
}

/// Binds `:name` placeholders to positional `$N` markers.
///
/// Scalar values claim one marker each; list values expand to a
/// parenthesized marker group with one marker per element (an empty list
/// renders `()` and binds nothing, which the warehouse will reject).
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] when the placeholder pattern is
/// unavailable.
fn bind_parameters(
    sql: &str,
    params: Option<&ParamMap>,
) -> Result<(String, Option<Vec<ScalarValue>>), PipelineError> {
    let Some(params) = params.filter(|map| !map.is_empty()) else {
        return Ok((sql.to_string(), None));
    };

    let pattern = param_pattern()?;
    let mut bound: Vec<ScalarValue> = Vec::new();
    let mut next_marker = 1_usize;
    let mut output = String::with_capacity(sql.len());
    let mut last_end = 0_usize;

    for found in pattern.find_iter(sql) {
        output.push_str(&sql[last_end .. found.start()]);
        last_end = found.end();

        let token = found.as_str();
        let followed_by_colon = sql[found.end() ..].starts_with(':');
        if token.starts_with("::") || followed_by_colon {
            output.push_str(token);
            continue;
        }

        match params.get(&token[1 ..]) {
            None => output.push_str(token),
            Some(ParamValue::Scalar(value)) => {
                bound.push(value.clone());
                output.push_str(&format!("${next_marker}"));
                next_marker += 1;
            }
            Some(ParamValue::List(values)) => {
                let markers: Vec<String> = (0 .. values.len())
                    .map(|offset| format!("${}", next_marker + offset))
                    .collect();
                bound.extend(values.iter().cloned());
                next_marker += values.len();
                output.push_str(&format!("({})", markers.join(", ")));
            }
        }
    }
    output.push_str(&sql[last_end ..]);

    let bound = if bound.is_empty() { None } else { Some(bound) };
    Ok((output, bound))
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// Compiles analysis SQL into its materialized statement form.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] when the target identifier is
/// malformed.
pub fn compile_analysis_sql(
    sql: &str,
    materialize: Materialization,
    result_table: &str,
    params: Option<&ParamMap>,
) -> Result<CompiledSql, PipelineError> {
    let (bound_sql, bound_params) = bind_parameters(sql, params)?;
    let final_sql = match materialize {
        Materialization::View => {
            format!("CREATE OR REPLACE VIEW {} AS {bound_sql}", quote_identifier(result_table)?)
        }
        Materialization::Table => {
            format!("CREATE OR REPLACE TABLE {} AS {bound_sql}", quote_identifier(result_table)?)
        }
        Materialization::Append => {
            format!("INSERT INTO {} {bound_sql}", quote_identifier(result_table)?)
        }
        Materialization::Parquet => {
            format!("COPY ({bound_sql}) TO '{result_table}' (FORMAT PARQUET)")
        }
    };
    Ok(CompiledSql {
        sql: final_sql,
        params: bound_params,
    })
}

/// Compiles analysis SQL for preview: bindings only, no materialization wrap.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] when the placeholder pattern is
/// unavailable.
pub fn compile_preview_sql(
    sql: &str,
    params: Option<&ParamMap>,
) -> Result<CompiledSql, PipelineError> {
    let (bound_sql, bound_params) = bind_parameters(sql, params)?;
    Ok(CompiledSql {
        sql: bound_sql,
        params: bound_params,
    })
}
