// crates/duckpipe-cli/src/main.rs
// ============================================================================
// Module: duckpipe CLI Entry Point
// Description: Command dispatcher for the duckpipe engine.
// Purpose: Register, plan, run, and inspect analyses from a terminal over
//          the file store and an embedded DuckDB warehouse.
// Dependencies: clap, duckpipe-core, duckpipe-duckdb, duckpipe-store-file,
//               serde_json, serde_yaml, thiserror, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `duckpipe` binary drives the engine end to end: analysis documents
//! live in `--analyses-dir`, results materialize into the DuckDB database at
//! `--database` (an in-memory database when omitted). `compile` prints the
//! plan without touching warehouse state; `run` executes it. Inspection
//! commands accept `--json` for machine-readable output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use duckpipe_core::Analysis;
use duckpipe_core::ParamMap;
use duckpipe_core::PipelineError;
use duckpipe_core::Pipeline;
use duckpipe_core::WarehouseError;
use duckpipe_core::core::time::format_rfc3339;
use duckpipe_core::sql::deps::validate_sql;
use duckpipe_duckdb::DuckDbWarehouse;
use duckpipe_store_file::FileMetadataStore;
use duckpipe_store_file::FileStoreError;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Top-level argument parser for the `duckpipe` binary.
#[derive(Debug, Parser)]
#[command(name = "duckpipe", version, about = "SQL pipeline engine over DuckDB")]
struct Cli {
    /// Directory holding analysis documents.
    #[arg(
        long,
        env = "DUCKPIPE_ANALYSES_DIR",
        default_value = "analyses",
        global = true,
        value_name = "DIR"
    )]
    analyses_dir: PathBuf,
    /// DuckDB database file; an in-memory database when omitted.
    #[arg(long, env = "DUCKPIPE_DATABASE", global = true, value_name = "FILE")]
    database: Option<PathBuf>,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Command,
}

/// Subcommands of the `duckpipe` binary.
#[derive(Debug, Subcommand)]
enum Command {
    /// Register or update an analysis from a YAML document.
    Register {
        /// Path to the analysis document.
        file: PathBuf,
    },
    /// List registered analyses.
    List {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Show one analysis document.
    Show {
        /// Analysis id to show.
        analysis_id: String,
        /// Emit JSON instead of YAML.
        #[arg(long)]
        json: bool,
    },
    /// Delete an analysis (warehouse artifacts are left in place).
    Delete {
        /// Analysis id to delete.
        analysis_id: String,
    },
    /// Compile an execution plan without executing it.
    Compile {
        /// Target analysis id.
        analysis_id: String,
        /// Plan every step as RUN regardless of freshness.
        #[arg(long)]
        force: bool,
        /// Parameter for the target analysis, as `name=value` (repeatable).
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Emit the full plan as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Compile and execute an analysis.
    Run {
        /// Target analysis id.
        analysis_id: String,
        /// Run every step regardless of freshness.
        #[arg(long)]
        force: bool,
        /// Keep executing independent steps after a failure.
        #[arg(long)]
        continue_on_failure: bool,
        /// Parameter for the target analysis, as `name=value` (repeatable).
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Emit the full result as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Show freshness and last-run state for an analysis.
    Status {
        /// Analysis id to inspect.
        analysis_id: String,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Show recent run history for an analysis, newest first.
    History {
        /// Analysis id to inspect.
        analysis_id: String,
        /// Maximum number of runs to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Run an analysis query without materializing and show sample rows.
    Preview {
        /// Analysis id to preview.
        analysis_id: String,
        /// Parameter for the analysis, as `name=value` (repeatable).
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Maximum number of rows to fetch.
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Show the dependency DAG of registered analyses.
    Dag {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Terminal-facing error carrying one message line.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self { message }
    }
}

impl From<PipelineError> for CliError {
    fn from(error: PipelineError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<WarehouseError> for CliError {
    fn from(error: WarehouseError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<FileStoreError> for CliError {
    fn from(error: FileStoreError) -> Self {
        Self::new(error.to_string())
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Dispatches the parsed command.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let store = FileMetadataStore::new(&cli.analyses_dir)?;
    let pipeline = Pipeline::new(store);

    match cli.command {
        Command::Register { file } => command_register(&pipeline, &file),
        Command::List { json } => command_list(&pipeline, json),
        Command::Show { analysis_id, json } => command_show(&pipeline, &analysis_id, json),
        Command::Delete { analysis_id } => command_delete(&pipeline, &analysis_id),
        Command::Compile {
            analysis_id,
            force,
            params,
            json,
        } => command_compile(&pipeline, cli.database.as_deref(), &analysis_id, force, &params, json),
        Command::Run {
            analysis_id,
            force,
            continue_on_failure,
            params,
            json,
        } => command_run(
            &pipeline,
            cli.database.as_deref(),
            &analysis_id,
            force,
            continue_on_failure,
            &params,
            json,
        ),
        Command::Status { analysis_id, json } => {
            command_status(&pipeline, cli.database.as_deref(), &analysis_id, json)
        }
        Command::History {
            analysis_id,
            limit,
            json,
        } => command_history(&pipeline, cli.database.as_deref(), &analysis_id, limit, json),
        Command::Preview {
            analysis_id,
            params,
            limit,
        } => command_preview(&pipeline, cli.database.as_deref(), &analysis_id, &params, limit),
        Command::Dag { json } => command_dag(&pipeline, json),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Registers an analysis from a YAML document.
fn command_register(
    pipeline: &Pipeline<FileMetadataStore>,
    file: &Path,
) -> CliResult<ExitCode> {
    let text = std::fs::read_to_string(file)
        .map_err(|err| CliError::new(format!("failed to read {}: {err}", file.display())))?;
    let analysis: Analysis = serde_yaml::from_str(&text)
        .map_err(|err| CliError::new(format!("malformed analysis document: {err}")))?;
    validate_sql(&analysis.sql)?;
    let stored = pipeline.register(analysis)?;
    emit(&format!("registered analysis '{}'", stored.id))?;
    Ok(ExitCode::SUCCESS)
}

/// Lists registered analyses.
fn command_list(pipeline: &Pipeline<FileMetadataStore>, json: bool) -> CliResult<ExitCode> {
    let mut analyses = pipeline.list_all()?;
    analyses.sort_by(|a, b| a.id.cmp(&b.id));
    if json {
        emit_json(&analyses)?;
        return Ok(ExitCode::SUCCESS);
    }
    for analysis in &analyses {
        let materialize = serde_yaml::to_string(&analysis.materialize)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        emit(&format!("{:<24} {:<8} {}", analysis.id, materialize, analysis.name))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Shows one analysis document.
fn command_show(
    pipeline: &Pipeline<FileMetadataStore>,
    analysis_id: &str,
    json: bool,
) -> CliResult<ExitCode> {
    let analysis = pipeline.get(analysis_id)?.ok_or_else(|| {
        CliError::new(format!("analysis '{analysis_id}' not found"))
    })?;
    if json {
        emit_json(&analysis)?;
    } else {
        let text = serde_yaml::to_string(&analysis)
            .map_err(|err| CliError::new(format!("failed to render document: {err}")))?;
        emit(text.trim_end())?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Deletes one analysis.
fn command_delete(
    pipeline: &Pipeline<FileMetadataStore>,
    analysis_id: &str,
) -> CliResult<ExitCode> {
    pipeline.delete(analysis_id)?;
    emit(&format!("deleted analysis '{analysis_id}'"))?;
    Ok(ExitCode::SUCCESS)
}

/// Compiles and prints an execution plan.
fn command_compile(
    pipeline: &Pipeline<FileMetadataStore>,
    database: Option<&Path>,
    analysis_id: &str,
    force: bool,
    raw_params: &[String],
    json: bool,
) -> CliResult<ExitCode> {
    let params = resolve_params(pipeline, analysis_id, raw_params)?;
    let warehouse = open_warehouse(database)?;
    let plan = pipeline.compile(analysis_id, params.as_ref(), force, Some(&warehouse))?;
    if json {
        emit_json(&plan)?;
    } else {
        emit(&plan.summary())?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Compiles and executes an analysis.
fn command_run(
    pipeline: &Pipeline<FileMetadataStore>,
    database: Option<&Path>,
    analysis_id: &str,
    force: bool,
    continue_on_failure: bool,
    raw_params: &[String],
    json: bool,
) -> CliResult<ExitCode> {
    let params = resolve_params(pipeline, analysis_id, raw_params)?;
    let warehouse = open_warehouse(database)?;
    let result =
        pipeline.run(&warehouse, analysis_id, params.as_ref(), force, continue_on_failure)?;
    if json {
        emit_json(&result)?;
    } else {
        emit(&result.summary())?;
    }
    if result.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Shows freshness and last-run state.
fn command_status(
    pipeline: &Pipeline<FileMetadataStore>,
    database: Option<&Path>,
    analysis_id: &str,
    json: bool,
) -> CliResult<ExitCode> {
    let warehouse = open_warehouse(database)?;
    let status = pipeline.status(&warehouse, analysis_id)?;
    if json {
        emit_json(&status)?;
        return Ok(ExitCode::SUCCESS);
    }
    emit(&format!("analysis:   {}", status.analysis_id))?;
    emit(&format!("stale:      {}", status.is_stale))?;
    let last_run = status
        .last_run_at
        .and_then(|at| format_rfc3339(at).ok())
        .unwrap_or_else(|| "never".to_string());
    emit(&format!("last run:   {last_run}"))?;
    let last_status = status.last_run_status.map_or("-", |value| value.as_str());
    emit(&format!("status:     {last_status}"))?;
    emit(&format!("depends on: {}", join_or_dash(&status.depends_on)))?;
    emit(&format!("used by:    {}", join_or_dash(&status.depended_by)))?;
    Ok(ExitCode::SUCCESS)
}

/// Shows recent run history.
fn command_history(
    pipeline: &Pipeline<FileMetadataStore>,
    database: Option<&Path>,
    analysis_id: &str,
    limit: usize,
    json: bool,
) -> CliResult<ExitCode> {
    let warehouse = open_warehouse(database)?;
    let history = pipeline.get_run_history(&warehouse, analysis_id, limit)?;
    if json {
        emit_json(&history)?;
        return Ok(ExitCode::SUCCESS);
    }
    for entry in &history {
        let started = format_rfc3339(entry.started_at).unwrap_or_else(|_| "-".to_string());
        let duration = entry.duration_ms.map_or("-".to_string(), |ms| format!("{ms}ms"));
        let rows = entry.rows_affected.map_or("-".to_string(), |count| count.to_string());
        let error = entry.error.as_deref().unwrap_or("");
        emit(&format!(
            "{} {:<8} {} {:>8} {:>8} {}",
            entry.run_id,
            entry.status.as_str(),
            started,
            duration,
            rows,
            error
        ))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Previews analysis rows without materializing.
fn command_preview(
    pipeline: &Pipeline<FileMetadataStore>,
    database: Option<&Path>,
    analysis_id: &str,
    raw_params: &[String],
    limit: usize,
) -> CliResult<ExitCode> {
    let params = resolve_params(pipeline, analysis_id, raw_params)?;
    let warehouse = open_warehouse(database)?;
    let rows = pipeline.preview(&warehouse, analysis_id, params.as_ref(), limit)?;
    for row in &rows {
        emit_json(row)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Shows the dependency DAG.
fn command_dag(pipeline: &Pipeline<FileMetadataStore>, json: bool) -> CliResult<ExitCode> {
    let dag = pipeline.get_dag()?;
    if json {
        emit_json(&dag)?;
        return Ok(ExitCode::SUCCESS);
    }
    for (analysis_id, dependencies) in &dag {
        emit(&format!("{analysis_id} <- {}", join_or_dash(dependencies)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the DuckDB warehouse at the given path, or in memory when absent.
fn open_warehouse(database: Option<&Path>) -> CliResult<DuckDbWarehouse> {
    match database {
        Some(path) => Ok(DuckDbWarehouse::open(path)?),
        None => Ok(DuckDbWarehouse::open_in_memory()?),
    }
}

/// Parses repeated `name=value` arguments into typed parameter values.
///
/// Names declared on the analysis are coerced per their declared type;
/// undeclared names pass through as text (the engine leaves unmatched
/// placeholders intact).
fn resolve_params(
    pipeline: &Pipeline<FileMetadataStore>,
    analysis_id: &str,
    raw_params: &[String],
) -> CliResult<Option<ParamMap>> {
    if raw_params.is_empty() {
        return Ok(None);
    }
    let analysis = pipeline.get(analysis_id)?;
    let definitions = analysis.map(|found| found.parameters).unwrap_or_default();

    let mut params = ParamMap::new();
    for raw in raw_params {
        let Some((name, value)) = raw.split_once('=') else {
            return Err(CliError::new(format!(
                "malformed parameter '{raw}': expected NAME=VALUE"
            )));
        };
        let value = match definitions.iter().find(|def| def.name == name) {
            Some(definition) => definition.coerce(value)?,
            None => duckpipe_core::ParamValue::text(value),
        };
        params.insert(name.to_string(), value);
    }
    Ok(Some(params))
}

/// Joins items with commas, or a dash when empty.
fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Emits one line to stdout, mapping write failures.
fn emit(message: &str) -> CliResult<()> {
    write_stdout_line(message)
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Emits a value as pretty JSON on stdout.
fn emit_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render JSON: {err}")))?;
    emit(&text)
}

/// Writes an error line to stderr and returns a failure code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "error: {message}");
    ExitCode::FAILURE
}
