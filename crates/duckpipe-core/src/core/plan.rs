// crates/duckpipe-core/src/core/plan.rs
// ============================================================================
// Module: duckpipe Execution Plan Model
// Description: Planned steps with compiled SQL and expected side effects.
// Purpose: Make every execution inspectable and reviewable before it runs.
// Dependencies: serde, time, crate::core::{params, time}
// ============================================================================

//! ## Overview
//! An [`ExecutionPlan`] is the planner's output: the target Analysis plus its
//! transitive dependencies in topological order, each carrying an action,
//! a reason, and (for runnable steps) the compiled SQL with its positional
//! bindings. Plans are plain values, safe to serialize, show to a reviewer,
//! or persist before execution.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::params::ParamMap;
use crate::core::params::ScalarValue;
use crate::core::time::now_utc;
use crate::core::time::serde_rfc3339;

// ============================================================================
// SECTION: Step Action
// ============================================================================

/// Action assigned to a plan step.
///
/// # Invariants
/// - Wire labels are stable (`run`, `skip`, `fail`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Execute this step against the warehouse.
    Run,
    /// Skip this step (already fresh).
    Skip,
    /// Skip this step because a dependency cannot run.
    Fail,
}

impl StepAction {
    /// Returns the uppercase display label for plan summaries.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Run => "RUN",
            Self::Skip => "SKIP",
            Self::Fail => "FAIL",
        }
    }
}

// ============================================================================
// SECTION: Operation Kind
// ============================================================================

/// Warehouse operation performed by a runnable step.
///
/// # Invariants
/// - Wire labels are stable and match the emitted statement family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// `CREATE OR REPLACE VIEW <target> AS <query>`.
    #[serde(rename = "CREATE OR REPLACE VIEW")]
    CreateOrReplaceView,
    /// `CREATE OR REPLACE TABLE <target> AS <query>`.
    #[serde(rename = "CREATE OR REPLACE TABLE")]
    CreateOrReplaceTable,
    /// `INSERT INTO <target> <query>`.
    #[serde(rename = "INSERT INTO")]
    InsertInto,
    /// `COPY (<query>) TO '<path>' (FORMAT PARQUET)`.
    #[serde(rename = "COPY TO FILE")]
    CopyToFile,
}

impl OperationKind {
    /// Returns the stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateOrReplaceView => "CREATE OR REPLACE VIEW",
            Self::CreateOrReplaceTable => "CREATE OR REPLACE TABLE",
            Self::InsertInto => "INSERT INTO",
            Self::CopyToFile => "COPY TO FILE",
        }
    }

    /// Returns true when the operation leaves countable rows in the target.
    #[must_use]
    pub const fn counts_rows(self) -> bool {
        matches!(self, Self::CreateOrReplaceTable | Self::InsertInto)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Execution Step
// ============================================================================

/// One node of an execution plan.
///
/// # Invariants
/// - `compiled_sql`, `bound_params`, `target_table`, and `operation` are
///   present only when `action` is [`StepAction::Run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Analysis executed by this step.
    pub analysis_id: String,
    /// Planned action.
    pub action: StepAction,
    /// Human-readable reason for the action.
    pub reason: String,
    /// Compiled SQL statement (runnable steps only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiled_sql: Option<String>,
    /// Positional bindings for the compiled SQL, in `$N` order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_params: Option<Vec<ScalarValue>>,
    /// Warehouse object written by this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_table: Option<String>,
    /// Operation family performed against the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKind>,
}

impl ExecutionStep {
    /// Returns true when this step will execute against the warehouse.
    #[must_use]
    pub const fn is_runnable(&self) -> bool {
        matches!(self.action, StepAction::Run)
    }
}

// ============================================================================
// SECTION: Execution Plan
// ============================================================================

/// Complete plan for executing a target Analysis and its dependencies.
///
/// # Invariants
/// - Steps are in topological order with the target last.
/// - Each reachable Analysis appears exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Target analysis id the plan was compiled for.
    pub target_id: String,
    /// Ordered steps, dependencies before dependents.
    pub steps: Vec<ExecutionStep>,
    /// Caller-supplied parameters (applied to the target step only).
    #[serde(default)]
    pub params: ParamMap,
    /// Plan creation timestamp (UTC).
    #[serde(with = "serde_rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ExecutionPlan {
    /// Creates a plan stamped with the current time.
    #[must_use]
    pub fn new(target_id: impl Into<String>, steps: Vec<ExecutionStep>, params: ParamMap) -> Self {
        Self {
            target_id: target_id.into(),
            steps,
            params,
            created_at: now_utc(),
        }
    }

    /// Returns the steps that will execute against the warehouse.
    #[must_use]
    pub fn runnable_steps(&self) -> Vec<&ExecutionStep> {
        self.steps.iter().filter(|step| step.is_runnable()).collect()
    }

    /// Returns the tables created or modified by runnable steps.
    #[must_use]
    pub fn will_modify_tables(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| step.is_runnable())
            .filter_map(|step| step.target_table.as_deref())
            .collect()
    }

    /// Returns the total number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the number of steps that will execute.
    #[must_use]
    pub fn runnable_count(&self) -> usize {
        self.steps.iter().filter(|step| step.is_runnable()).count()
    }

    /// Renders a human-readable summary for review before execution.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = format!("Execution Plan for '{}':", self.target_id);
        for (index, step) in self.steps.iter().enumerate() {
            let action = format!("[{}]", step.action.label());
            let _ = write!(
                text,
                "\n  {}. {:<8} analysis:{} ({})",
                index + 1,
                action,
                step.analysis_id,
                step.reason
            );
        }
        if !self.will_modify_tables().is_empty() {
            text.push_str("\n\nSide Effects:");
            for step in &self.steps {
                if let (true, Some(operation), Some(target)) =
                    (step.is_runnable(), step.operation, step.target_table.as_deref())
                {
                    let _ = write!(text, "\n  - {operation} {target}");
                }
            }
        }
        text
    }
}
