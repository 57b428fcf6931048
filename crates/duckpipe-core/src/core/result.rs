// crates/duckpipe-core/src/core/result.rs
// ============================================================================
// Module: duckpipe Execution Result Model
// Description: Per-step and per-plan execution outcomes plus status queries.
// Purpose: Record timing, status, and errors for every executed step.
// Dependencies: serde, time, crate::core::{plan, time}
// ============================================================================

//! ## Overview
//! A [`StepResult`] captures one run attempt of one Analysis; an
//! [`ExecutionResult`] wraps a plan with all of its step results and an
//! overall success flag. [`AnalysisStatus`] answers the status query:
//! freshness, last-run metadata, and dependency edges in both directions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::plan::ExecutionPlan;
use crate::core::time::serde_rfc3339;
use crate::core::time::serde_rfc3339_option;

// ============================================================================
// SECTION: Step Status
// ============================================================================

/// Terminal (or recorded) status of a step run.
///
/// # Invariants
/// - Wire labels are stable (`success`, `failed`, `skipped`, `running`).
/// - The executor only produces `success`, `failed`, and `skipped`;
///   `running` appears when reading history rows of in-flight or
///   interrupted runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step executed and committed its side effects.
    Success,
    /// The step raised a warehouse error.
    Failed,
    /// The step was not executed.
    Skipped,
    /// The step is (or was, at interruption) executing.
    Running,
}

impl StepStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Running => "running",
        }
    }

    /// Parses a persisted status label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "running" => Some(Self::Running),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Step Result
// ============================================================================

/// Result of one run attempt of one Analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Unique identifier of this run attempt.
    pub run_id: String,
    /// Analysis this attempt belongs to.
    pub analysis_id: String,
    /// Attempt status.
    pub status: StepStatus,
    /// When the attempt started (UTC).
    #[serde(with = "serde_rfc3339")]
    pub started_at: OffsetDateTime,
    /// When the attempt finished (UTC), absent for skipped steps.
    #[serde(default, with = "serde_rfc3339_option", skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<OffsetDateTime>,
    /// Rows present in the target after table or append operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<i64>,
    /// Error message for failed or dependency-skipped steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl StepResult {
    /// Returns true when the attempt succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, StepStatus::Success)
    }

    /// Returns true when the attempt failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, StepStatus::Failed)
    }

    /// Returns true when the step was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.status, StepStatus::Skipped)
    }
}

// ============================================================================
// SECTION: Execution Result
// ============================================================================

/// Complete result of executing an execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The plan that was executed.
    pub plan: ExecutionPlan,
    /// True iff no step failed.
    pub success: bool,
    /// Step results in execution order.
    pub step_results: Vec<StepResult>,
}

impl ExecutionResult {
    /// Returns the first failed step, if any.
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.step_results.iter().find(|result| result.is_failed())
    }

    /// Returns the summed step durations in milliseconds.
    #[must_use]
    pub fn total_duration_ms(&self) -> i64 {
        self.step_results
            .iter()
            .filter_map(|result| result.duration_ms)
            .fold(0_i64, i64::saturating_add)
    }

    /// Returns the number of successful steps.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.step_results.iter().filter(|result| result.is_success()).count()
    }

    /// Returns the number of failed steps.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.step_results.iter().filter(|result| result.is_failed()).count()
    }

    /// Returns the number of skipped steps.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.step_results.iter().filter(|result| result.is_skipped()).count()
    }

    /// Renders a human-readable summary of the execution.
    #[must_use]
    pub fn summary(&self) -> String {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        let mut lines = vec![
            format!("Execution Result: {status}"),
            format!("  Target: {}", self.plan.target_id),
            format!("  Steps: {} total", self.step_results.len()),
            format!("    - Success: {}", self.success_count()),
            format!("    - Failed: {}", self.failed_count()),
            format!("    - Skipped: {}", self.skipped_count()),
            format!("  Duration: {}ms", self.total_duration_ms()),
        ];
        if let Some(failed) = self.failed_step() {
            lines.push(format!("  Error: {}", failed.error.as_deref().unwrap_or("unknown")));
        }
        lines.join("\n")
    }
}

// ============================================================================
// SECTION: Analysis Status
// ============================================================================

/// Current status of an Analysis: freshness plus dependency edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatus {
    /// Analysis the status describes.
    pub analysis_id: String,
    /// True when the Analysis must re-run to be current.
    pub is_stale: bool,
    /// When the Analysis last ran (UTC), if ever.
    #[serde(default, with = "serde_rfc3339_option", skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<OffsetDateTime>,
    /// Status of the last run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<StepStatus>,
    /// Declared dependencies in canonical string form.
    pub depends_on: Vec<String>,
    /// Ids of analyses that declare a dependency on this one.
    pub depended_by: Vec<String>,
}
