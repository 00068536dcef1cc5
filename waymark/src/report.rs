//! Execution report accumulated over one pipeline run.

use crate::context::RunId;
use crate::errors::StageFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The outcome of a single stage within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The checkpoint was already satisfied; the action was not invoked.
    Skipped,
    /// The action ran to completion.
    Ran,
    /// The stage failed (missing precondition, unmet prerequisite, or
    /// action error).
    Failed,
    /// The stage was never attempted because an earlier stage failed or
    /// the run was cancelled.
    Aborted,
}

impl StageOutcome {
    /// Returns true for outcomes that leave the pipeline healthy.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Skipped | Self::Ran)
    }
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Ran => write!(f, "ran"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One record per declared stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage name.
    pub name: String,
    /// What happened to the stage.
    pub outcome: StageOutcome,
    /// Human-readable detail for the outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Structured failure payload for `Failed` records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
    /// When the stage was attempted (absent for `Skipped`/`Aborted`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// How long the attempt took (absent for `Skipped`/`Aborted`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl StageRecord {
    /// Creates a skipped record.
    #[must_use]
    pub fn skipped(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: StageOutcome::Skipped,
            detail: Some(detail.into()),
            failure: None,
            started_at: None,
            duration_ms: None,
        }
    }

    /// Creates a ran record.
    #[must_use]
    pub fn ran(name: impl Into<String>, started_at: DateTime<Utc>, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            outcome: StageOutcome::Ran,
            detail: None,
            failure: None,
            started_at: Some(started_at),
            duration_ms: Some(duration_ms),
        }
    }

    /// Creates a failed record from a structured failure.
    #[must_use]
    pub fn failed(
        name: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: f64,
        failure: StageFailure,
    ) -> Self {
        Self {
            name: name.into(),
            outcome: StageOutcome::Failed,
            detail: Some(failure.to_string()),
            failure: Some(failure),
            started_at: Some(started_at),
            duration_ms: Some(duration_ms),
        }
    }

    /// Creates an aborted record.
    #[must_use]
    pub fn aborted(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: StageOutcome::Aborted,
            detail: Some(detail.into()),
            failure: None,
            started_at: None,
            duration_ms: None,
        }
    }
}

/// The state of the pipeline as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Execution has not begun.
    NotStarted,
    /// Stages are being evaluated.
    Running,
    /// Every stage was skipped or ran successfully.
    Completed,
    /// A stage failed or the run was cancelled; remaining stages were
    /// never attempted.
    Aborted,
}

/// Structured record of what happened in one pipeline run.
///
/// Accumulates while stages execute; nothing is silently swallowed —
/// every stage of the declared order ends up with exactly one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// The pipeline name.
    pub pipeline: String,
    /// The run this report belongs to.
    pub run: RunId,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Final (or current) pipeline status.
    pub status: PipelineStatus,
    /// Per-stage records in declaration order.
    pub records: Vec<StageRecord>,
}

impl ExecutionReport {
    /// Creates a report for a run that has not begun executing yet.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, run: RunId) -> Self {
        Self {
            pipeline: pipeline.into(),
            run,
            started_at: Utc::now(),
            status: PipelineStatus::NotStarted,
            records: Vec::new(),
        }
    }

    /// Appends a stage record.
    pub fn push(&mut self, record: StageRecord) {
        self.records.push(record);
    }

    /// Marks the run as executing.
    pub fn mark_running(&mut self) {
        self.status = PipelineStatus::Running;
    }

    /// Marks the run completed.
    pub fn mark_completed(&mut self) {
        self.status = PipelineStatus::Completed;
    }

    /// Marks the run aborted.
    pub fn mark_aborted(&mut self) {
        self.status = PipelineStatus::Aborted;
    }

    /// Returns true when every stage was skipped or ran.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    /// Looks up the outcome recorded for a stage.
    #[must_use]
    pub fn outcome_of(&self, name: &str) -> Option<StageOutcome> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.outcome)
    }

    /// Renders the human-readable summary: one line per stage outcome plus
    /// a final status line.
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let width = self
            .records
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0);

        for record in &self.records {
            let _ = write!(out, "  {:width$}  {:7}", record.name, record.outcome.to_string());
            if let Some(ms) = record.duration_ms {
                let _ = write!(out, "  ({ms:.0} ms)");
            }
            if let Some(ref detail) = record.detail {
                let _ = write!(out, "  {detail}");
            }
            out.push('\n');
        }

        let status = match self.status {
            PipelineStatus::NotStarted => "not started",
            PipelineStatus::Running => "running",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Aborted => "aborted",
        };
        let _ = write!(out, "pipeline '{}' run {}: {status}", self.pipeline, self.run);

        out
    }

    /// Writes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or written.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(std::io::Error::from)
    }
}
