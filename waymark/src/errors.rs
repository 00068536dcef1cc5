//! Error types for the waymark core.
//!
//! The taxonomy mirrors the failure model of the pipeline: construction
//! problems are `PipelineValidationError`, per-stage failures are
//! `StageFailure`, and action-internal problems are `ActionError`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The top-level error type for waymark operations.
#[derive(Debug, Error)]
pub enum WaymarkError {
    /// Pipeline construction was invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A required pre-existing artifact was absent before the pipeline
    /// started. The pipeline never runs in this case.
    #[error("invalid input: {} required artifact(s) missing", .missing.len())]
    InvalidInput {
        /// The absolute paths that were expected but not found.
        missing: Vec<PathBuf>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when pipeline construction fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// A non-recoverable failure recorded against a single stage.
///
/// All kinds are fatal to the stage and abort the pipeline; none is
/// retried automatically.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageFailure {
    /// A required input did not exist when the stage's turn came.
    #[error("missing precondition: {} does not exist", .path.display())]
    MissingPrecondition {
        /// The absolute path that was expected.
        path: PathBuf,
    },

    /// A prerequisite stage's checkpoint was not satisfied.
    #[error("prerequisite not met: '{prerequisite}'")]
    PrerequisiteUnmet {
        /// The name of the unmet prerequisite stage.
        prerequisite: String,
    },

    /// The stage's action terminated abnormally.
    #[error("action error: {detail}")]
    ActionFailure {
        /// Human-readable description of the failure.
        detail: String,
        /// Exit status of the external program, when one was observed.
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_status: Option<i32>,
        /// Captured stdout location, when sinks were opened.
        #[serde(skip_serializing_if = "Option::is_none")]
        stdout_log: Option<PathBuf>,
        /// Captured stderr location, when sinks were opened.
        #[serde(skip_serializing_if = "Option::is_none")]
        stderr_log: Option<PathBuf>,
    },
}

impl StageFailure {
    /// Builds an action failure from the underlying action error,
    /// preserving the exit status and sink locations for diagnosis.
    #[must_use]
    pub fn from_action_error(err: &ActionError) -> Self {
        let (stdout_log, stderr_log) = err.log_paths();
        Self::ActionFailure {
            detail: err.to_string(),
            exit_status: err.exit_status(),
            stdout_log: stdout_log.map(Path::to_path_buf),
            stderr_log: stderr_log.map(Path::to_path_buf),
        }
    }
}

/// Errors produced while running a stage action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The external program could not be launched at all.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// The program that failed to launch.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The external program exited abnormally.
    #[error("'{program}' exited with status {}", .exit_status.map_or_else(|| "unknown (terminated by signal)".to_string(), |c| c.to_string()))]
    CommandFailed {
        /// The program that failed.
        program: String,
        /// The exit status, if the process exited normally.
        exit_status: Option<i32>,
        /// Where the program's stdout was captured.
        stdout_log: PathBuf,
        /// Where the program's stderr was captured.
        stderr_log: PathBuf,
    },

    /// Log sinks could not be opened for the action's phase.
    #[error("failed to open log sinks for phase '{phase}': {source}")]
    Sink {
        /// The logical phase whose sinks failed to open.
        phase: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A sub-step inside a composite action failed.
    #[error("sub-step '{label}': {source}")]
    Step {
        /// The label of the failed sub-step.
        label: String,
        /// The failure of the inner action.
        #[source]
        source: Box<ActionError>,
    },

    /// Any other action failure.
    #[error("{0}")]
    Other(String),
}

impl ActionError {
    /// Returns the exit status of the failed command, looking through
    /// sub-step wrapping.
    #[must_use]
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_status, .. } => *exit_status,
            Self::Step { source, .. } => source.exit_status(),
            _ => None,
        }
    }

    /// Returns the captured stdout/stderr locations of the failed command,
    /// looking through sub-step wrapping.
    #[must_use]
    pub fn log_paths(&self) -> (Option<&Path>, Option<&Path>) {
        match self {
            Self::CommandFailed {
                stdout_log,
                stderr_log,
                ..
            } => (Some(stdout_log.as_path()), Some(stderr_log.as_path())),
            Self::Step { source, .. } => source.log_paths(),
            _ => (None, None),
        }
    }
}
