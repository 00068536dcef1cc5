//! The run controller: input validation, pipeline assembly, execution,
//! and process-style exit status derivation.

use crate::context::WorkContext;
use crate::errors::{PipelineValidationError, WaymarkError};
use crate::pipeline::Pipeline;
use crate::report::ExecutionReport;
use crate::template::PathTemplate;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Resolves a working directory argument to an absolute path.
///
/// A relative path is anchored at the caller's current directory. Pure
/// path manipulation: the directory is not required to exist yet.
///
/// # Errors
///
/// Returns an error only when the current directory cannot be determined.
pub fn resolve_working_dir(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// The result of one controller invocation, carrying the process-style
/// exit status.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every stage was skipped or ran successfully.
    Completed(ExecutionReport),
    /// A stage failed; the remaining stages were aborted.
    Aborted(ExecutionReport),
    /// Required input artifacts were absent; no stage was constructed and
    /// the report is empty.
    InvalidInput {
        /// The absolute paths that were expected but not found.
        missing: Vec<PathBuf>,
    },
}

impl RunOutcome {
    /// Derives the process exit status: 0 on completion, 1 on abort, 2 on
    /// invalid input.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(_) => 0,
            Self::Aborted(_) => 1,
            Self::InvalidInput { .. } => 2,
        }
    }

    /// Returns the execution report, if the pipeline ran at all.
    #[must_use]
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            Self::Completed(report) | Self::Aborted(report) => Some(report),
            Self::InvalidInput { .. } => None,
        }
    }
}

/// Validates pre-existing inputs, assembles the stage list, and runs the
/// pipeline.
///
/// Stage assembly is deferred to a closure so that input validation
/// genuinely precedes stage construction: when inputs are missing no
/// stage is ever built.
#[derive(Debug, Default)]
pub struct RunController {
    required_inputs: Vec<PathTemplate>,
}

impl RunController {
    /// Creates a controller with no required inputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required pre-existing input artifact.
    #[must_use]
    pub fn with_required_input(mut self, input: impl Into<PathTemplate>) -> Self {
        self.required_inputs.push(input.into());
        self
    }

    /// Adds several required pre-existing input artifacts.
    #[must_use]
    pub fn with_required_inputs(
        mut self,
        inputs: impl IntoIterator<Item = impl Into<PathTemplate>>,
    ) -> Self {
        self.required_inputs
            .extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Checks that every required input artifact exists.
    ///
    /// # Errors
    ///
    /// Returns [`WaymarkError::InvalidInput`] listing every missing path.
    pub fn validate_inputs(&self, ctx: &WorkContext) -> Result<(), WaymarkError> {
        let missing: Vec<PathBuf> = self
            .required_inputs
            .iter()
            .map(|t| t.resolve(ctx))
            .filter(|p| !p.exists())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(WaymarkError::InvalidInput { missing })
        }
    }

    /// Runs one full controller invocation.
    ///
    /// # Errors
    ///
    /// Returns an error only when `assemble` produces an invalid pipeline;
    /// missing inputs and stage failures are reported through
    /// [`RunOutcome`], not as errors.
    pub async fn execute<F>(&self, ctx: &WorkContext, assemble: F) -> Result<RunOutcome, WaymarkError>
    where
        F: FnOnce(&WorkContext) -> Result<Pipeline, PipelineValidationError>,
    {
        if let Err(WaymarkError::InvalidInput { missing }) = self.validate_inputs(ctx) {
            for path in &missing {
                error!(path = %path.display(), "required input artifact missing");
            }
            ctx.try_emit_event(
                "run.invalid_input",
                Some(serde_json::json!({
                    "missing": missing
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>(),
                })),
            );
            return Ok(RunOutcome::InvalidInput { missing });
        }

        let pipeline = assemble(ctx)?;
        info!(
            pipeline = %pipeline.name(),
            working_dir = %ctx.working_dir().display(),
            "inputs validated, executing pipeline"
        );

        let report = pipeline.run(ctx).await;
        if report.is_complete() {
            Ok(RunOutcome::Completed(report))
        } else {
            Ok(RunOutcome::Aborted(report))
        }
    }
}
