//! Pipeline building and execution.
//!
//! Stages execute strictly in declaration order. There is no dependency
//! graph solver: prerequisites are validated against earlier declarations
//! at build time and re-checked defensively against their checkpoints at
//! run time.

use crate::context::WorkContext;
use crate::errors::PipelineValidationError;
use crate::report::{ExecutionReport, StageRecord};
use crate::stage::{Stage, StageEvaluation};
use chrono::Utc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Builder for a validated pipeline.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Adds a stage.
    ///
    /// # Errors
    ///
    /// Returns an error when the stage name duplicates an earlier one or
    /// a prerequisite does not name a previously declared stage (this also
    /// rejects self-dependencies).
    pub fn stage(mut self, stage: Stage) -> Result<Self, PipelineValidationError> {
        if self.stages.iter().any(|s| s.name() == stage.name()) {
            return Err(PipelineValidationError::new(format!(
                "duplicate stage name '{}'",
                stage.name()
            ))
            .with_stages(vec![stage.name().to_string()]));
        }

        for prerequisite in stage.prerequisites() {
            if !self.stages.iter().any(|s| s.name() == prerequisite.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "stage '{}' requires '{}', which is not declared before it",
                    stage.name(),
                    prerequisite
                ))
                .with_stages(vec![stage.name().to_string(), prerequisite.clone()]));
            }
        }

        self.stages.push(stage);
        Ok(self)
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error when the name is empty or no stages were added.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "pipeline name cannot be empty or whitespace-only",
            ));
        }
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("pipeline has no stages"));
        }

        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
        })
    }
}

/// An ordered collection of stages over one working directory.
///
/// Immutable after construction; all run state accumulates in the
/// [`ExecutionReport`].
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the stage names in declaration order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Runs the pipeline to completion or first failure.
    ///
    /// Fail-fast: on the first `Failed` evaluation every remaining stage
    /// is recorded as `Aborted` and no further action is invoked. Nothing
    /// is rolled back; artifacts written by completed stages stay in place
    /// and make those stages skip on the next run.
    pub async fn run(&self, ctx: &WorkContext) -> ExecutionReport {
        let mut report = ExecutionReport::new(&self.name, ctx.run_id());
        report.mark_running();

        info!(
            pipeline = %self.name,
            run = %ctx.run_id(),
            subject = %ctx.subject(),
            stages = self.stages.len(),
            "starting pipeline"
        );
        ctx.try_emit_event(
            "pipeline.started",
            Some(serde_json::json!({
                "pipeline": &self.name,
                "stages": self.stage_names(),
            })),
        );

        for (index, stage) in self.stages.iter().enumerate() {
            if ctx.is_cancelled() {
                let reason = ctx
                    .cancel_reason()
                    .unwrap_or_else(|| "cancellation requested".to_string());
                warn!(pipeline = %self.name, %reason, "run cancelled");

                for remaining in &self.stages[index..] {
                    report.push(StageRecord::aborted(
                        remaining.name(),
                        format!("cancelled: {reason}"),
                    ));
                }
                report.mark_aborted();
                ctx.try_emit_event(
                    "pipeline.cancelled",
                    Some(serde_json::json!({"pipeline": &self.name, "reason": reason})),
                );
                return report;
            }

            let started_at = Utc::now();
            let timer = Instant::now();
            let evaluation = stage
                .evaluate(ctx, |name| self.prerequisite_satisfied(name, ctx))
                .await;
            let duration_ms = timer.elapsed().as_secs_f64() * 1000.0;

            match evaluation {
                StageEvaluation::Skipped => {
                    report.push(StageRecord::skipped(stage.name(), "already completed"));
                }
                StageEvaluation::Ran => {
                    report.push(StageRecord::ran(stage.name(), started_at, duration_ms));
                }
                StageEvaluation::Failed(failure) => {
                    report.push(StageRecord::failed(
                        stage.name(),
                        started_at,
                        duration_ms,
                        failure,
                    ));

                    for remaining in &self.stages[index + 1..] {
                        report.push(StageRecord::aborted(
                            remaining.name(),
                            format!("upstream stage '{}' failed", stage.name()),
                        ));
                    }

                    report.mark_aborted();
                    error!(pipeline = %self.name, stage = %stage.name(), "pipeline aborted");
                    ctx.try_emit_event(
                        "pipeline.aborted",
                        Some(serde_json::json!({
                            "pipeline": &self.name,
                            "failed_stage": stage.name(),
                        })),
                    );
                    return report;
                }
            }
        }

        report.mark_completed();
        info!(pipeline = %self.name, run = %ctx.run_id(), "pipeline completed");
        ctx.try_emit_event(
            "pipeline.completed",
            Some(serde_json::json!({"pipeline": &self.name})),
        );
        report
    }

    // Defensive re-check: a prerequisite counts only if its checkpoint
    // holds right now, whether produced by this run or an earlier one.
    fn prerequisite_satisfied(&self, name: &str, ctx: &WorkContext) -> bool {
        self.stages
            .iter()
            .find(|s| s.name() == name)
            .is_some_and(|s| s.checkpoint().is_satisfied(ctx))
    }
}
