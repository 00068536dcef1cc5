//! Stages: named units of work gated by checkpoints.

use crate::action::Action;
use crate::checkpoint::Checkpoint;
use crate::context::WorkContext;
use crate::errors::StageFailure;
use crate::template::PathTemplate;
use std::sync::Arc;
use tracing::{error, info};

/// The result of evaluating one stage against a working directory.
#[derive(Debug)]
pub enum StageEvaluation {
    /// The checkpoint was already satisfied; nothing was done.
    Skipped,
    /// The action ran to completion.
    Ran,
    /// The stage failed; the pipeline must abort.
    Failed(StageFailure),
}

/// A named unit of work: a checkpoint, an action, prerequisite stages,
/// and required input artifacts.
///
/// The action is only ever invoked when the checkpoint is unsatisfied,
/// every required input exists, and every prerequisite's checkpoint is
/// satisfied. This, together with actions that leave their checkpoint
/// satisfied on success, is the idempotency contract that makes re-runs
/// after partial failures safe.
#[derive(Debug)]
pub struct Stage {
    name: String,
    checkpoint: Arc<dyn Checkpoint>,
    prerequisites: Vec<String>,
    required_inputs: Vec<PathTemplate>,
    action: Arc<dyn Action>,
}

impl Stage {
    /// Creates a stage around a checkpoint and an action.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        checkpoint: Arc<dyn Checkpoint>,
        action: Arc<dyn Action>,
    ) -> Self {
        Self {
            name: name.into(),
            checkpoint,
            prerequisites: Vec::new(),
            required_inputs: Vec::new(),
            action,
        }
    }

    /// Adds a prerequisite stage name.
    #[must_use]
    pub fn with_prerequisite(mut self, name: impl Into<String>) -> Self {
        self.prerequisites.push(name.into());
        self
    }

    /// Adds several prerequisite stage names.
    #[must_use]
    pub fn with_prerequisites(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.prerequisites.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds a required input artifact.
    ///
    /// Distinct from prerequisites: required inputs may be produced
    /// outside the pipeline entirely.
    #[must_use]
    pub fn with_required_input(mut self, input: impl Into<PathTemplate>) -> Self {
        self.required_inputs.push(input.into());
        self
    }

    /// Adds several required input artifacts.
    #[must_use]
    pub fn with_required_inputs(
        mut self,
        inputs: impl IntoIterator<Item = impl Into<PathTemplate>>,
    ) -> Self {
        self.required_inputs
            .extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the prerequisite stage names.
    #[must_use]
    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    /// Returns the stage's checkpoint.
    #[must_use]
    pub fn checkpoint(&self) -> &Arc<dyn Checkpoint> {
        &self.checkpoint
    }

    /// Evaluates the stage: skip, run, or fail.
    ///
    /// `prerequisite_satisfied` answers whether a prerequisite stage's
    /// checkpoint currently holds; the pipeline supplies a lookup over its
    /// own stage table. Step 4 (the action) is the only part allowed to
    /// mutate the working directory.
    pub async fn evaluate<F>(&self, ctx: &WorkContext, prerequisite_satisfied: F) -> StageEvaluation
    where
        F: Fn(&str) -> bool,
    {
        if self.checkpoint.is_satisfied(ctx) {
            info!(stage = %self.name, "already completed, skipping");
            ctx.try_emit_event(
                "stage.skipped",
                Some(serde_json::json!({
                    "stage": &self.name,
                    "checkpoint": self.checkpoint.describe(ctx),
                })),
            );
            return StageEvaluation::Skipped;
        }

        for input in &self.required_inputs {
            let path = input.resolve(ctx);
            if !path.exists() {
                let failure = StageFailure::MissingPrecondition { path };
                error!(stage = %self.name, %failure, "stage failed");
                self.emit_failed(ctx, &failure);
                return StageEvaluation::Failed(failure);
            }
        }

        for prerequisite in &self.prerequisites {
            if !prerequisite_satisfied(prerequisite) {
                let failure = StageFailure::PrerequisiteUnmet {
                    prerequisite: prerequisite.clone(),
                };
                error!(stage = %self.name, %failure, "stage failed");
                self.emit_failed(ctx, &failure);
                return StageEvaluation::Failed(failure);
            }
        }

        info!(stage = %self.name, "running");
        ctx.try_emit_event(
            "stage.started",
            Some(serde_json::json!({"stage": &self.name})),
        );

        match self.action.run(ctx).await {
            Ok(()) => {
                info!(stage = %self.name, "completed");
                ctx.try_emit_event(
                    "stage.completed",
                    Some(serde_json::json!({"stage": &self.name})),
                );
                StageEvaluation::Ran
            }
            Err(err) => {
                let failure = StageFailure::from_action_error(&err);
                error!(stage = %self.name, %failure, "stage failed");
                self.emit_failed(ctx, &failure);
                StageEvaluation::Failed(failure)
            }
        }
    }

    fn emit_failed(&self, ctx: &WorkContext, failure: &StageFailure) {
        ctx.try_emit_event(
            "stage.failed",
            Some(serde_json::json!({
                "stage": &self.name,
                "failure": failure,
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::FnAction;
    use crate::checkpoint::{Never, OutputFile};
    use crate::errors::ActionError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_action(counter: Arc<AtomicUsize>) -> Arc<dyn Action> {
        Arc::new(FnAction::new("count", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    #[tokio::test]
    async fn test_satisfied_checkpoint_skips_action() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorkContext::new(dir.path(), "subj01");
        std::fs::write(dir.path().join("subj01_data.dat"), b"x").unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let stage = Stage::new(
            "import",
            Arc::new(OutputFile::new("{subject}_data.dat")),
            counting_action(counter.clone()),
        );

        let eval = stage.evaluate(&ctx, |_| true).await;
        assert!(matches!(eval, StageEvaluation::Skipped));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_required_input_never_invokes_action() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorkContext::new(dir.path(), "subj01");

        let counter = Arc::new(AtomicUsize::new(0));
        let stage = Stage::new("mask", Arc::new(Never), counting_action(counter.clone()))
            .with_required_input("{subject}_data.dat");

        let eval = stage.evaluate(&ctx, |_| true).await;
        match eval {
            StageEvaluation::Failed(StageFailure::MissingPrecondition { path }) => {
                assert!(path.ends_with("subj01_data.dat"));
            }
            other => panic!("expected MissingPrecondition, got {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unmet_prerequisite_never_invokes_action() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorkContext::new(dir.path(), "subj01");

        let counter = Arc::new(AtomicUsize::new(0));
        let stage = Stage::new("fit", Arc::new(Never), counting_action(counter.clone()))
            .with_prerequisite("mask");

        let eval = stage.evaluate(&ctx, |_| false).await;
        match eval {
            StageEvaluation::Failed(StageFailure::PrerequisiteUnmet { prerequisite }) => {
                assert_eq!(prerequisite, "mask");
            }
            other => panic!("expected PrerequisiteUnmet, got {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_action_runs_and_reports_ran() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorkContext::new(dir.path(), "subj01");

        let counter = Arc::new(AtomicUsize::new(0));
        let stage = Stage::new("import", Arc::new(Never), counting_action(counter.clone()));

        let eval = stage.evaluate(&ctx, |_| true).await;
        assert!(matches!(eval, StageEvaluation::Ran));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_action_error_becomes_action_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorkContext::new(dir.path(), "subj01");

        let stage = Stage::new(
            "fit",
            Arc::new(Never),
            Arc::new(FnAction::new("boom", |_| {
                Err(ActionError::Other("tensor fit diverged".to_string()))
            })),
        );

        let eval = stage.evaluate(&ctx, |_| true).await;
        match eval {
            StageEvaluation::Failed(StageFailure::ActionFailure { detail, .. }) => {
                assert!(detail.contains("tensor fit diverged"));
            }
            other => panic!("expected ActionFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inputs_checked_before_prerequisites() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorkContext::new(dir.path(), "subj01");

        let stage = Stage::new(
            "model",
            Arc::new(Never),
            Arc::new(FnAction::new("noop", |_| Ok(()))),
        )
        .with_required_input("{subject}_data.dat")
        .with_prerequisite("fit");

        // Both gates would fail; the missing input is reported first.
        let eval = stage.evaluate(&ctx, |_| false).await;
        assert!(matches!(
            eval,
            StageEvaluation::Failed(StageFailure::MissingPrecondition { .. })
        ));
    }
}
