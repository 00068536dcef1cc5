//! Stage actions: the opaque operations gated by checkpoints.
//!
//! The pipeline knows nothing about what an action does; it only needs
//! success or failure. The common case is an external command (see
//! [`crate::command::CommandAction`]); composite actions with
//! independently-checkpointed sub-steps are built from [`StepSequence`].

use crate::checkpoint::Checkpoint;
use crate::context::WorkContext;
use crate::errors::ActionError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

/// An opaque unit of work executed when a stage's checkpoint is
/// unsatisfied.
///
/// On success the action must leave the stage's checkpoint satisfied;
/// that contract is what makes re-runs safe.
#[async_trait]
pub trait Action: Send + Sync + Debug {
    /// Runs the action to completion. Treated as a blocking call with no
    /// timeout; long-running external work is awaited as-is.
    async fn run(&self, ctx: &WorkContext) -> Result<(), ActionError>;
}

/// A closure-backed action for tests and embedders.
pub struct FnAction<F>
where
    F: Fn(&WorkContext) -> Result<(), ActionError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnAction<F>
where
    F: Fn(&WorkContext) -> Result<(), ActionError> + Send + Sync,
{
    /// Creates a new closure-backed action.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnAction<F>
where
    F: Fn(&WorkContext) -> Result<(), ActionError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&WorkContext) -> Result<(), ActionError> + Send + Sync,
{
    async fn run(&self, ctx: &WorkContext) -> Result<(), ActionError> {
        (self.func)(ctx)
    }
}

/// One sub-step of a [`StepSequence`].
///
/// A step may carry its own checkpoint (skipped when already satisfied,
/// even though the parent stage as a whole runs) and may be gated by an
/// option flag (skipped when the flag is off).
#[derive(Debug)]
pub struct Step {
    label: String,
    gate: Option<String>,
    checkpoint: Option<Arc<dyn Checkpoint>>,
    action: Arc<dyn Action>,
}

impl Step {
    /// Creates a sub-step around an action.
    #[must_use]
    pub fn new(label: impl Into<String>, action: Arc<dyn Action>) -> Self {
        Self {
            label: label.into(),
            gate: None,
            checkpoint: None,
            action,
        }
    }

    /// Gates the step behind a boolean option flag.
    #[must_use]
    pub fn gated_by(mut self, flag: impl Into<String>) -> Self {
        self.gate = Some(flag.into());
        self
    }

    /// Attaches the step's own checkpoint.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn Checkpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Returns the step label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Ordered sub-steps executed in declaration order.
///
/// Idempotent at sub-step granularity: each step with a satisfied
/// checkpoint is skipped on re-entry, so a parent stage can be re-run to
/// pick up only the work that is still missing.
#[derive(Debug, Default)]
pub struct StepSequence {
    steps: Vec<Step>,
}

impl StepSequence {
    /// Creates an empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sub-step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

#[async_trait]
impl Action for StepSequence {
    async fn run(&self, ctx: &WorkContext) -> Result<(), ActionError> {
        for step in &self.steps {
            if let Some(ref flag) = step.gate {
                if !ctx.flag(flag) {
                    debug!(step = %step.label, flag = %flag, "sub-step gated off, skipping");
                    continue;
                }
            }

            if let Some(ref checkpoint) = step.checkpoint {
                if checkpoint.is_satisfied(ctx) {
                    info!(step = %step.label, "sub-step already completed, skipping");
                    continue;
                }
            }

            debug!(step = %step.label, "running sub-step");
            step.action.run(ctx).await.map_err(|e| ActionError::Step {
                label: step.label.clone(),
                source: Box::new(e),
            })?;
        }

        Ok(())
    }
}
