//! # Waymark
//!
//! A checkpoint-gated staged pipeline runner for external tools.
//!
//! Waymark drives a fixed sequence of external programs over a per-subject
//! working directory, skipping stages whose outputs already exist:
//!
//! - **Checkpoint predicates**: pure filesystem-existence checks decide
//!   whether a stage can be skipped
//! - **Staged execution**: stages run strictly in declaration order with
//!   defensive prerequisite checks
//! - **Fail-fast**: the first failure aborts every remaining stage
//! - **Idempotent re-runs**: partial failures are resumed safely because
//!   durable state lives only in the filesystem artifacts the checkpoints
//!   inspect
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use waymark::prelude::*;
//! use std::sync::Arc;
//!
//! let pipeline = PipelineBuilder::new("subject-pipeline")
//!     .stage(Stage::new(
//!         "import",
//!         Arc::new(OutputFile::new("{subject}_data.dat")),
//!         Arc::new(CommandAction::new("/usr/bin/wm-import", "import")
//!             .arg("{subject}_raw.dat")
//!             .arg("{subject}_data.dat")),
//!     ))?
//!     .build()?;
//!
//! let ctx = WorkContext::new("/data/subj01", "subj01");
//! let report = pipeline.run(&ctx).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod action;
pub mod checkpoint;
pub mod command;
pub mod context;
pub mod controller;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod report;
pub mod sinks;
pub mod stage;
pub mod template;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, FnAction, Step, StepSequence};
    pub use crate::checkpoint::{
        AllOf, Always, Checkpoint, FlagGated, Never, OutputFile, OutputSet,
    };
    pub use crate::command::CommandAction;
    pub use crate::context::{RunId, WorkContext};
    pub use crate::controller::{resolve_working_dir, RunController, RunOutcome};
    pub use crate::errors::{
        ActionError, PipelineValidationError, StageFailure, WaymarkError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{Pipeline, PipelineBuilder};
    pub use crate::report::{ExecutionReport, PipelineStatus, StageOutcome, StageRecord};
    pub use crate::sinks::{LogsDir, SinkFactory, SinkPair};
    pub use crate::stage::{Stage, StageEvaluation};
    pub use crate::template::PathTemplate;
}

#[cfg(test)]
mod tests {
    // Cross-cutting case: two independent contexts over disjoint
    // directories share no mutable state.
    use crate::prelude::*;
    use std::sync::Arc;

    fn touch_stage(name: &str, output: &str) -> Stage {
        let rel = output.to_string();
        Stage::new(
            name,
            Arc::new(OutputFile::new(output)),
            Arc::new(FnAction::new(name, move |ctx: &WorkContext| {
                std::fs::write(ctx.working_dir().join(rel.replace("{subject}", ctx.subject())), b"x")
                    .map_err(|e| ActionError::Other(e.to_string()))?;
                Ok(())
            })),
        )
    }

    #[tokio::test]
    async fn test_concurrent_pipelines_over_disjoint_directories() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        let make_pipeline = || {
            PipelineBuilder::new("subject-pipeline")
                .stage(touch_stage("import", "{subject}_data.dat"))
                .unwrap()
                .stage(
                    touch_stage("mask", "{subject}_mask.dat")
                        .with_prerequisite("import")
                        .with_required_input("{subject}_data.dat"),
                )
                .unwrap()
                .build()
                .unwrap()
        };

        let pipeline_a = make_pipeline();
        let pipeline_b = make_pipeline();
        let ctx_a = WorkContext::new(dir_a.path(), "alpha");
        let ctx_b = WorkContext::new(dir_b.path(), "beta");

        let (report_a, report_b) =
            tokio::join!(pipeline_a.run(&ctx_a), pipeline_b.run(&ctx_b));

        assert!(report_a.is_complete());
        assert!(report_b.is_complete());
        assert!(dir_a.path().join("alpha_mask.dat").exists());
        assert!(dir_b.path().join("beta_mask.dat").exists());
        assert!(!dir_a.path().join("beta_mask.dat").exists());
    }
}
