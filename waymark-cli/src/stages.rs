//! The driver's concrete stage table.
//!
//! This is the pluggable part of the system: which program each stage
//! invokes and which artifact names mean "done" live here, bound to the
//! resolved working directory and subject at assembly time. The core
//! neither knows nor cares.

use crate::tools::Toolset;
use std::sync::Arc;
use waymark::prelude::*;

/// The option flag gating the long-running sampling sub-step.
pub const SAMPLE_FLAG: &str = "sample";

/// The artifacts that must exist before any stage is constructed.
#[must_use]
pub fn required_inputs() -> Vec<PathTemplate> {
    vec![
        PathTemplate::new("{subject}_raw.dat"),
        PathTemplate::new("{subject}_meta.txt"),
    ]
}

/// Assembles the four-stage subject pipeline against a resolved toolset.
///
/// The final stage carries two independent checkpoints: its setup output,
/// and (only when the sample flag is on) the sampler's merged output in
/// the suffixed directory. Re-running with the flag newly enabled
/// re-enters the stage and performs only the sampling sub-step.
///
/// # Errors
///
/// Returns an error when the stage table itself is malformed; with a
/// fixed table this indicates a programming mistake, not bad input.
pub fn build_pipeline(tools: &Toolset) -> Result<Pipeline, PipelineValidationError> {
    PipelineBuilder::new("subject-pipeline")
        .stage(
            Stage::new(
                "import",
                Arc::new(OutputFile::new("{subject}_data.dat")),
                Arc::new(
                    CommandAction::new(&tools.import, "import")
                        .arg("{subject}_raw.dat")
                        .arg("{subject}_meta.txt")
                        .arg("{subject}_data.dat"),
                ),
            )
            .with_required_input("{subject}_raw.dat")
            .with_required_input("{subject}_meta.txt"),
        )?
        .stage(
            Stage::new(
                "mask",
                Arc::new(OutputFile::new("{subject}_mask.dat")),
                Arc::new(
                    CommandAction::new(&tools.mask, "mask")
                        .arg("{subject}_data.dat")
                        .arg("{subject}_mask.dat"),
                ),
            )
            .with_prerequisite("import")
            .with_required_input("{subject}_data.dat"),
        )?
        .stage(
            Stage::new(
                "fit",
                Arc::new(OutputSet::new([
                    "fit/{subject}_coef.dat",
                    "fit/{subject}_resid.dat",
                ])),
                Arc::new(
                    CommandAction::new(&tools.fit, "fit")
                        .arg("{subject}_data.dat")
                        .arg("{subject}_mask.dat")
                        .arg("fit/{subject}_coef.dat")
                        .arg("fit/{subject}_resid.dat"),
                ),
            )
            .with_prerequisite("mask")
            .with_required_inputs(["{subject}_data.dat", "{subject}_mask.dat"]),
        )?
        .stage(
            Stage::new(
                "model",
                Arc::new(AllOf::new(vec![
                    Arc::new(OutputFile::new("model/data.dat")),
                    Arc::new(FlagGated::new(
                        SAMPLE_FLAG,
                        Arc::new(OutputFile::new("model.samples/merged.dat")),
                    )),
                ])),
                Arc::new(
                    StepSequence::new()
                        .step(
                            Step::new(
                                "setup",
                                Arc::new(
                                    CommandAction::new(&tools.model_setup, "model")
                                        .arg("{subject}_data.dat")
                                        .arg("{subject}_mask.dat")
                                        .arg("model/data.dat"),
                                ),
                            )
                            .with_checkpoint(Arc::new(OutputFile::new("model/data.dat"))),
                        )
                        .step(
                            Step::new(
                                "sample",
                                Arc::new(
                                    CommandAction::new(&tools.sample, "model-sample")
                                        .arg("model/data.dat")
                                        .arg("model.samples/merged.dat"),
                                ),
                            )
                            .gated_by(SAMPLE_FLAG)
                            .with_checkpoint(Arc::new(OutputFile::new(
                                "model.samples/merged.dat",
                            ))),
                        ),
                ),
            )
            .with_prerequisite("fit")
            .with_required_inputs(["{subject}_data.dat", "{subject}_mask.dat"]),
        )?
        .build()
}
