//! The `waymark` binary: resolve, validate, run, report.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use waymark::prelude::*;
use waymark_cli::cli::Cli;
use waymark_cli::stages;
use waymark_cli::tools::{ToolResolver, Toolset};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let working_dir = resolve_working_dir(&args.working_dir)
        .context("failed to resolve the working directory")?;

    let toolset = Toolset::resolve(&ToolResolver::from_env())?;

    let ctx = WorkContext::new(&working_dir, &args.subject)
        .with_flag(stages::SAMPLE_FLAG, args.sample);

    let controller = RunController::new().with_required_inputs(stages::required_inputs());
    let outcome = controller
        .execute(&ctx, |_| stages::build_pipeline(&toolset))
        .await?;

    match &outcome {
        RunOutcome::InvalidInput { missing } => {
            eprintln!("cannot start: required input artifact(s) missing:");
            for path in missing {
                eprintln!("  {}", path.display());
            }
        }
        RunOutcome::Completed(report) | RunOutcome::Aborted(report) => {
            println!("{}", report.summary());

            let report_path = ctx.sinks().dir().join("report.json");
            if let Err(err) = report.write_json(&report_path) {
                warn!(
                    path = %report_path.display(),
                    %err,
                    "could not persist the run report"
                );
            }
        }
    }

    std::process::exit(outcome.exit_code());
}
