//! External command invocation with captured output.
//!
//! This is the action boundary: run program P with argument list A,
//! capture stdout to sink S1 and stderr to sink S2, report the exit
//! status. The core neither knows nor cares what P does.

use crate::action::Action;
use crate::context::WorkContext;
use crate::errors::ActionError;
use crate::template::PathTemplate;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs an external program inside the working directory.
///
/// Arguments are templates rendered against the context, so relative
/// artifact paths and `{subject}` placeholders resolve per run. The
/// process inherits nothing: stdin is null and both output streams go to
/// the phase's log sinks.
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: PathBuf,
    args: Vec<PathTemplate>,
    phase: String,
}

impl CommandAction {
    /// Creates a command action for a resolved program and log phase.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, phase: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            phase: phase.into(),
        }
    }

    /// Appends one argument template.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<PathTemplate>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several argument templates.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<PathTemplate>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the program path.
    #[must_use]
    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl Action for CommandAction {
    async fn run(&self, ctx: &WorkContext) -> Result<(), ActionError> {
        let sinks = ctx.sinks().open(&self.phase).map_err(|e| ActionError::Sink {
            phase: self.phase.clone(),
            source: e,
        })?;

        let program = self.program.display().to_string();
        let rendered: Vec<String> = self.args.iter().map(|a| a.render(ctx.subject())).collect();

        debug!(
            program = %program,
            args = ?rendered,
            phase = %self.phase,
            "launching external command"
        );

        let status = Command::new(&self.program)
            .args(&rendered)
            .current_dir(ctx.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::from(sinks.out))
            .stderr(Stdio::from(sinks.err))
            .status()
            .await
            .map_err(|e| ActionError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ActionError::CommandFailed {
                program,
                exit_status: status.code(),
                stdout_log: sinks.out_path,
                stderr_log: sinks.err_path,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_in(dir: &std::path::Path) -> WorkContext {
        WorkContext::new(dir, "subj01")
    }

    #[tokio::test]
    async fn test_command_success_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let action = CommandAction::new("/bin/sh", "import")
            .arg("-c")
            .arg("echo processing {subject}");

        action.run(&ctx).await.unwrap();

        let captured =
            std::fs::read_to_string(dir.path().join("LOGS/import.out.log")).unwrap();
        assert_eq!(captured, "processing subj01\n");
    }

    #[tokio::test]
    async fn test_command_failure_keeps_exit_status_and_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let action = CommandAction::new("/bin/sh", "fit")
            .arg("-c")
            .arg("echo broken >&2; exit 3");

        let err = action.run(&ctx).await.unwrap_err();
        assert_eq!(err.exit_status(), Some(3));

        let (out, stderr) = err.log_paths();
        assert!(out.unwrap().ends_with("fit.out.log"));
        let captured = std::fs::read_to_string(stderr.unwrap()).unwrap();
        assert_eq!(captured, "broken\n");
    }

    #[tokio::test]
    async fn test_command_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let action = CommandAction::new("/bin/sh", "touch")
            .arg("-c")
            .arg("touch {subject}_data.dat");

        action.run(&ctx).await.unwrap();
        assert!(dir.path().join("subj01_data.dat").exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let action = CommandAction::new("/nonexistent/wm-import", "import");
        let err = action.run(&ctx).await.unwrap_err();

        assert!(matches!(err, ActionError::Spawn { .. }));
        assert!(err.exit_status().is_none());
    }
}
