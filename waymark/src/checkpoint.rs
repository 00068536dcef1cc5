//! Checkpoint predicates gating stage execution.
//!
//! A checkpoint answers one question: does this stage's output already
//! exist? Predicates are pure, cheap (filesystem existence checks only)
//! and re-evaluated fresh on every run, so external changes to the
//! working directory between runs are honored.

use crate::context::WorkContext;
use crate::template::PathTemplate;
use std::fmt::Debug;
use std::sync::Arc;

/// A side-effect-free predicate over the working directory.
pub trait Checkpoint: Send + Sync + Debug {
    /// Returns true when the guarded output already exists.
    fn is_satisfied(&self, ctx: &WorkContext) -> bool;

    /// Human-readable description of the satisfied condition.
    fn describe(&self, ctx: &WorkContext) -> String;
}

/// Satisfied when a single templated path exists.
#[derive(Debug, Clone)]
pub struct OutputFile {
    path: PathTemplate,
}

impl OutputFile {
    /// Creates a checkpoint over one output path.
    #[must_use]
    pub fn new(path: impl Into<PathTemplate>) -> Self {
        Self { path: path.into() }
    }
}

impl Checkpoint for OutputFile {
    fn is_satisfied(&self, ctx: &WorkContext) -> bool {
        self.path.resolve(ctx).exists()
    }

    fn describe(&self, ctx: &WorkContext) -> String {
        format!("{} exists", self.path.resolve(ctx).display())
    }
}

/// Satisfied when every path in a templated set exists.
///
/// Models an output directory that must contain several required files.
#[derive(Debug, Clone)]
pub struct OutputSet {
    paths: Vec<PathTemplate>,
}

impl OutputSet {
    /// Creates a checkpoint over a set of output paths.
    #[must_use]
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathTemplate>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Checkpoint for OutputSet {
    fn is_satisfied(&self, ctx: &WorkContext) -> bool {
        self.paths.iter().all(|p| p.resolve(ctx).exists())
    }

    fn describe(&self, ctx: &WorkContext) -> String {
        let rendered: Vec<String> = self
            .paths
            .iter()
            .map(|p| p.resolve(ctx).display().to_string())
            .collect();
        format!("all of [{}] exist", rendered.join(", "))
    }
}

/// Defers to an inner checkpoint only while a flag is on.
///
/// With the flag off the checkpoint is trivially satisfied, so the
/// guarded work is never demanded. This models an optional sub-step whose
/// output only matters when the caller asked for it.
#[derive(Debug, Clone)]
pub struct FlagGated {
    flag: String,
    inner: Arc<dyn Checkpoint>,
}

impl FlagGated {
    /// Creates a flag-gated checkpoint.
    #[must_use]
    pub fn new(flag: impl Into<String>, inner: Arc<dyn Checkpoint>) -> Self {
        Self {
            flag: flag.into(),
            inner,
        }
    }
}

impl Checkpoint for FlagGated {
    fn is_satisfied(&self, ctx: &WorkContext) -> bool {
        !ctx.flag(&self.flag) || self.inner.is_satisfied(ctx)
    }

    fn describe(&self, ctx: &WorkContext) -> String {
        format!("when flag '{}': {}", self.flag, self.inner.describe(ctx))
    }
}

/// Conjunction of checkpoints.
#[derive(Debug, Clone)]
pub struct AllOf {
    parts: Vec<Arc<dyn Checkpoint>>,
}

impl AllOf {
    /// Creates a conjunction over the given checkpoints.
    #[must_use]
    pub fn new(parts: Vec<Arc<dyn Checkpoint>>) -> Self {
        Self { parts }
    }
}

impl Checkpoint for AllOf {
    fn is_satisfied(&self, ctx: &WorkContext) -> bool {
        self.parts.iter().all(|c| c.is_satisfied(ctx))
    }

    fn describe(&self, ctx: &WorkContext) -> String {
        let parts: Vec<String> = self.parts.iter().map(|c| c.describe(ctx)).collect();
        parts.join(" and ")
    }
}

/// Always satisfied. A test and benchmark aid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl Checkpoint for Always {
    fn is_satisfied(&self, _ctx: &WorkContext) -> bool {
        true
    }

    fn describe(&self, _ctx: &WorkContext) -> String {
        "always satisfied".to_string()
    }
}

/// Never satisfied. A test aid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl Checkpoint for Never {
    fn is_satisfied(&self, _ctx: &WorkContext) -> bool {
        false
    }

    fn describe(&self, _ctx: &WorkContext) -> String {
        "never satisfied".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_in(dir: &std::path::Path) -> WorkContext {
        WorkContext::new(dir, "subj01")
    }

    #[test]
    fn test_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let checkpoint = OutputFile::new("{subject}_data.dat");

        assert!(!checkpoint.is_satisfied(&ctx));

        std::fs::write(dir.path().join("subj01_data.dat"), b"x").unwrap();
        assert!(checkpoint.is_satisfied(&ctx));
    }

    #[test]
    fn test_output_file_accepts_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let checkpoint = OutputFile::new("model");

        std::fs::create_dir(dir.path().join("model")).unwrap();
        assert!(checkpoint.is_satisfied(&ctx));
    }

    #[test]
    fn test_output_set_requires_all() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let checkpoint = OutputSet::new(["fit/{subject}_coef.dat", "fit/{subject}_resid.dat"]);

        assert!(!checkpoint.is_satisfied(&ctx));

        std::fs::create_dir(dir.path().join("fit")).unwrap();
        std::fs::write(dir.path().join("fit/subj01_coef.dat"), b"x").unwrap();
        assert!(!checkpoint.is_satisfied(&ctx));

        std::fs::write(dir.path().join("fit/subj01_resid.dat"), b"x").unwrap();
        assert!(checkpoint.is_satisfied(&ctx));
    }

    #[test]
    fn test_flag_gated_off_is_satisfied() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let checkpoint = FlagGated::new("sample", Arc::new(Never));

        // Flag unset: the guarded output is not demanded.
        assert!(checkpoint.is_satisfied(&ctx));
    }

    #[test]
    fn test_flag_gated_on_defers_to_inner() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = WorkContext::new(dir.path(), "subj01").with_flag("sample", true);
        let inner = Arc::new(OutputFile::new("model.samples/merged.dat"));
        let checkpoint = FlagGated::new("sample", inner);

        assert!(!checkpoint.is_satisfied(&ctx));

        std::fs::create_dir(dir.path().join("model.samples")).unwrap();
        std::fs::write(dir.path().join("model.samples/merged.dat"), b"x").unwrap();
        assert!(checkpoint.is_satisfied(&ctx));
    }

    #[test]
    fn test_all_of() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let checkpoint = AllOf::new(vec![Arc::new(Always), Arc::new(Never)]);
        assert!(!checkpoint.is_satisfied(&ctx));

        let checkpoint = AllOf::new(vec![Arc::new(Always), Arc::new(Always)]);
        assert!(checkpoint.is_satisfied(&ctx));
    }

    #[test]
    fn test_reevaluated_fresh_after_external_change() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let checkpoint = OutputFile::new("{subject}_mask.dat");

        let path = dir.path().join("subj01_mask.dat");
        std::fs::write(&path, b"x").unwrap();
        assert!(checkpoint.is_satisfied(&ctx));

        // Removing the artifact externally flips the verdict; nothing is cached.
        std::fs::remove_file(&path).unwrap();
        assert!(!checkpoint.is_satisfied(&ctx));
    }

    #[test]
    fn test_describe_mentions_resolved_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let checkpoint = OutputFile::new("{subject}_data.dat");

        assert!(checkpoint.describe(&ctx).contains("subj01_data.dat"));
    }
}
