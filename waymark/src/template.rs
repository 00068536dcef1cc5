//! Templated paths under the working directory.

use crate::context::WorkContext;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A path pattern relative to the working directory, with `{subject}`
/// placeholders expanded at resolution time.
///
/// Checkpoint paths, required inputs, and command arguments that name
/// subject-specific artifacts are all expressed as templates so one stage
/// table serves every subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathTemplate {
    pattern: String,
}

impl PathTemplate {
    /// Creates a template from a pattern.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Returns the raw pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Expands `{subject}` placeholders.
    #[must_use]
    pub fn render(&self, subject: &str) -> String {
        self.pattern.replace("{subject}", subject)
    }

    /// Resolves the template to an absolute path under the context's
    /// working directory. An absolute pattern is returned as-is.
    #[must_use]
    pub fn resolve(&self, ctx: &WorkContext) -> PathBuf {
        ctx.working_dir().join(self.render(ctx.subject()))
    }
}

impl From<&str> for PathTemplate {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for PathTemplate {
    fn from(pattern: String) -> Self {
        Self::new(pattern)
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}
