//! External tool resolution.
//!
//! Providing the action programs is a driver concern: the core only ever
//! sees resolved paths. Resolution goes through a directory override
//! (for pinned toolchains and tests) before falling back to `PATH`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming a directory searched before `PATH`.
pub const TOOLS_ENV: &str = "WAYMARK_TOOLS";

/// Resolves tool names to executable paths.
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    override_dir: Option<PathBuf>,
}

impl ToolResolver {
    /// Creates a resolver honoring the `WAYMARK_TOOLS` override.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            override_dir: std::env::var_os(TOOLS_ENV).map(PathBuf::from),
        }
    }

    /// Creates a resolver pinned to a directory.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    /// Resolves a tool name to an executable path.
    ///
    /// # Errors
    ///
    /// Returns an error when the tool is neither in the override
    /// directory nor on `PATH`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if let Some(ref dir) = self.override_dir {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        which::which(name).with_context(|| format!("tool '{name}' not found on PATH"))
    }
}

/// The resolved programs backing the driver's stage table.
#[derive(Debug, Clone)]
pub struct Toolset {
    /// Converts raw subject data into the working format.
    pub import: PathBuf,
    /// Produces the subject mask.
    pub mask: PathBuf,
    /// Fits the model coefficients.
    pub fit: PathBuf,
    /// Prepares the model directory.
    pub model_setup: PathBuf,
    /// The long-running sampler behind the yes/no flag.
    pub sample: PathBuf,
}

impl Toolset {
    /// Resolves every tool the stage table needs, failing up front so a
    /// missing tool is reported before any stage runs.
    ///
    /// # Errors
    ///
    /// Returns the first resolution failure.
    pub fn resolve(resolver: &ToolResolver) -> Result<Self> {
        Ok(Self {
            import: resolver.resolve("wm-import")?,
            mask: resolver.resolve("wm-mask")?,
            fit: resolver.resolve("wm-fit")?,
            model_setup: resolver.resolve("wm-model-setup")?,
            sample: resolver.resolve("wm-sample")?,
        })
    }
}

/// Writes an executable stub tool. Test support for the driver suites.
///
/// # Errors
///
/// Returns an error when the script cannot be written or made executable.
pub fn write_stub_tool(dir: &Path, name: &str, body: &str) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}
