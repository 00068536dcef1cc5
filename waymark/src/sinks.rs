//! Log sinks for captured action output.
//!
//! Every action phase gets two append-or-create text streams, one for
//! stdout and one for stderr. Sink creation and placement is an injected
//! capability so embedders can relocate or replace the log layout.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Subdirectory of the working directory used by the default factory.
pub const LOGS_DIR_NAME: &str = "LOGS";

/// An opened stdout/stderr sink pair for one logical phase.
#[derive(Debug)]
pub struct SinkPair {
    /// Open handle receiving the phase's standard output.
    pub out: File,
    /// Open handle receiving the phase's standard error.
    pub err: File,
    /// Location of the stdout sink, retained for diagnostics.
    pub out_path: PathBuf,
    /// Location of the stderr sink, retained for diagnostics.
    pub err_path: PathBuf,
}

/// Capability that places and opens per-phase log sinks.
pub trait SinkFactory: Send + Sync + std::fmt::Debug {
    /// Opens (append-or-create) the sink pair for a logical phase.
    fn open(&self, phase: &str) -> io::Result<SinkPair>;

    /// The directory sinks are placed under.
    fn dir(&self) -> &Path;
}

/// Default sink factory: `<phase>.out.log` / `<phase>.err.log` pairs under
/// a `LOGS` subdirectory of the working directory.
#[derive(Debug, Clone)]
pub struct LogsDir {
    root: PathBuf,
}

impl LogsDir {
    /// Creates a factory rooted at an explicit directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the conventional factory for a working directory.
    #[must_use]
    pub fn under(working_dir: &Path) -> Self {
        Self {
            root: working_dir.join(LOGS_DIR_NAME),
        }
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }
}

impl SinkFactory for LogsDir {
    fn open(&self, phase: &str) -> io::Result<SinkPair> {
        std::fs::create_dir_all(&self.root)?;

        let out_path = self.root.join(format!("{phase}.out.log"));
        let err_path = self.root.join(format!("{phase}.err.log"));

        Ok(SinkPair {
            out: Self::open_append(&out_path)?,
            err: Self::open_append(&err_path)?,
            out_path,
            err_path,
        })
    }

    fn dir(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_logs_dir_creates_pair() {
        let dir = tempfile::tempdir().unwrap();
        let factory = LogsDir::under(dir.path());

        let pair = factory.open("import").unwrap();
        assert!(pair.out_path.ends_with("LOGS/import.out.log"));
        assert!(pair.err_path.ends_with("LOGS/import.err.log"));
        assert!(pair.out_path.exists());
        assert!(pair.err_path.exists());
    }

    #[test]
    fn test_logs_dir_appends() {
        let dir = tempfile::tempdir().unwrap();
        let factory = LogsDir::under(dir.path());

        let mut pair = factory.open("fit").unwrap();
        writeln!(pair.out, "first run").unwrap();
        drop(pair);

        let mut pair = factory.open("fit").unwrap();
        writeln!(pair.out, "second run").unwrap();
        drop(pair);

        let content = std::fs::read_to_string(dir.path().join("LOGS/fit.out.log")).unwrap();
        assert_eq!(content, "first run\nsecond run\n");
    }

    #[test]
    fn test_logs_dir_reports_dir() {
        let dir = tempfile::tempdir().unwrap();
        let factory = LogsDir::under(dir.path());
        assert_eq!(factory.dir(), dir.path().join(LOGS_DIR_NAME));
    }
}
