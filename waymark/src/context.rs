//! The working context shared by every stage of one pipeline run.
//!
//! All stage logic receives the context as an explicit parameter; nothing
//! reads ambient global state. Two contexts over disjoint working
//! directories can therefore drive concurrent pipeline instances safely.

use crate::events::{get_event_sink, EventSink};
use crate::sinks::{LogsDir, SinkFactory};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Identifies a single pipeline run for log and report correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying uuid.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The shared environment visible to every checkpoint and action of a run.
///
/// Owns the resolved working directory, the subject identifier used for
/// path templating, the option flags gating optional sub-steps, and the
/// injected sink capabilities. Construction is cheap; one context is built
/// per pipeline invocation and never shared across instances.
pub struct WorkContext {
    working_dir: PathBuf,
    subject: String,
    run: RunId,
    flags: BTreeMap<String, bool>,
    sinks: Arc<dyn SinkFactory>,
    event_sink: Arc<dyn EventSink>,
    cancelled: AtomicBool,
    cancel_reason: RwLock<Option<String>>,
}

impl WorkContext {
    /// Creates a context over a working directory for one subject.
    ///
    /// The directory is taken as already resolved (absolute); see
    /// [`crate::controller::resolve_working_dir`]. Log sinks default to a
    /// `LOGS` subdirectory and the event sink to the process-wide default.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>, subject: impl Into<String>) -> Self {
        let working_dir = working_dir.into();
        let sinks: Arc<dyn SinkFactory> = Arc::new(LogsDir::under(&working_dir));

        Self {
            working_dir,
            subject: subject.into(),
            run: RunId::new(),
            flags: BTreeMap::new(),
            sinks,
            event_sink: get_event_sink(),
            cancelled: AtomicBool::new(false),
            cancel_reason: RwLock::new(None),
        }
    }

    /// Sets a boolean option flag.
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    /// Replaces the log sink factory.
    #[must_use]
    pub fn with_sink_factory(mut self, sinks: Arc<dyn SinkFactory>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the resolved working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run
    }

    /// Returns the value of an option flag, `false` when unset.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Returns the log sink factory.
    #[must_use]
    pub fn sinks(&self) -> &Arc<dyn SinkFactory> {
        &self.sinks
    }

    /// Marks the run as cancelled.
    ///
    /// Idempotent; only the first reason is stored. The pipeline checks
    /// this between stages, so a running action completes before the
    /// cancellation takes effect.
    pub fn mark_cancelled(&self, reason: impl Into<String>) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            *self.cancel_reason.write() = Some(reason.into());
        }
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if cancelled.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel_reason.read().clone()
    }

    /// Emits an event enriched with the run id and subject.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert("run_id".to_string(), serde_json::json!(self.run.to_string()));
            map.insert("subject".to_string(), serde_json::json!(&self.subject));
        }

        self.event_sink.try_emit(event_type, Some(enriched));
    }
}

impl std::fmt::Debug for WorkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkContext")
            .field("working_dir", &self.working_dir)
            .field("subject", &self.subject)
            .field("run", &self.run)
            .field("flags", &self.flags)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_context_creation() {
        let ctx = WorkContext::new("/data/subj01", "subj01").with_flag("sample", true);

        assert_eq!(ctx.working_dir(), Path::new("/data/subj01"));
        assert_eq!(ctx.subject(), "subj01");
        assert!(ctx.flag("sample"));
        assert!(!ctx.flag("unset"));
    }

    #[test]
    fn test_default_sink_factory_under_logs() {
        let ctx = WorkContext::new("/data/subj01", "subj01");
        assert_eq!(ctx.sinks().dir(), Path::new("/data/subj01/LOGS"));
    }

    #[test]
    fn test_cancellation_is_idempotent() {
        let ctx = WorkContext::new("/data/subj01", "subj01");
        assert!(!ctx.is_cancelled());
        assert!(ctx.cancel_reason().is_none());

        ctx.mark_cancelled("deadline exceeded");
        ctx.mark_cancelled("second reason");

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.cancel_reason(), Some("deadline exceeded".to_string()));
    }

    #[test]
    fn test_event_enrichment() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = WorkContext::new("/data/subj01", "subj01").with_event_sink(sink.clone());

        ctx.try_emit_event("stage.started", Some(serde_json::json!({"stage": "import"})));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let data = events[0].1.as_ref().unwrap();
        assert_eq!(data["stage"], "import");
        assert_eq!(data["subject"], "subj01");
        assert_eq!(data["run_id"], ctx.run_id().to_string());
    }

    #[test]
    fn test_run_id_display_roundtrip() {
        let run = RunId::new();
        let json = serde_json::to_string(&run).unwrap();
        let back: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(run, back);
    }
}
