//! Progress log: the append-only record of loop and tool activity.
//!
//! The execution loop and tools only *emit* [`ProgressEvent`]s to a
//! [`ProgressSink`]. [`ProgressLog`] is the standard sink: it keeps every
//! entry in order, mirrors it to `tracing`, and fans it out to live
//! subscribers over a broadcast channel.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One structured progress entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,

    /// Who emitted it (agent or tool name)
    pub source: String,

    /// What happened (e.g. "tool_started", "run_finished")
    pub action: String,

    /// Free-form detail
    #[serde(default)]
    pub detail: String,
}

impl ProgressEvent {
    pub fn new(
        source: impl Into<String>,
        action: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            action: action.into(),
            detail: detail.into(),
        }
    }

    /// `[HH:MM:SS] source: action detail`
    pub fn render(&self) -> String {
        let line = format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.source,
            self.action
        );
        if self.detail.is_empty() {
            line
        } else {
            format!("{line} {}", self.detail)
        }
    }
}

/// Destination for progress events. Append-only; no read contract.
pub trait ProgressSink: Send + Sync {
    fn record(&self, event: ProgressEvent);

    /// Shorthand for `record(ProgressEvent::new(..))`.
    fn emit(&self, source: &str, action: &str, detail: String) {
        self.record(ProgressEvent::new(source, action, detail));
    }
}

/// Discards everything.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn record(&self, _event: ProgressEvent) {}
}

/// The append-only progress log shared by every loop in a process.
///
/// Each entry is pushed under a single lock acquisition, so concurrent loops
/// never interleave the contents of one entry.
pub struct ProgressLog {
    entries: Mutex<Vec<ProgressEvent>>,
    sender: broadcast::Sender<Arc<ProgressEvent>>,
}

impl ProgressLog {
    /// Create a log whose live subscribers can lag by up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            entries: Mutex::new(Vec::new()),
            sender,
        }
    }

    /// Subscribe to events recorded from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.sender.subscribe()
    }

    /// A snapshot of every entry so far, in append order.
    pub fn entries(&self) -> Vec<ProgressEvent> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries rendered one per line.
    pub fn render(&self) -> String {
        self.entries()
            .iter()
            .map(ProgressEvent::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ProgressSink for ProgressLog {
    fn record(&self, event: ProgressEvent) {
        tracing::debug!(
            source = %event.source,
            action = %event.action,
            detail = %event.detail,
            "progress"
        );

        // A poisoned lock still holds a valid Vec; keep appending.
        match self.entries.lock() {
            Ok(mut entries) => entries.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }

        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new(256)
    }
}
