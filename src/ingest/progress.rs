//! Progress reporting collaborator.
//!
//! Informational strings ("Downloading X", "Restoring database Y") are
//! emitted through an injected reporter rather than produced by pipeline
//! control flow, so callers own the presentation.

use std::sync::Mutex;

/// Receives user-facing progress messages from the pipeline.
pub trait Progress: Send + Sync {
    /// Report one informational message.
    fn info(&self, message: &str);
}

/// Default reporter: forwards to `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl Progress for TracingProgress {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Test reporter that records every message.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<String>>,
}

impl RecordingProgress {
    /// Messages reported so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("progress lock poisoned").clone()
    }
}

impl Progress for RecordingProgress {
    fn info(&self, message: &str) {
        self.messages
            .lock()
            .expect("progress lock poisoned")
            .push(message.to_string());
    }
}
