//! Live upload status: phase, latest server message, progress percentage.

use tokio::sync::watch;

/// Display phase of the current upload, distinct from the resolved or
/// unresolved state of its completion future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    Connecting,
    Uploading,
    /// Server has the bytes and is still working.
    Processing,
    Success,
    Error,
}

impl UploadPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadPhase::Success | UploadPhase::Error)
    }
}

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub phase: UploadPhase,
    pub message: Option<String>,
    pub progress: u8,
}

/// Status tracker backed by a watch channel. The inbound dispatch loop is
/// the writer during a session; display loops subscribe for changes.
#[derive(Debug)]
pub struct StatusTracker {
    tx: watch::Sender<StatusSnapshot>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver for change-driven display (CLI output, progress bars).
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// Clears message and progress for a fresh upload attempt.
    pub fn reset(&self, phase: UploadPhase) {
        self.tx.send_modify(|s| {
            s.phase = phase;
            s.message = None;
            s.progress = 0;
        });
    }

    pub fn set_phase(&self, phase: UploadPhase) {
        self.tx.send_modify(|s| s.phase = phase);
    }

    /// A `status` message updates the text only; percentage is untouched.
    pub fn record_status(&self, message: &str) {
        self.tx.send_modify(|s| s.message = Some(message.to_string()));
    }

    /// A `progress` message updates percentage and text together.
    /// Out-of-order or regressing percentages are displayed as received,
    /// not corrected.
    pub fn record_progress(&self, progress: u8, message: Option<&str>) {
        self.tx.send_modify(|s| {
            s.progress = progress;
            s.message = message.map(|m| m.to_string());
            if progress >= 100 && !s.phase.is_terminal() {
                s.phase = UploadPhase::Processing;
            }
        });
    }
}
