//! Drives the two-phase send and owns the single outstanding upload.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use crate::common::config::AppConfig;
use crate::common::errors::UploadError;
use crate::upload::history::StatusHistory;
use crate::upload::protocol::{Metadata, UploadReceipt};
use crate::upload::session::{Dispatcher, Session};
use crate::upload::status::{StatusTracker, UploadPhase};

/// One logical upload session owner. Cloning shares the tracker, history
/// and in-flight gate, so exactly one upload may be pending across clones.
#[derive(Clone)]
pub struct UploadClient {
    config: AppConfig,
    tracker: Arc<StatusTracker>,
    history: Arc<StatusHistory>,
    in_flight: Arc<AtomicBool>,
}

impl UploadClient {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            tracker: Arc::new(StatusTracker::new()),
            history: Arc::new(StatusHistory::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub fn history(&self) -> &StatusHistory {
        &self.history
    }

    /// Uploads one file and waits for the server's verdict.
    ///
    /// Resolves with exactly one terminal outcome: the success receipt, a
    /// remote error carried verbatim, `Aborted` if the connection closed
    /// before a terminal message, or `Timeout` after the configured upper
    /// bound. A second call while one is pending fails with `Busy` without
    /// disturbing the first call's eventual resolution.
    pub async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError> {
        // Everything here runs before any network activity.
        let metadata = Metadata::for_file(path, self.config.upload.max_file_size)?;
        let endpoint = self.config.ws_endpoint()?;
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        self.tracker.reset(UploadPhase::Uploading);

        // Whole payload in one frame; the size limit bounds this read.
        let payload = tokio::fs::read(path).await.map_err(|e| {
            UploadError::Validation(format!("cannot read {}: {}", path.display(), e))
        })?;

        self.tracker.set_phase(UploadPhase::Connecting);
        let (completion_tx, completion_rx) = oneshot::channel();
        let dispatcher = Dispatcher {
            tracker: self.tracker.clone(),
            history: self.history.clone(),
            completion: Arc::new(Mutex::new(Some(completion_tx))),
        };

        let mut session = match Session::open(&endpoint, dispatcher).await {
            Ok(session) => session,
            Err(e) => {
                self.tracker.set_phase(UploadPhase::Error);
                return Err(e);
            }
        };

        let result = self
            .run_transfer(&mut session, &metadata, payload, completion_rx)
            .await;
        session.close().await;

        if result.is_err() {
            self.tracker.set_phase(UploadPhase::Error);
        }
        result
    }

    async fn run_transfer(
        &self,
        session: &mut Session,
        metadata: &Metadata,
        payload: Vec<u8>,
        completion_rx: oneshot::Receiver<Result<UploadReceipt, UploadError>>,
    ) -> Result<UploadReceipt, UploadError> {
        session.send_metadata(metadata).await?;
        tracing::info!("metadata sent for {} ({} bytes)", metadata.filename, metadata.size);

        // Gives the receiver time to register the metadata before the
        // payload arrives. A scheduling nudge, not a delivery guarantee.
        sleep(Duration::from_millis(self.config.upload.metadata_grace_ms)).await;

        session.send_payload(payload).await?;
        self.tracker.set_phase(UploadPhase::Uploading);

        let upper_bound = Duration::from_secs(self.config.upload.timeout_secs);
        match timeout(upper_bound, completion_rx).await {
            Ok(Ok(outcome)) => outcome,
            // Inbound loop died without resolving; same as a closed connection.
            Ok(Err(_recv)) => Err(UploadError::Aborted),
            Err(_elapsed) => Err(UploadError::Timeout),
        }
    }
}

/// First-come-first-served in-flight gate. Released on drop so every exit
/// path frees the slot.
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, UploadError> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(UploadError::Busy);
        }
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_gate_is_first_come_first_served() {
        let flag = Arc::new(AtomicBool::new(false));

        let first = InFlightGuard::acquire(&flag).expect("first acquire succeeds");
        assert!(matches!(
            InFlightGuard::acquire(&flag),
            Err(UploadError::Busy)
        ));

        drop(first);
        assert!(InFlightGuard::acquire(&flag).is_ok());
    }
}
