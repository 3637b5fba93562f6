//! Duplex transport session: one WebSocket connection, one inbound
//! dispatch loop, deterministic abort of the pending completion on closure.

use std::sync::{Arc, Mutex};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::common::errors::UploadError;
use crate::upload::history::StatusHistory;
use crate::upload::protocol::{self, Metadata, ServerMessage, UploadReceipt};
use crate::upload::status::{StatusTracker, UploadPhase};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Resolves one upload's completion future. Taken exactly once: by the
/// first terminal message, or by the loop-exit abort path.
pub type CompletionSlot = Arc<Mutex<Option<oneshot::Sender<Result<UploadReceipt, UploadError>>>>>;

/// Shared targets the inbound loop dispatches into. Scoped to one upload
/// call; the completion sender is gone after the first terminal delivery.
#[derive(Clone)]
pub struct Dispatcher {
    pub tracker: Arc<StatusTracker>,
    pub history: Arc<StatusHistory>,
    pub completion: CompletionSlot,
}

pub struct Session {
    sink: SplitSink<WsStream, Message>,
    cancel: CancellationToken,
    closed: bool,
}

impl Session {
    /// Opens the duplex connection and spawns the inbound dispatch loop.
    /// At most one loop runs per connection; it terminates when the
    /// connection closes on either side or when [`Session::close`] cancels it.
    pub async fn open(endpoint: &str, dispatcher: Dispatcher) -> Result<Self, UploadError> {
        let (stream, _response) = connect_async(endpoint)
            .await
            .map_err(|e| UploadError::Connection(e.to_string()))?;
        tracing::debug!("websocket connection established: {}", endpoint);

        let (sink, inbound) = stream.split();
        let cancel = CancellationToken::new();
        tokio::spawn(run_inbound_loop(inbound, dispatcher, cancel.clone()));

        Ok(Self {
            sink,
            cancel,
            closed: false,
        })
    }

    /// Sends the metadata text frame. Must precede [`Session::send_payload`].
    pub async fn send_metadata(&mut self, metadata: &Metadata) -> Result<(), UploadError> {
        let frame = protocol::encode_metadata(metadata)
            .map_err(|e| UploadError::Connection(format!("failed to encode metadata: {}", e)))?;
        self.sink
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| UploadError::Connection(format!("failed to send metadata frame: {}", e)))
    }

    /// Sends the raw payload as one binary frame.
    pub async fn send_payload(&mut self, payload: Vec<u8>) -> Result<(), UploadError> {
        self.sink
            .send(Message::Binary(payload.into()))
            .await
            .map_err(|e| UploadError::Connection(format!("failed to send binary frame: {}", e)))
    }

    /// Idempotent teardown: stops the inbound loop (which aborts any still
    /// pending completion) and sends a close frame on a best-effort basis.
    /// Safe to call on an already-closed connection.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel.cancel();
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            tracing::debug!("close frame not delivered: {}", e);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Stops the inbound loop even if close() was never awaited.
        self.cancel.cancel();
    }
}

async fn run_inbound_loop(
    mut inbound: SplitStream<WsStream>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("inbound loop cancelled");
                break;
            }
            frame = inbound.next() => match frame {
                Some(Ok(Message::Text(text))) => match protocol::decode(text.as_str()) {
                    Ok(message) => dispatch(&dispatcher, message),
                    // One malformed frame must not take down the session.
                    Err(e) => tracing::warn!("dropping inbound frame: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("server closed the connection: {:?}", frame);
                    break;
                }
                // Pings are answered by tungstenite itself; binary from the
                // server has no meaning in this protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("websocket read failed: {}", e);
                    break;
                }
                None => {
                    tracing::debug!("websocket stream ended");
                    break;
                }
            }
        }
    }

    // Whatever ended the loop, a still-pending upload resolves as aborted.
    if let Some(tx) = take_completion(&dispatcher.completion) {
        dispatcher.tracker.set_phase(UploadPhase::Error);
        let _ = tx.send(Err(UploadError::Aborted));
    }
}

fn dispatch(dispatcher: &Dispatcher, message: ServerMessage) {
    match message {
        ServerMessage::Status { message } => {
            tracing::debug!("status: {}", message);
            dispatcher.tracker.record_status(&message);
            dispatcher.history.record(&message);
        }
        ServerMessage::Progress {
            progress,
            received,
            total,
            message,
        } => {
            tracing::debug!("progress: {}% ({}/{} bytes)", progress, received, total);
            dispatcher.tracker.record_progress(progress, message.as_deref());
            if let Some(text) = message.as_deref() {
                dispatcher.history.record(text);
            }
        }
        ServerMessage::Success { data, message } => {
            if let Some(text) = message.as_deref() {
                dispatcher.tracker.record_status(text);
                dispatcher.history.record(text);
            }
            match take_completion(&dispatcher.completion) {
                Some(tx) => {
                    tracing::info!("upload accepted: {}", data.id);
                    dispatcher.tracker.set_phase(UploadPhase::Success);
                    let _ = tx.send(Ok(data));
                }
                None => tracing::debug!("ignoring success message, no pending upload"),
            }
        }
        ServerMessage::Error { error, message } => {
            if let Some(text) = message.as_deref() {
                dispatcher.tracker.record_status(text);
                dispatcher.history.record(text);
            }
            match take_completion(&dispatcher.completion) {
                Some(tx) => {
                    tracing::warn!("upload rejected: {}", error);
                    dispatcher.tracker.set_phase(UploadPhase::Error);
                    let _ = tx.send(Err(UploadError::Remote(error)));
                }
                None => tracing::debug!("ignoring error message, no pending upload"),
            }
        }
    }
}

fn take_completion(
    slot: &CompletionSlot,
) -> Option<oneshot::Sender<Result<UploadReceipt, UploadError>>> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => {
            tracing::error!("completion slot lock poisoned, recovering");
            poisoned.into_inner().take()
        }
    }
}
