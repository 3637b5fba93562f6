#![allow(dead_code)]

//! In-process mock of the streaming upload endpoint.

use std::path::PathBuf;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use scandrop::common::AppConfig;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// One step of a scripted server conversation.
#[derive(Debug, Clone)]
pub enum Step {
    /// Read the next data frame and assert it is the metadata text frame.
    ExpectMetadata,
    /// Read the next data frame and assert it is the binary payload.
    ExpectBinary,
    /// Send a text frame verbatim.
    SendText(String),
    /// Close the connection.
    Close,
    /// Wait before the next step.
    Pause(u64),
}

pub fn status(message: &str) -> Step {
    Step::SendText(format!(r#"{{"type":"status","message":"{}"}}"#, message))
}

pub fn progress(pct: u8, message: &str) -> Step {
    Step::SendText(format!(
        r#"{{"type":"progress","progress":{},"message":"{}"}}"#,
        pct, message
    ))
}

pub fn success(id: &str, filename: &str, size: u64) -> Step {
    Step::SendText(format!(
        r#"{{"type":"success","data":{{"id":"{}","filename":"{}","size":{},"uploadedAt":"2024-01-01T00:00:00Z","status":"processed"}}}}"#,
        id, filename, size
    ))
}

pub fn error(error: &str) -> Step {
    Step::SendText(format!(r#"{{"type":"error","error":"{}"}}"#, error))
}

/// Frames the mock observed from the client, in arrival order.
#[derive(Debug)]
pub enum Observed {
    Metadata(Value),
    Binary(Vec<u8>),
}

/// Binds a loopback listener, serves exactly one connection with the given
/// script, and reports observed client frames on the returned channel.
/// Returns the HTTP base address to configure the client with.
pub async fn spawn_upload_server(script: Vec<Step>) -> (String, mpsc::UnboundedReceiver<Observed>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let port = listener.local_addr().expect("local addr").port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("websocket handshake");

        for step in script {
            match step {
                Step::ExpectMetadata => match next_data_frame(&mut ws).await {
                    Message::Text(text) => {
                        let value: Value =
                            serde_json::from_str(text.as_str()).expect("metadata is JSON");
                        assert_eq!(value["type"], "metadata", "first frame must be metadata");
                        let _ = tx.send(Observed::Metadata(value));
                    }
                    other => panic!("expected metadata text frame, got {:?}", other),
                },
                Step::ExpectBinary => match next_data_frame(&mut ws).await {
                    Message::Binary(data) => {
                        let _ = tx.send(Observed::Binary(data.to_vec()));
                    }
                    other => panic!("expected binary frame, got {:?}", other),
                },
                Step::SendText(text) => {
                    ws.send(Message::Text(text.into())).await.expect("send");
                }
                Step::Close => {
                    let _ = ws.send(Message::Close(None)).await;
                    return;
                }
                Step::Pause(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            }
        }

        // Drain until the client goes away so the close handshake finishes.
        while let Some(Ok(_)) = ws.next().await {}
    });

    (format!("http://127.0.0.1:{}", port), rx)
}

async fn next_data_frame(ws: &mut WebSocketStream<TcpStream>) -> Message {
    loop {
        match ws.next().await {
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(frame)) => return frame,
            Some(Err(e)) => panic!("mock server read failed: {}", e),
            None => panic!("connection ended before the expected frame"),
        }
    }
}

/// Client config pointed at a mock server, with a short grace delay so
/// tests stay fast.
pub fn test_config(base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.api.url = base_url.to_string();
    config.upload.metadata_grace_ms = 10;
    config
}

/// Writes an image fixture into a fresh temp directory.
pub fn temp_image(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("write image fixture");
    (dir, path)
}
