use std::fmt;

/// Terminal failure of one upload attempt.
///
/// Malformed inbound frames are deliberately absent here: the dispatch
/// loop logs and drops them without failing the session.
#[derive(Debug)]
pub enum UploadError {
    /// Rejected before any network activity (missing file, wrong type, oversize).
    Validation(String),
    /// Missing or unusable API configuration.
    Config(String),
    /// WebSocket handshake, send, or connect failure.
    Connection(String),
    /// Another upload is already in flight on this client.
    Busy,
    /// The server sent an explicit error message, carried verbatim.
    Remote(String),
    /// The connection closed before a terminal message arrived.
    Aborted,
    /// No terminal message within the configured upper bound.
    Timeout,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Validation(msg) => write!(f, "validation failed: {}", msg),
            UploadError::Config(msg) => write!(f, "configuration error: {}", msg),
            UploadError::Connection(msg) => write!(f, "connection failed: {}", msg),
            UploadError::Busy => write!(f, "an upload is already in progress"),
            UploadError::Remote(msg) => write!(f, "upload failed: {}", msg),
            UploadError::Aborted => {
                write!(f, "connection closed before the upload completed")
            }
            UploadError::Timeout => {
                write!(f, "no terminal message arrived within the upload timeout")
            }
        }
    }
}

impl std::error::Error for UploadError {}
