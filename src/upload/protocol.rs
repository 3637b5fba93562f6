//! Wire frames for the duplex upload protocol.
//!
//! Outbound is two separate frames, in order: a JSON text frame with the
//! file metadata, then one binary frame carrying the raw payload. Inbound
//! frames are JSON text classified by a required `type` tag.

use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::common::errors::UploadError;

/// Image types the upload accepts, mapped to their content type.
const ACCEPTED_IMAGE_TYPES: [(&str, &str); 4] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
];

/// Outbound metadata frame. Constructed once per upload, sent exactly once,
/// strictly before the binary frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "metadata", rename_all = "camelCase")]
pub struct Metadata {
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    /// File mtime in milliseconds since the epoch.
    pub last_modified: u64,
}

impl Metadata {
    /// Builds the metadata frame for a file on disk, validating it against
    /// the accepted image types and the size limit. Runs before any network
    /// activity.
    pub fn for_file(path: &Path, max_size: u64) -> Result<Self, UploadError> {
        let meta = std::fs::metadata(path).map_err(|e| {
            UploadError::Validation(format!("cannot read {}: {}", path.display(), e))
        })?;
        if !meta.is_file() {
            return Err(UploadError::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if meta.len() > max_size {
            return Err(UploadError::Validation(format!(
                "file size {} exceeds the {} byte limit",
                meta.len(),
                max_size
            )));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::Validation("file has no usable name".to_string()))?
            .to_string();

        let content_type = content_type_for(&filename).ok_or_else(|| {
            UploadError::Validation(
                "unsupported image type (expected jpg, jpeg, png or gif)".to_string(),
            )
        })?;

        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Ok(Self {
            filename,
            size: meta.len(),
            content_type: content_type.to_string(),
            last_modified,
        })
    }
}

fn content_type_for(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ACCEPTED_IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, content_type)| *content_type)
}

/// Result record carried by a `success` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub uploaded_at: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Inbound message union. A frame with a missing or unrecognized `type`
/// fails to decode and is dropped by the dispatch loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Status {
        message: String,
    },
    Progress {
        progress: u8,
        #[serde(default)]
        received: u64,
        #[serde(default)]
        total: u64,
        #[serde(default)]
        message: Option<String>,
    },
    Success {
        data: UploadReceipt,
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        error: String,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Codec failure for a single frame. Swallowed (logged) at the dispatch
/// site for inbound frames; a healthy connection survives it.
#[derive(Debug)]
pub struct ProtocolError(serde_json::Error);

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed frame: {}", self.0)
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Serializes the metadata frame body.
pub fn encode_metadata(metadata: &Metadata) -> Result<String, ProtocolError> {
    serde_json::to_string(metadata).map_err(ProtocolError)
}

/// Parses one inbound text frame.
pub fn decode(text: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError)
}
