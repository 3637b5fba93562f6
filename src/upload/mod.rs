pub mod history;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod status;

pub use history::{HistoryEntry, HistoryView, StatusHistory};
pub use orchestrator::UploadClient;
pub use protocol::{Metadata, ServerMessage, UploadReceipt};
pub use status::{StatusSnapshot, StatusTracker, UploadPhase};
