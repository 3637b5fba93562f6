pub mod config;
pub mod errors;

pub use config::{load_config, AppConfig};
pub use errors::UploadError;
