//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config < enviroment
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::common::errors::UploadError;

/// Upper bound on what an upload will read into memory. The protocol sends
/// the whole payload as a single binary frame, so this also bounds frame size.
pub const MAX_UPLOAD_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Fixed path appended to the scheme-upgraded base address.
pub const UPLOAD_WS_PATH: &str = "/api/upload/ws";

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "scandrop")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("scandrop.toml"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// HTTP base address of the API host, e.g. "http://localhost:8000".
    /// Unset means every upload attempt is rejected.
    pub url: String,
}

/// Upload tuning parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Largest accepted file, in bytes
    pub max_file_size: u64,
    /// Pause between the metadata frame and the binary frame
    pub metadata_grace_ms: u64,
    /// Upper bound on waiting for a terminal message
    pub timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size: MAX_UPLOAD_SIZE_BYTES,
            metadata_grace_ms: 100,
            timeout_secs: 300,
        }
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSettings,
    pub upload: UploadSettings,
}

impl AppConfig {
    /// Derives the streaming upload endpoint from the configured API base:
    /// `http` maps to `ws`, `https` to `wss`, then [`UPLOAD_WS_PATH`] is
    /// appended. An unset base is a hard failure, not a guessed host.
    pub fn ws_endpoint(&self) -> Result<String, UploadError> {
        let base = self.http_base()?;
        let upgraded = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(UploadError::Config(format!(
                "api.url must start with http:// or https://, got '{}'",
                base
            )));
        };
        Ok(format!("{}{}", upgraded, UPLOAD_WS_PATH))
    }

    /// HTTP base with any trailing slash removed, for the REST collaborators.
    pub fn http_base(&self) -> Result<String, UploadError> {
        let base = self.api.url.trim_end_matches('/');
        if base.is_empty() {
            return Err(UploadError::Config("api.url is not set".to_string()));
        }
        Ok(base.to_string())
    }

    /// Validates upload bounds and rejects unsafe values.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.upload.max_file_size > 0,
            "Invalid config: upload.max_file_size must be > 0"
        );
        ensure!(
            self.upload.max_file_size <= MAX_UPLOAD_SIZE_BYTES,
            "Invalid config: upload.max_file_size must be <= {MAX_UPLOAD_SIZE_BYTES}"
        );
        ensure!(
            self.upload.timeout_secs > 0,
            "Invalid config: upload.timeout_secs must be > 0"
        );
        Ok(())
    }
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    let path = config_path();

    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("SCANDROP_").split("_"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}
