//! Gateway configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "request_timeout_ms": 5000, "store_path": "/var/lib/udcp" }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default deadline for one protocol turn.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default limit on the bytes a session may accumulate in its receive buffer.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8096;

/// Configuration for a [`Gateway`](crate::Gateway).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deadline for one turn, in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum size of a session's receive buffer.
    pub max_buffer_size: usize,
    /// Directory of the file-backed session store. `None` keeps sessions in
    /// memory.
    pub store_path: Option<PathBuf>,
}

impl GatewayConfig {
    /// Parse a config from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Turn deadline as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            store_path: None,
        }
    }
}
