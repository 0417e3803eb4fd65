//! Upload and capture configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Endpoint used when no override has been persisted.
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://hepius.co/scoliosis-uploads/upload.php";

/// Attempts an item gets before it is dropped from the queue.
pub const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Storage key holding the serialized pending-upload list.
pub const PENDING_UPLOADS_KEY: &str = "@pending_uploads";

/// Storage key holding the endpoint override.
pub const UPLOAD_ENDPOINT_KEY: &str = "@upload_endpoint";

/// Tunables for the upload queue and the save path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Fallback endpoint when no override is stored
    pub default_endpoint: String,
    /// Items are dropped once `upload_attempts` reaches this value
    pub max_attempts: u32,
    /// Per-request HTTP timeout, in seconds
    pub request_timeout_secs: u64,
    /// Wait after forcing scale to 1.0 before capturing, in milliseconds
    pub render_settle_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            max_attempts: MAX_UPLOAD_ATTEMPTS,
            request_timeout_secs: 30,
            render_settle_ms: 100,
        }
    }
}

impl UploadConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }
}
