//! Persisted upload records.
//!
//! Field names serialize in camelCase so the stored blob keeps the shape the
//! mobile app has always written under `@pending_uploads`.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// ISO-8601 UTC timestamp with millisecond precision (`2024-05-01T12:00:00.000Z`).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Lifecycle state of a queued upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum UploadStatus {
    Pending,
    Completed,
    Failed,
}

/// Static device description stamped on every queued item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: String,
    pub app: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            platform: "mobile".to_string(),
            app: "Scoliosis Screening".to_string(),
        }
    }
}

/// Metadata sent alongside the image.
///
/// `cobbAngle` and `timestamp` go on the wire; everything else is kept for
/// bookkeeping. Unknown caller fields are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cobb_angle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl UploadMetadata {
    /// Metadata for a saved Cobb measurement; the angle is formatted to one decimal.
    pub fn cobb_measurement(angle_degrees: f64) -> Self {
        Self {
            kind: Some("cobb_angle".to_string()),
            cobb_angle: Some(format!("{:.1}", angle_degrees)),
            timestamp: Some(now_iso()),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// One pending image upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadItem {
    pub id: String,
    /// Reference to the locally stored image; the bytes are never embedded
    pub image_uri: String,
    pub metadata: UploadMetadata,
    pub upload_attempts: u32,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

impl UploadItem {
    pub fn new(id: String, image_uri: String, metadata: UploadMetadata) -> Self {
        Self {
            id,
            image_uri,
            metadata,
            upload_attempts: 0,
            status: UploadStatus::Pending,
            last_attempt: None,
            last_error: None,
            uploaded_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == UploadStatus::Completed
    }

    pub(crate) fn mark_completed(&mut self) {
        self.status = UploadStatus::Completed;
        self.uploaded_at = Some(now_iso());
    }

    pub(crate) fn record_failure(&mut self, error: String) {
        self.upload_attempts += 1;
        self.status = UploadStatus::Failed;
        self.last_attempt = Some(now_iso());
        self.last_error = Some(error);
    }
}

/// Outcome of one processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Offline; nothing was attempted or modified
    NoConnection,
    /// Pass ran; `uploaded` succeeded this pass, `pending` remain stored
    Processed { uploaded: u32, pending: u32 },
}

impl ProcessOutcome {
    pub fn uploaded(&self) -> u32 {
        match self {
            ProcessOutcome::NoConnection => 0,
            ProcessOutcome::Processed { uploaded, .. } => *uploaded,
        }
    }
}
