//! HTTP upload transport for the screening image endpoint.
//!
//! The endpoint expects a multipart form of plain text fields:
//! - `image` - base64 of the PNG bytes (a text field, not a file part)
//! - `filename` - `spine_xray_<millis>.png`; the server may rename it
//! - `cobbAngle` - metadata value or `N/A`
//! - `timestamp` - metadata value or the current ISO-8601 time
//!
//! Any 2xx is success. Other statuses and request errors are failures; no
//! retry happens here, the queue owns the retry budget.

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::multipart::Form;
use reqwest::Client;
use std::time::Instant;

use crate::config::UploadConfig;
use crate::error::{Result, ScreeningError};
use crate::upload::types::{now_iso, UploadMetadata};
use crate::upload::{UploadRequest, UploadTransport};

/// Multipart uploader backed by a pooled `reqwest` client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ScreeningError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    fn filename() -> String {
        format!("spine_xray_{}.png", Utc::now().timestamp_millis())
    }
}

/// Text fields for one upload, in wire order.
pub(crate) fn form_fields(
    image: &[u8],
    filename: String,
    metadata: &UploadMetadata,
) -> Vec<(&'static str, String)> {
    vec![
        (
            "image",
            base64::engine::general_purpose::STANDARD.encode(image),
        ),
        ("filename", filename),
        (
            "cobbAngle",
            metadata
                .cobb_angle
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
        ),
        (
            "timestamp",
            metadata
                .timestamp
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(now_iso),
        ),
    ]
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload(&self, request: UploadRequest<'_>) -> Result<()> {
        let start = Instant::now();
        let filename = Self::filename();
        debug!(
            "[HttpTransport] Uploading {} ({} bytes) for {} to {}",
            filename,
            request.image.len(),
            request.item_id,
            request.endpoint
        );

        let form = form_fields(&request.image, filename.clone(), request.metadata)
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));

        let response = self
            .client
            .post(request.endpoint)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("[HttpTransport] Request error for {}: {}", filename, e);
                ScreeningError::Http {
                    message: e.to_string(),
                    status_code: None,
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(
                "[HttpTransport] Upload failed with status {}: {}",
                status, body
            );
            return Err(ScreeningError::Http {
                message: body,
                status_code: Some(status.as_u16()),
            });
        }

        info!(
            "[HttpTransport] Upload successful for {} in {:?}",
            filename,
            start.elapsed()
        );
        Ok(())
    }
}
