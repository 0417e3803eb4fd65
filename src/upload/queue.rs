//! # Upload Queue
//!
//! Best-effort background delivery of saved measurement images.
//!
//! ## Policy
//!
//! - `enqueue` persists first, then fires a background pass and returns the id
//! - a pass is skipped entirely while offline (attempt counts untouched)
//! - one failing item never aborts the batch
//! - after `max_attempts` failures an item is dropped without notice
//! - completed items never survive a pass
//!
//! Passes are serialized by a pass guard; a trigger that arrives while a pass
//! is running waits for it and then runs its own.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use super::store::{KeyValueStore, QueueStore};
use super::types::{DeviceInfo, ProcessOutcome, UploadItem, UploadMetadata};
use crate::config::UploadConfig;
use crate::error::{Result, ScreeningError};

// ============================================================================
// Collaborator seams
// ============================================================================

/// Reports whether the device can currently reach the internet.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Reads the bytes behind a local image URI.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, image_uri: &str) -> Result<Vec<u8>>;
}

/// One delivery attempt handed to the transport.
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub endpoint: &'a str,
    pub item_id: &'a str,
    pub image: Vec<u8>,
    pub metadata: &'a UploadMetadata,
}

/// Performs the network upload. `Ok(())` only for an accepted upload.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(&self, request: UploadRequest<'_>) -> Result<()>;
}

/// Connectivity fed by the host platform's network callbacks.
///
/// Reports connected only when the link is up *and* the internet is
/// reachable.
#[derive(Debug)]
pub struct NetworkState {
    connected: AtomicBool,
    internet_reachable: AtomicBool,
}

impl NetworkState {
    pub fn new(connected: bool, internet_reachable: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            internet_reachable: AtomicBool::new(internet_reachable),
        }
    }

    pub fn online() -> Self {
        Self::new(true, true)
    }

    pub fn offline() -> Self {
        Self::new(false, false)
    }

    pub fn update(&self, connected: bool, internet_reachable: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.internet_reachable
            .store(internet_reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connectivity for NetworkState {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.internet_reachable.load(Ordering::SeqCst)
    }
}

/// Loads images from the local filesystem; accepts plain paths and `file://` URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageLoader;

impl FsImageLoader {
    fn path_for(image_uri: &str) -> PathBuf {
        PathBuf::from(image_uri.strip_prefix("file://").unwrap_or(image_uri))
    }
}

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, image_uri: &str) -> Result<Vec<u8>> {
        tokio::fs::read(Self::path_for(image_uri))
            .await
            .map_err(|e| ScreeningError::ImageRead {
                uri: image_uri.to_string(),
                message: e.to_string(),
            })
    }
}

// ============================================================================
// Queue
// ============================================================================

/// Millisecond timestamp ids, forced strictly increasing within the process.
static LAST_ID: AtomicU64 = AtomicU64::new(0);

fn next_item_id() -> String {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let mut last = LAST_ID.load(Ordering::SeqCst);
    loop {
        let candidate = now.max(last + 1);
        match LAST_ID.compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return candidate.to_string(),
            Err(actual) => last = actual,
        }
    }
}

struct QueueInner {
    store: QueueStore,
    connectivity: Arc<dyn Connectivity>,
    loader: Arc<dyn ImageLoader>,
    transport: Arc<dyn UploadTransport>,
    config: UploadConfig,
    pass_guard: Mutex<()>,
}

/// Persistent queue of pending image uploads.
///
/// Cheap to clone; clones share the same store and pass guard.
#[derive(Clone)]
pub struct UploadQueue {
    inner: Arc<QueueInner>,
}

impl UploadQueue {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        connectivity: Arc<dyn Connectivity>,
        loader: Arc<dyn ImageLoader>,
        transport: Arc<dyn UploadTransport>,
        config: UploadConfig,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store: QueueStore::new(kv),
                connectivity,
                loader,
                transport,
                config,
                pass_guard: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.inner.config
    }

    /// Queue an image and kick off a background pass.
    ///
    /// Returns once the item is persisted; the upload itself runs on a spawned
    /// task and its outcome is never reported back through this call. Without
    /// a tokio runtime no pass is spawned and the item waits for the next
    /// foreground retry.
    pub async fn enqueue(&self, image_uri: &str, metadata: UploadMetadata) -> Result<String> {
        let mut metadata = metadata;
        metadata.queued_at = Some(super::types::now_iso());
        metadata.device_info = Some(DeviceInfo::default());

        let item = UploadItem::new(next_item_id(), image_uri.to_string(), metadata);
        let id = item.id.clone();

        let queued = self
            .inner
            .store
            .update(move |items| {
                items.push(item);
                items.len()
            })
            .await
            .map_err(|e| {
                error!("[UploadQueue] Failed to queue image {}: {}", image_uri, e);
                e
            })?;

        info!("[UploadQueue] Queued {} ({} in queue)", id, queued);
        self.spawn_process();

        Ok(id)
    }

    /// Fire-and-forget processing pass on the current runtime.
    pub fn spawn_process(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                handle.spawn(async move {
                    if let Err(e) = queue.process_queue().await {
                        warn!("[UploadQueue] Background pass failed: {}", e);
                    }
                });
            }
            Err(_) => {
                debug!("[UploadQueue] No runtime; pass deferred to next retry");
            }
        }
    }

    /// Attempt delivery of every stored item.
    pub async fn process_queue(&self) -> Result<ProcessOutcome> {
        let _pass = self.inner.pass_guard.lock().await;

        if !self.inner.connectivity.is_connected().await {
            info!("[UploadQueue] No internet connection. Upload will be retried later.");
            return Ok(ProcessOutcome::NoConnection);
        }

        let snapshot = self.inner.store.load().await?;
        if snapshot.is_empty() {
            return Ok(ProcessOutcome::Processed {
                uploaded: 0,
                pending: 0,
            });
        }

        let endpoint = self.upload_endpoint().await;
        let max_attempts = self.inner.config.max_attempts;
        info!(
            "[UploadQueue] Processing {} items against {}",
            snapshot.len(),
            endpoint
        );

        let mut uploaded = 0u32;
        let mut results: HashMap<String, Option<UploadItem>> = HashMap::new();

        for mut item in snapshot {
            if item.is_completed() {
                results.insert(item.id.clone(), None);
                continue;
            }

            match self.deliver(&endpoint, &item).await {
                Ok(()) => {
                    item.mark_completed();
                    uploaded += 1;
                    info!("[UploadQueue] Upload successful for {}", item.id);
                    results.insert(item.id.clone(), None);
                }
                Err(e) => {
                    item.record_failure(e.to_string());
                    if item.upload_attempts < max_attempts {
                        warn!(
                            "[UploadQueue] Upload failed for {} (attempt {}/{}): {}",
                            item.id, item.upload_attempts, max_attempts, e
                        );
                        results.insert(item.id.clone(), Some(item));
                    } else {
                        warn!(
                            "[UploadQueue] Dropping {} after {} failed attempts: {}",
                            item.id, item.upload_attempts, e
                        );
                        results.insert(item.id.clone(), None);
                    }
                }
            }
        }

        // Merge by id against the current list so items queued mid-pass survive.
        let pending = self
            .inner
            .store
            .update(move |items| {
                let current = std::mem::take(items);
                for existing in current {
                    match results.remove(&existing.id) {
                        Some(Some(updated)) => items.push(updated),
                        Some(None) => {}
                        None if existing.is_completed() => {}
                        None => items.push(existing),
                    }
                }
                items.len() as u32
            })
            .await?;

        info!(
            "[UploadQueue] Pass complete: {} uploaded, {} pending",
            uploaded, pending
        );
        Ok(ProcessOutcome::Processed { uploaded, pending })
    }

    async fn deliver(&self, endpoint: &str, item: &UploadItem) -> Result<()> {
        let image = self.inner.loader.load(&item.image_uri).await?;
        debug!(
            "[UploadQueue] Read {} bytes for {}",
            image.len(),
            item.id
        );
        self.inner
            .transport
            .upload(UploadRequest {
                endpoint,
                item_id: &item.id,
                image,
                metadata: &item.metadata,
            })
            .await
    }

    /// Foreground/app-start re-drive. Same as [`process_queue`](Self::process_queue).
    pub async fn retry_pending_uploads(&self) -> Result<ProcessOutcome> {
        info!("[UploadQueue] Checking for pending uploads...");
        self.process_queue().await
    }

    /// Stored items not yet completed.
    pub async fn pending_count(&self) -> Result<usize> {
        let items = self.inner.store.load().await?;
        Ok(items.iter().filter(|item| !item.is_completed()).count())
    }

    /// Snapshot of the stored list.
    pub async fn pending_items(&self) -> Result<Vec<UploadItem>> {
        self.inner.store.load().await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.inner.store.clear().await?;
        info!("[UploadQueue] Upload history cleared");
        Ok(())
    }

    /// Persisted endpoint override, or the configured default.
    pub async fn upload_endpoint(&self) -> String {
        self.inner
            .store
            .endpoint_override()
            .await
            .unwrap_or_else(|| self.inner.config.default_endpoint.clone())
    }

    pub async fn set_upload_endpoint(&self, endpoint: &str) -> Result<()> {
        if endpoint.trim().is_empty() {
            return Err(ScreeningError::Config {
                message: "upload endpoint must not be empty".to_string(),
            });
        }
        self.inner.store.set_endpoint_override(endpoint).await?;
        info!("[UploadQueue] Upload endpoint set to {}", endpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_ids_strictly_increase() {
        let ids: Vec<u64> = (0..50).map(|_| next_item_id().parse().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_fs_loader_strips_file_scheme() {
        assert_eq!(
            FsImageLoader::path_for("file:///tmp/cap.png"),
            PathBuf::from("/tmp/cap.png")
        );
        assert_eq!(
            FsImageLoader::path_for("/tmp/cap.png"),
            PathBuf::from("/tmp/cap.png")
        );
    }

    #[tokio::test]
    async fn test_fs_loader_missing_file_is_image_read_error() {
        let result = FsImageLoader.load("file:///definitely/not/here.png").await;
        assert!(matches!(result, Err(ScreeningError::ImageRead { .. })));
    }

    #[tokio::test]
    async fn test_network_state_requires_reachability() {
        let state = NetworkState::new(true, false);
        assert!(!state.is_connected().await);
        state.update(true, true);
        assert!(state.is_connected().await);
        assert!(!NetworkState::offline().is_connected().await);
    }
}
