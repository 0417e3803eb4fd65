//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose the screening core
//! to Kotlin and Swift. The upload queue is a process-wide singleton backed by
//! SQLite; async work runs on a shared tokio runtime and the exported
//! functions block only for the duration of the call they wrap.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};

use crate::{
    angle_between, classify_severity, init_logging, AppState, ForegroundTrigger, FsImageLoader,
    HttpTransport, LineSegment, MeasurementKind, NetworkState, OptionExt, ProcessOutcome,
    Result, SeverityClass, SqliteStore, UploadConfig, UploadMetadata, UploadQueue,
};

// ============================================================================
// Globals
// ============================================================================

static RUNTIME: Lazy<Option<Runtime>> = Lazy::new(|| {
    match Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("scoliscreen-upload")
        .enable_all()
        .build()
    {
        Ok(rt) => Some(rt),
        Err(e) => {
            warn!("[ScoliscreenRust] Failed to create tokio runtime: {}", e);
            None
        }
    }
});

/// Offline until the host reports otherwise, so no attempt is spent blind.
static NETWORK: Lazy<Arc<NetworkState>> = Lazy::new(|| Arc::new(NetworkState::offline()));

struct QueueHandle {
    queue: UploadQueue,
    trigger: Arc<ForegroundTrigger>,
}

static UPLOAD_QUEUE: Lazy<Mutex<Option<QueueHandle>>> = Lazy::new(|| Mutex::new(None));

fn with_queue<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&QueueHandle) -> R,
{
    let guard = UPLOAD_QUEUE.lock().ok()?;
    guard.as_ref().map(f)
}

/// Run a fallible future to completion on the shared runtime.
fn block_on<F, T>(future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let runtime = RUNTIME.as_ref().ok_or_internal("tokio runtime unavailable")?;
    runtime.block_on(future)
}

// ============================================================================
// Records
// ============================================================================

/// Result of a processing pass, flattened for the mobile side.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProcessOutcome {
    pub success: bool,
    /// `no_connection`, `processing_error`, or `not_initialized` when `success` is false
    pub reason: Option<String>,
    pub uploaded: u32,
    pub pending: u32,
}

impl FfiProcessOutcome {
    fn failure(reason: &str) -> Self {
        Self {
            success: false,
            reason: Some(reason.to_string()),
            uploaded: 0,
            pending: 0,
        }
    }
}

impl From<ProcessOutcome> for FfiProcessOutcome {
    fn from(outcome: ProcessOutcome) -> Self {
        match outcome {
            ProcessOutcome::NoConnection => Self::failure("no_connection"),
            ProcessOutcome::Processed { uploaded, pending } => Self {
                success: true,
                reason: None,
                uploaded,
                pending,
            },
        }
    }
}

// ============================================================================
// Upload queue
// ============================================================================

enum InitOutcome {
    Installed(Arc<ForegroundTrigger>),
    AlreadyInitialized,
    Failed,
}

/// Install a queue into `slot` unless one is already there.
///
/// The slot stays locked while `build` runs so two concurrent inits cannot
/// both install. A live queue is never replaced: its pass guard and store
/// lock must stay the only ones over the database.
fn install_queue<F>(slot: &Mutex<Option<QueueHandle>>, build: F) -> InitOutcome
where
    F: FnOnce() -> Option<QueueHandle>,
{
    let Ok(mut guard) = slot.lock() else {
        return InitOutcome::Failed;
    };
    if guard.is_some() {
        return InitOutcome::AlreadyInitialized;
    }
    match build() {
        Some(handle) => {
            let trigger = Arc::clone(&handle.trigger);
            *guard = Some(handle);
            InitOutcome::Installed(trigger)
        }
        None => InitOutcome::Failed,
    }
}

fn build_queue(db_path: &str) -> Option<QueueHandle> {
    let config = UploadConfig::default();
    let store = match SqliteStore::new(db_path) {
        Ok(store) => store,
        Err(e) => {
            warn!("[ScoliscreenRust] Failed to open queue store: {}", e);
            return None;
        }
    };
    let transport = match HttpTransport::new(&config) {
        Ok(transport) => transport,
        Err(e) => {
            warn!("[ScoliscreenRust] {}", e);
            return None;
        }
    };

    let queue = UploadQueue::new(
        Arc::new(store),
        NETWORK.clone(),
        Arc::new(FsImageLoader),
        Arc::new(transport),
        config,
    );
    let trigger = Arc::new(ForegroundTrigger::new(queue.clone(), AppState::Active));
    Some(QueueHandle { queue, trigger })
}

/// Open the queue store at `db_path` and run the process-start retry in the
/// background. Later calls keep the existing queue and return true.
#[uniffi::export]
pub fn upload_queue_init(db_path: String) -> bool {
    init_logging();
    info!("[ScoliscreenRust] upload_queue_init at {}", db_path);

    let Some(runtime) = RUNTIME.as_ref() else {
        return false;
    };

    match install_queue(&UPLOAD_QUEUE, || build_queue(&db_path)) {
        InitOutcome::Installed(trigger) => {
            runtime.spawn(async move {
                trigger.start().await;
            });
            true
        }
        InitOutcome::AlreadyInitialized => {
            info!("[ScoliscreenRust] Upload queue already initialised; keeping it");
            true
        }
        InitOutcome::Failed => false,
    }
}

/// Report the platform's network state.
#[uniffi::export]
pub fn upload_queue_set_network_state(connected: bool, internet_reachable: bool) {
    NETWORK.update(connected, internet_reachable);
}

/// Queue a saved Cobb measurement image. Returns the item id, or `None` if the
/// queue is not initialised or storage failed.
#[uniffi::export]
pub fn upload_queue_enqueue(image_uri: String, cobb_angle: String, timestamp: String) -> Option<String> {
    let queue = with_queue(|h| h.queue.clone())?;
    let metadata = UploadMetadata {
        kind: Some("cobb_angle".to_string()),
        cobb_angle: Some(cobb_angle),
        timestamp: Some(timestamp),
        ..Default::default()
    };
    match block_on(queue.enqueue(&image_uri, metadata)) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("[ScoliscreenRust] Failed to queue image: {}", e);
            None
        }
    }
}

/// Run a processing pass now and wait for it.
#[uniffi::export]
pub fn upload_queue_retry() -> FfiProcessOutcome {
    let Some(queue) = with_queue(|h| h.queue.clone()) else {
        return FfiProcessOutcome::failure("not_initialized");
    };
    match block_on(queue.retry_pending_uploads()) {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            warn!("[ScoliscreenRust] Failed to process upload queue: {}", e);
            FfiProcessOutcome::failure("processing_error")
        }
    }
}

#[uniffi::export]
pub fn upload_queue_pending_count() -> u32 {
    let Some(queue) = with_queue(|h| h.queue.clone()) else {
        return 0;
    };
    match block_on(queue.pending_count()) {
        Ok(count) => count as u32,
        Err(e) => {
            warn!("[ScoliscreenRust] Failed to get pending uploads count: {}", e);
            0
        }
    }
}

#[uniffi::export]
pub fn upload_queue_clear() -> bool {
    let Some(queue) = with_queue(|h| h.queue.clone()) else {
        return false;
    };
    block_on(queue.clear_history()).is_ok()
}

#[uniffi::export]
pub fn upload_queue_set_endpoint(endpoint: String) -> bool {
    let Some(queue) = with_queue(|h| h.queue.clone()) else {
        return false;
    };
    block_on(queue.set_upload_endpoint(&endpoint)).is_ok()
}

/// Forward an app-state change. Returns as soon as the state is recorded;
/// true when a background retry was scheduled.
#[uniffi::export]
pub fn app_state_changed(state: AppState) -> bool {
    let Some(trigger) = with_queue(|h| Arc::clone(&h.trigger)) else {
        return false;
    };
    if !trigger.record_transition(state) {
        return false;
    }
    let Some(runtime) = RUNTIME.as_ref() else {
        return false;
    };
    runtime.spawn(async move {
        trigger.retry_now().await;
    });
    true
}

// ============================================================================
// Geometry
// ============================================================================

#[uniffi::export]
pub fn ffi_angle_between(line1: LineSegment, line2: LineSegment) -> f64 {
    angle_between(&line1, &line2)
}

#[uniffi::export]
pub fn ffi_classify_severity(angle_degrees: f64, kind: MeasurementKind) -> SeverityClass {
    classify_severity(angle_degrees, kind)
}

/// Trunk-rotation angle for a raw roll reading in radians.
#[uniffi::export]
pub fn ffi_rotation_degrees(beta_radians: f64) -> f64 {
    beta_radians.to_degrees().abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::UploadRequest;
    use crate::{MemoryStore, UploadTransport};
    use async_trait::async_trait;

    struct NoTransport;

    #[async_trait]
    impl UploadTransport for NoTransport {
        async fn upload(&self, _request: UploadRequest<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn memory_handle() -> Option<QueueHandle> {
        let queue = UploadQueue::new(
            Arc::new(MemoryStore::new()),
            Arc::new(NetworkState::offline()),
            Arc::new(FsImageLoader),
            Arc::new(NoTransport),
            UploadConfig::default(),
        );
        let trigger = Arc::new(ForegroundTrigger::new(queue.clone(), AppState::Active));
        Some(QueueHandle { queue, trigger })
    }

    #[test]
    fn test_second_init_keeps_existing_queue() {
        let slot = Mutex::new(None);
        assert!(matches!(
            install_queue(&slot, memory_handle),
            InitOutcome::Installed(_)
        ));
        let first = slot.lock().unwrap().as_ref().map(|h| Arc::clone(&h.trigger));

        let mut rebuilt = false;
        let outcome = install_queue(&slot, || {
            rebuilt = true;
            memory_handle()
        });
        assert!(matches!(outcome, InitOutcome::AlreadyInitialized));
        assert!(!rebuilt);

        let second = slot.lock().unwrap().as_ref().map(|h| Arc::clone(&h.trigger));
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    }

    #[test]
    fn test_failed_build_leaves_slot_empty() {
        let slot = Mutex::new(None);
        assert!(matches!(install_queue(&slot, || None), InitOutcome::Failed));
        assert!(slot.lock().unwrap().is_none());
        assert!(matches!(
            install_queue(&slot, memory_handle),
            InitOutcome::Installed(_)
        ));
    }

    #[test]
    fn test_app_state_change_without_queue_is_noop() {
        assert!(!app_state_changed(AppState::Active));
    }
}
