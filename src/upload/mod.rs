//! # Upload
//!
//! Persisted queue of saved images awaiting best-effort delivery.
//!
//! - [`types`] - persisted records and pass outcomes
//! - [`store`] - key/value seam and whole-list queue store
//! - [`queue`] - the queue, its collaborator traits and processing passes
//! - [`lifecycle`] - foreground re-drive
//! - `sqlite` - SQLite-backed key/value store (feature `persistence`)

pub mod lifecycle;
pub mod queue;
pub mod store;
pub mod types;

#[cfg(feature = "persistence")]
pub mod sqlite;

pub use lifecycle::{AppState, ForegroundTrigger};
pub use queue::{
    Connectivity, FsImageLoader, ImageLoader, NetworkState, UploadQueue, UploadRequest,
    UploadTransport,
};
pub use store::{KeyValueStore, MemoryStore, QueueStore};
pub use types::{now_iso, DeviceInfo, ProcessOutcome, UploadItem, UploadMetadata, UploadStatus};

#[cfg(feature = "persistence")]
pub use sqlite::SqliteStore;
