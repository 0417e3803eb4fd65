//! # Queue Store
//!
//! Key/value storage seam plus the whole-list queue store built on it.
//!
//! The pending list lives as a single JSON array under one key and is always
//! rewritten in full. [`QueueStore`] serializes every read-modify-write behind
//! its own lock so an enqueue cannot interleave with the tail of a
//! processing pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::Mutex;

use super::types::UploadItem;
use crate::config::{PENDING_UPLOADS_KEY, UPLOAD_ENDPOINT_KEY};
use crate::error::{Result, ScreeningError};

/// Async string key/value storage (AsyncStorage, SharedPreferences, SQLite, ...).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store. Optionally fails every call, for exercising the
/// storage-unavailable path.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a persistence error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScreeningError::Persistence {
                message: "storage unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// The persisted upload list and endpoint override.
#[derive(Clone)]
pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
    rmw: Arc<Mutex<()>>,
}

impl QueueStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            rmw: Arc::new(Mutex::new(())),
        }
    }

    /// Load the full list. A missing key is an empty queue.
    pub async fn load(&self) -> Result<Vec<UploadItem>> {
        let _guard = self.rmw.lock().await;
        self.load_unlocked().await
    }

    async fn load_unlocked(&self) -> Result<Vec<UploadItem>> {
        match self.kv.get(PENDING_UPLOADS_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_unlocked(&self, items: &[UploadItem]) -> Result<()> {
        let json = serde_json::to_string(items)?;
        self.kv.set(PENDING_UPLOADS_KEY, &json).await
    }

    /// Read the whole list, mutate it, write the whole list back.
    pub async fn update<F, R>(&self, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<UploadItem>) -> R + Send,
        R: Send,
    {
        let _guard = self.rmw.lock().await;
        let mut items = self.load_unlocked().await?;
        let result = mutate(&mut items);
        self.save_unlocked(&items).await?;
        debug!("[QueueStore] Rewrote queue with {} items", items.len());
        Ok(result)
    }

    /// Drop the persisted list entirely.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.rmw.lock().await;
        self.kv.remove(PENDING_UPLOADS_KEY).await
    }

    /// Endpoint override, if one was set.
    pub async fn endpoint_override(&self) -> Option<String> {
        match self.kv.get(UPLOAD_ENDPOINT_KEY).await {
            Ok(endpoint) => endpoint.filter(|e| !e.is_empty()),
            Err(e) => {
                warn!("[QueueStore] Failed to read upload endpoint: {}", e);
                None
            }
        }
    }

    pub async fn set_endpoint_override(&self, endpoint: &str) -> Result<()> {
        self.kv.set(UPLOAD_ENDPOINT_KEY, endpoint).await
    }
}
