//! Foreground re-drive for pending uploads.
//!
//! The host calls [`ForegroundTrigger::start`] once at process start and
//! forwards every app-state change to [`ForegroundTrigger::on_state_change`].
//! There is no timer-based retry; these two calls are the only re-drive.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use super::queue::UploadQueue;
use super::types::ProcessOutcome;

/// Host application lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

/// Watches lifecycle transitions and retries the queue on return to foreground.
pub struct ForegroundTrigger {
    queue: UploadQueue,
    state: Mutex<AppState>,
}

impl ForegroundTrigger {
    pub fn new(queue: UploadQueue, initial: AppState) -> Self {
        Self {
            queue,
            state: Mutex::new(initial),
        }
    }

    /// Process-start retry.
    pub async fn start(&self) -> Option<ProcessOutcome> {
        self.retry_now().await
    }

    /// Record the new state; retry when moving from inactive/background to active.
    ///
    /// Returns the pass outcome when a retry ran.
    pub async fn on_state_change(&self, next: AppState) -> Option<ProcessOutcome> {
        if !self.record_transition(next) {
            return None;
        }
        self.retry_now().await
    }

    /// Record the new state without running anything. Returns true when the
    /// transition is a return to the foreground and a retry is due.
    pub fn record_transition(&self, next: AppState) -> bool {
        let previous = match self.state.lock() {
            Ok(mut state) => std::mem::replace(&mut *state, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        };

        let resumed = matches!(previous, AppState::Inactive | AppState::Background)
            && next == AppState::Active;
        if !resumed {
            debug!("[Lifecycle] {:?} -> {:?}", previous, next);
        }
        resumed
    }

    pub fn current_state(&self) -> AppState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Run a retry pass, logging instead of returning errors.
    pub async fn retry_now(&self) -> Option<ProcessOutcome> {
        match self.queue.retry_pending_uploads().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("[Lifecycle] Retry of pending uploads failed: {}", e);
                None
            }
        }
    }
}
