//! Process-wide state shared by the coordinator, controller, and backups.
//!
//! A [`PlatformContext`] is built once at start-up and handed to every
//! component that needs the expected build identifier, the backup lock, or
//! the usage counters.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::info;

use crate::usage::UsageWatcher;

/// Explicitly constructed process-wide state.
#[derive(Debug)]
pub struct PlatformContext {
    expected_build: String,
    backup_lock: Arc<AsyncMutex<()>>,
    usage: Arc<UsageWatcher>,
    halt: Mutex<Option<OwnedMutexGuard<()>>>,
}

impl PlatformContext {
    /// Creates a context for a process running `expected_build`.
    #[must_use]
    pub fn new(expected_build: impl Into<String>) -> Self {
        Self {
            expected_build: expected_build.into(),
            backup_lock: Arc::new(AsyncMutex::new(())),
            usage: Arc::new(UsageWatcher::new()),
            halt: Mutex::new(None),
        }
    }

    /// Build identifier allocations must report before suspend or serve.
    #[must_use]
    pub fn expected_build(&self) -> &str {
        &self.expected_build
    }

    /// Lock held by a backup cycle while it runs.
    #[must_use]
    pub fn backup_lock(&self) -> Arc<AsyncMutex<()>> {
        Arc::clone(&self.backup_lock)
    }

    /// Upload counters for this process.
    #[must_use]
    pub fn usage(&self) -> Arc<UsageWatcher> {
        Arc::clone(&self.usage)
    }

    /// Takes the backup lock and keeps it for the rest of the context's life.
    ///
    /// Waits for an in-flight cycle to finish first. Calling this twice is a
    /// no-op.
    pub async fn halt_backups(&self) {
        if self.backups_halted() {
            return;
        }
        let guard = Arc::clone(&self.backup_lock).lock_owned().await;
        let mut halt = self.halt.lock().unwrap_or_else(PoisonError::into_inner);
        if halt.is_none() {
            *halt = Some(guard);
            info!("backups halted");
        }
    }

    /// Reports whether [`PlatformContext::halt_backups`] has completed.
    #[must_use]
    pub fn backups_halted(&self) -> bool {
        self.halt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
