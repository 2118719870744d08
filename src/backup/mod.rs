//! Periodic, mutually exclusive snapshots of coordinator state.
//!
//! One tokio task runs the schedule. The first cycle starts immediately and
//! later cycles start a fixed delay after the previous one finished. Every
//! cycle holds the process-wide backup lock from [`PlatformContext`] while it
//! snapshots. [`BackupScheduler::shutdown`] takes that lock for good, so no
//! cycle starts afterwards.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::PlatformContext;
use crate::coordinator::{Coordinator, CoordinatorSnapshot};
use crate::vendor::VendorVerifier;

mod snapshot;

pub use snapshot::DirectorySnapshotter;

/// Errors raised by backup scheduling and snapshot writing.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BackupError {
    /// Raised when the schedule yields a non-positive period.
    #[error("backup period must be a positive number of milliseconds, got {millis}")]
    BackupPeriodInvalid {
        /// Period supplied by the schedule.
        millis: i64,
    },
    /// Raised when the snapshot target cannot be written.
    #[error("failed to write backup at {path}: {message}")]
    Io {
        /// Path being written.
        path: Utf8PathBuf,
        /// Underlying I/O message.
        message: String,
    },
    /// Raised when the snapshot cannot be produced or encoded.
    #[error("snapshot failed: {message}")]
    Snapshot {
        /// Description of the failure.
        message: String,
    },
}

/// Delay between the end of one backup cycle and the start of the next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackupPeriod(Duration);

impl BackupPeriod {
    /// Builds a period from the millisecond value a schedule expression
    /// resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::BackupPeriodInvalid`] for zero or negative
    /// values.
    pub fn from_millis(millis: i64) -> Result<Self, BackupError> {
        u64::try_from(millis)
            .ok()
            .filter(|value| *value > 0)
            .map(|value| Self(Duration::from_millis(value)))
            .ok_or(BackupError::BackupPeriodInvalid { millis })
    }

    /// Period as a [`Duration`].
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        self.0
    }
}

/// Future returned by [`Snapshotter::write`].
pub type SnapshotFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BackupError>> + Send + 'a>>;

/// Persists one coordinator snapshot.
pub trait Snapshotter: Send + Sync {
    /// Writes `snapshot` to the backup target.
    fn write(&self, snapshot: CoordinatorSnapshot) -> SnapshotFuture<'_>;
}

/// State a backup cycle captures.
pub trait SnapshotSource: Send + Sync {
    /// Captures the current state.
    fn capture(&self) -> CoordinatorSnapshot;
}

impl<V: VendorVerifier> SnapshotSource for Coordinator<V> {
    fn capture(&self) -> CoordinatorSnapshot {
        self.snapshot()
    }
}

/// Handle to the running backup task.
#[derive(Debug)]
pub struct BackupScheduler {
    context: Arc<PlatformContext>,
    cycles: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl BackupScheduler {
    /// Starts the schedule on the current tokio runtime.
    #[must_use]
    pub fn spawn<S, W>(
        context: Arc<PlatformContext>,
        period: BackupPeriod,
        source: Arc<S>,
        snapshotter: Arc<W>,
    ) -> Self
    where
        S: SnapshotSource + ?Sized + 'static,
        W: Snapshotter + ?Sized + 'static,
    {
        let cycles = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(run_cycles(
            Arc::clone(&context),
            period,
            source,
            snapshotter,
            Arc::clone(&cycles),
        ));
        info!(period = ?period.as_duration(), "backup schedule started");
        Self {
            context,
            cycles,
            task,
        }
    }

    /// Cycles finished so far, successful or not.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Waits for an in-flight cycle, then keeps the backup lock so that no
    /// further cycle can start, and stops the task.
    pub async fn shutdown(self) {
        self.context.halt_backups().await;
        self.task.abort();
        info!(cycles = self.cycles(), "backup schedule stopped");
    }
}

async fn run_cycles<S, W>(
    context: Arc<PlatformContext>,
    period: BackupPeriod,
    source: Arc<S>,
    snapshotter: Arc<W>,
    cycles: Arc<AtomicU64>,
) where
    S: SnapshotSource + ?Sized,
    W: Snapshotter + ?Sized,
{
    let lock = context.backup_lock();
    loop {
        {
            let _cycle = lock.lock().await;
            let snapshot = source.capture();
            let sessions = snapshot.sessions.len();
            match snapshotter.write(snapshot).await {
                Ok(()) => debug!(sessions, "backup cycle completed"),
                Err(err) => warn!(error = %err, "backup cycle failed"),
            }
            cycles.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(period.as_duration()).await;
    }
}
