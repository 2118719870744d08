//! Per-process upload counters.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

const MIB: f64 = 1_048_576.0;

/// Counts uploaded files and bytes for the lifetime of the process.
///
/// Each counter is updated atomically on its own. A reader may observe the
/// file count and byte total from different moments.
#[derive(Debug, Default)]
pub struct UsageWatcher {
    files: AtomicU64,
    bytes: AtomicU64,
}

impl UsageWatcher {
    /// Creates a watcher with both counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            files: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Records one uploaded file of `size_bytes`.
    pub fn record_upload(&self, size_bytes: u64) {
        let files = self.files.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.bytes.fetch_add(size_bytes, Ordering::Relaxed);
        trace!(files, size_bytes, "upload recorded");
    }

    /// Files uploaded so far.
    #[must_use]
    pub fn files_uploaded(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    /// Bytes uploaded so far.
    #[must_use]
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Mean upload size in MiB, or `0.0` before the first upload.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::float_arithmetic,
        reason = "the average is a reporting figure; sub-byte precision is irrelevant"
    )]
    pub fn average_file_size_mib(&self) -> f64 {
        let files = self.files_uploaded();
        if files == 0 {
            return 0.0;
        }
        self.bytes_uploaded() as f64 / files as f64 / MIB
    }
}
