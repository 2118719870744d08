//! Snapshot target writing JSON files into a directory.

use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::info;

use super::{BackupError, SnapshotFuture, Snapshotter};
use crate::coordinator::CoordinatorSnapshot;

/// Writes each snapshot to `<dir>/backup-<unix millis>.json`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirectorySnapshotter {
    dir: Utf8PathBuf,
}

impl DirectorySnapshotter {
    /// Creates a snapshotter writing into `dir`, created on first use.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory receiving snapshots.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }
}

impl Snapshotter for DirectorySnapshotter {
    fn write(&self, snapshot: CoordinatorSnapshot) -> SnapshotFuture<'_> {
        Box::pin(async move {
            let dir = self.dir.clone();
            let path = tokio::task::spawn_blocking(move || write_snapshot(&dir, &snapshot))
                .await
                .map_err(|err| BackupError::Snapshot {
                    message: err.to_string(),
                })??;
            info!(%path, "backup written");
            Ok(())
        })
    }
}

fn write_snapshot(
    dir: &Utf8Path,
    snapshot: &CoordinatorSnapshot,
) -> Result<Utf8PathBuf, BackupError> {
    Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(|err| BackupError::Io {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })?;
    let handle =
        Dir::open_ambient_dir(dir, ambient_authority()).map_err(|err| BackupError::Io {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;

    let rendered = serde_json::to_vec_pretty(snapshot).map_err(|err| BackupError::Snapshot {
        message: err.to_string(),
    })?;
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let file_name = format!("backup-{stamp}.json");
    let path = dir.join(&file_name);

    handle
        .write(&file_name, rendered)
        .map_err(|err| BackupError::Io {
            path: path.clone(),
            message: err.to_string(),
        })?;
    Ok(path)
}
