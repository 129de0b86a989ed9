//! Local filesystem snapshot store.
//!
//! Writes go to a temporary sibling file which is then renamed over the
//! snapshot, so a crash mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::{SNAPSHOT_FILE, SnapshotStore};

/// Snapshot stored as a JSON file on local disk.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    path: PathBuf,
}

impl LocalSnapshotStore {
    /// Store `targets.json` inside the given directory.
    pub fn in_dir(root_dir: impl AsRef<Path>) -> Self {
        Self::new(root_dir.as_ref().join(SNAPSHOT_FILE))
    }

    /// Store the snapshot at an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn load(&self) -> Result<Snapshot> {
        match self.read_bytes().await? {
            Some(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                log::info!(
                    "Loaded snapshot with {} plugins and {} themes",
                    snapshot.plugins.len(),
                    snapshot.themes.len()
                );
                Ok(snapshot)
            }
            None => {
                log::warn!("No {} found, starting from an empty snapshot", SNAPSHOT_FILE);
                Ok(Snapshot::default())
            }
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.write_bytes(&bytes).await?;
        log::info!(
            "Saved snapshot ({} entries) to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}
