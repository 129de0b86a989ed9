//! Snapshot persistence.
//!
//! The snapshot is the only state kept between runs. It is read once at
//! startup and written once after every mirror action has been attempted.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml     # Mirror configuration
//! ├── semgrep.yml     # CI workflow template
//! └── targets.json    # Snapshot of mirrored versions
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Snapshot;

// Re-export for convenience
pub use local::LocalSnapshotStore;

/// File name of the persisted snapshot.
pub const SNAPSHOT_FILE: &str = "targets.json";

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot, or an empty one if none was ever saved.
    async fn load(&self) -> Result<Snapshot>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}
