// src/models/mod.rs

//! Domain models for the mirror application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod entry;
mod snapshot;
mod summary;

// Re-export all public types
pub use config::{CatalogConfig, Config, Credentials, FilterConfig, MirrorConfig};
pub use entry::{CatalogEntry, EntryKind};
pub use snapshot::{EntryMap, Snapshot};
pub use summary::{ActionFailure, KindSummary, RunSummary};
