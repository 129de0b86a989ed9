//! Pipeline stages for a mirror run.
//!
//! - `filter`: Scope the catalog by popularity
//! - `diff`: Classify entries against the snapshot
//! - `mirror`: Replicate one entry into its repository
//! - `sync`: Drive a whole run

pub mod diff;
pub mod filter;
pub mod mirror;
pub mod sync;

pub use diff::{DiffResult, MirrorAction, calculate_diff, diff_snapshot};
pub use filter::filter_catalog;
pub use mirror::{MirrorExecutor, MirrorOutcome, MirrorReport};
pub use sync::{KindPlan, SyncContext, SyncOptions, SyncPlan, plan, run_sync};
