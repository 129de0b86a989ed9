//! Run summary reported at the end of a sync.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::EntryKind;

/// A mirror action that did not complete.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionFailure {
    pub kind: EntryKind,
    pub slug: String,
    pub version: String,
    pub reason: String,
}

/// Counters for one entry kind.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct KindSummary {
    /// Entries returned by the catalog
    pub fetched: usize,
    /// Entries at or above the popularity threshold
    pub in_scope: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the catalog could not be fetched for this kind
    pub catalog_error: Option<String>,
    /// Set when the catalog walk stopped early; unseen entries were kept
    pub partial_fetch: Option<String>,
}

/// Aggregated outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub kinds: BTreeMap<EntryKind, KindSummary>,
    pub failures: Vec<ActionFailure>,
    /// Problem committing or pushing the snapshot file, if any
    pub snapshot_publish_error: Option<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            kinds: BTreeMap::new(),
            failures: Vec::new(),
            snapshot_publish_error: None,
        }
    }

    pub fn kind_mut(&mut self, kind: EntryKind) -> &mut KindSummary {
        self.kinds.entry(kind).or_default()
    }

    pub fn record_failure(&mut self, failure: ActionFailure) {
        self.kind_mut(failure.kind).failed += 1;
        self.failures.push(failure);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Number of failed mirror actions.
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of kinds whose catalog could not be fetched.
    pub fn catalog_error_count(&self) -> usize {
        self.kinds
            .values()
            .filter(|k| k.catalog_error.is_some())
            .count()
    }

    /// Number of kinds whose catalog was only partly fetched.
    pub fn partial_fetch_count(&self) -> usize {
        self.kinds
            .values()
            .filter(|k| k.partial_fetch.is_some())
            .count()
    }

    /// Whether anything went wrong that an operator should look at.
    pub fn is_degraded(&self) -> bool {
        self.failed_count() > 0
            || self.catalog_error_count() > 0
            || self.partial_fetch_count() > 0
            || self.snapshot_publish_error.is_some()
    }

    /// Total successful create/update actions.
    pub fn mirrored_count(&self) -> usize {
        self.kinds.values().map(|k| k.created + k.updated).sum()
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
