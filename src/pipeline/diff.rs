//! Diff calculation between the stored snapshot and the current catalog.
//!
//! Each in-scope entry is classified as new, updated, or unchanged. Entries
//! that only exist in the snapshot produce no action; they are simply not
//! carried into the next snapshot.

use serde::Serialize;

use crate::models::{CatalogEntry, EntryKind, EntryMap, Snapshot};

/// What to do with one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum MirrorAction {
    /// Never mirrored before: provision a repository, then publish
    Create { kind: EntryKind, entry: CatalogEntry },
    /// Mirrored at a different version: publish into the existing repository
    Update {
        kind: EntryKind,
        entry: CatalogEntry,
        previous_version: String,
    },
    /// Already mirrored at this version
    Skip { kind: EntryKind, entry: CatalogEntry },
}

impl MirrorAction {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Create { kind, .. } | Self::Update { kind, .. } | Self::Skip { kind, .. } => *kind,
        }
    }

    pub fn entry(&self) -> &CatalogEntry {
        match self {
            Self::Create { entry, .. } | Self::Update { entry, .. } | Self::Skip { entry, .. } => {
                entry
            }
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }

    /// Destination repository name, e.g. `plugins-akismet`.
    pub fn repo_name(&self) -> String {
        self.kind().repo_name(&self.entry().slug)
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Create { kind, entry } => {
                format!("create {}/{} @ {}", kind, entry.slug, entry.version)
            }
            Self::Update {
                kind,
                entry,
                previous_version,
            } => format!(
                "update {}/{} {} -> {}",
                kind, entry.slug, previous_version, entry.version
            ),
            Self::Skip { kind, entry } => {
                format!("skip {}/{} @ {}", kind, entry.slug, entry.version)
            }
        }
    }
}

/// Classified entries for one kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResult {
    /// One action per current entry, in slug order
    pub actions: Vec<MirrorAction>,
    /// Slugs tracked before but absent now
    pub dropped: Vec<String>,
}

impl DiffResult {
    /// Check if anything needs mirroring.
    pub fn has_changes(&self) -> bool {
        self.actions.iter().any(|a| !a.is_skip())
    }

    pub fn created(&self) -> usize {
        self.count(|a| matches!(a, MirrorAction::Create { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|a| matches!(a, MirrorAction::Update { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(MirrorAction::is_skip)
    }

    /// Actions that require mirroring.
    pub fn pending(&self) -> impl Iterator<Item = &MirrorAction> {
        self.actions.iter().filter(|a| !a.is_skip())
    }

    fn count(&self, pred: impl Fn(&MirrorAction) -> bool) -> usize {
        self.actions.iter().filter(|&a| pred(a)).count()
    }
}

/// Classify every entry of `current` against `previous`.
pub fn calculate_diff(kind: EntryKind, previous: &EntryMap, current: &EntryMap) -> DiffResult {
    let actions = current
        .values()
        .map(|entry| match previous.get(&entry.slug) {
            None => MirrorAction::Create {
                kind,
                entry: entry.clone(),
            },
            Some(old) if old.version != entry.version => MirrorAction::Update {
                kind,
                entry: entry.clone(),
                previous_version: old.version.clone(),
            },
            Some(_) => MirrorAction::Skip {
                kind,
                entry: entry.clone(),
            },
        })
        .collect();

    let dropped = previous
        .keys()
        .filter(|slug| !current.contains_key(*slug))
        .cloned()
        .collect();

    DiffResult { actions, dropped }
}

/// Diff one kind of a snapshot against its current catalog.
pub fn diff_snapshot(snapshot: &Snapshot, kind: EntryKind, current: &EntryMap) -> DiffResult {
    calculate_diff(kind, snapshot.entries(kind), current)
}
