// src/models/snapshot.rs

//! Snapshot of the last successfully mirrored version per entry.
//!
//! Serialized as `targets.json`:
//!
//! ```text
//! {
//!   "plugins": { "<slug>": { "slug": ..., "version": ..., ... } },
//!   "themes":  { "<slug>": { ... } }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CatalogEntry, EntryKind};

/// Entries of a single kind, keyed by slug.
pub type EntryMap = BTreeMap<String, CatalogEntry>;

/// Durable record of what has been mirrored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub plugins: EntryMap,

    #[serde(default)]
    pub themes: EntryMap,
}

impl Snapshot {
    /// Entries of the given kind.
    pub fn entries(&self, kind: EntryKind) -> &EntryMap {
        match kind {
            EntryKind::Plugin => &self.plugins,
            EntryKind::Theme => &self.themes,
        }
    }

    /// Mutable entries of the given kind.
    pub fn entries_mut(&mut self, kind: EntryKind) -> &mut EntryMap {
        match kind {
            EntryKind::Plugin => &mut self.plugins,
            EntryKind::Theme => &mut self.themes,
        }
    }

    pub fn get(&self, kind: EntryKind, slug: &str) -> Option<&CatalogEntry> {
        self.entries(kind).get(slug)
    }

    /// Record an entry, replacing any previous version.
    pub fn insert(&mut self, kind: EntryKind, entry: CatalogEntry) {
        self.entries_mut(kind).insert(entry.slug.clone(), entry);
    }

    /// Replace all entries of a kind at once.
    pub fn set_entries(&mut self, kind: EntryKind, entries: EntryMap) {
        *self.entries_mut(kind) = entries;
    }

    /// Total tracked entries across both kinds.
    pub fn len(&self) -> usize {
        self.plugins.len() + self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
