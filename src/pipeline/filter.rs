//! Popularity scoping of a fetched catalog.

use crate::models::{CatalogEntry, EntryMap};

/// Keep entries with at least `min_active_installs`, keyed by slug.
pub fn filter_catalog(entries: Vec<CatalogEntry>, min_active_installs: u64) -> EntryMap {
    entries
        .into_iter()
        .filter(|e| e.active_installs >= min_active_installs)
        .map(|e| (e.slug.clone(), e))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::entry;

    #[test]
    fn test_threshold_is_inclusive() {
        let entries = vec![entry("below", "1.0", 999), entry("at", "1.0", 1000)];
        let filtered = filter_catalog(entries, 1000);

        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("at"));
        assert!(!filtered.contains_key("below"));
    }

    #[test]
    fn test_zero_threshold_keeps_everything() {
        let entries = vec![entry("a", "1", 0), entry("b", "1", 12)];
        assert_eq!(filter_catalog(entries, 0).len(), 2);
    }

    #[test]
    fn test_empty_catalog() {
        assert!(filter_catalog(Vec::new(), 1000).is_empty());
    }
}
