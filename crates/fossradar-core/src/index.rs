//! Search index projection.
//!
//! The index is regenerated wholesale from the record store. Entries are
//! sorted by name so the artifact is byte-stable across runs over the same
//! catalog.

use crate::models::{ProjectRecord, SearchIndexEntry};
use crate::search::compare_names;

/// Project every record into a [`SearchIndexEntry`], sorted by name.
pub fn build_search_index(records: &[ProjectRecord]) -> Vec<SearchIndexEntry> {
    let mut index: Vec<SearchIndexEntry> = records.iter().map(SearchIndexEntry::from).collect();
    index.sort_by(|a, b| compare_names(&a.name, &b.name).then_with(|| a.slug.cmp(&b.slug)));
    index
}
