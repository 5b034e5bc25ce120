//! Export the search index as JSON.
//!
//! Produces `index.json`: one [`SearchIndexEntry`] per valid record, in name
//! order. The file is regenerated wholesale on each run and is what browser
//! clients load to search the catalog without a server round-trip.

use anyhow::{Context, Result};
use fossradar_core::models::SearchIndexEntry;
use std::path::Path;
use tracing::warn;

use crate::store::RecordStore;

/// Indexes above this size slow down first page load noticeably.
pub const INDEX_SIZE_WARNING_BYTES: usize = 300 * 1024;

pub fn render_index(entries: &[SearchIndexEntry]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(entries)?;
    json.push('\n');
    Ok(json)
}

/// Write the index for `store` to `path`, returning the number of entries.
pub fn write_search_index(store: &RecordStore, path: &Path) -> Result<usize> {
    let entries = store.search_index();
    let json = render_index(&entries)?;

    if json.len() > INDEX_SIZE_WARNING_BYTES {
        warn!(
            bytes = json.len(),
            limit = INDEX_SIZE_WARNING_BYTES,
            "search index is larger than recommended"
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write index: {}", path.display()))?;
    Ok(entries.len())
}

/// Export to `output`, or to stdout for piping when `None`.
pub fn run_export(store: &RecordStore, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let count = write_search_index(store, path)?;
            eprintln!("Exported {} projects to {}", count, path.display());
        }
        None => {
            print!("{}", render_index(&store.search_index())?);
        }
    }
    Ok(())
}
