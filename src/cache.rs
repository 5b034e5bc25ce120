//! Cache partitions for the read API.
//!
//! The server holds one [`CatalogSnapshot`] under the `projects` partition.
//! Readers share it through an `Arc`; an invalidation drops it and the next
//! read rebuilds it from the records directory. The rebuild runs under the
//! write lock, so a reader sees either the old snapshot or the new one.

use fossradar_core::models::SearchIndexEntry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::store::RecordStore;

/// Partition holding the record store and search index.
pub const PROJECTS_PARTITION: &str = "projects";

/// Something that can drop cached data by partition name.
pub trait Invalidator: Send + Sync {
    fn invalidate(&self, partition: &str);
}

/// Records and the search index built from them, loaded together.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub store: RecordStore,
    pub index: Vec<SearchIndexEntry>,
}

impl CatalogSnapshot {
    pub fn load(records_dir: &Path) -> anyhow::Result<Self> {
        let store = RecordStore::load_all(records_dir)?;
        let index = store.search_index();
        Ok(Self { store, index })
    }
}

pub struct CatalogCache {
    records_dir: PathBuf,
    current: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl CatalogCache {
    pub fn new(records_dir: &Path) -> Self {
        Self {
            records_dir: records_dir.to_path_buf(),
            current: RwLock::new(None),
        }
    }

    /// The current snapshot, loading it first if the partition is empty.
    pub fn snapshot(&self) -> anyhow::Result<Arc<CatalogSnapshot>> {
        if let Some(snap) = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(snap));
        }

        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(snap) = slot.as_ref() {
            return Ok(Arc::clone(snap));
        }
        let snap = Arc::new(CatalogSnapshot::load(&self.records_dir)?);
        info!(
            records = snap.store.len(),
            rejected = snap.store.rejected().len(),
            "catalog loaded"
        );
        *slot = Some(Arc::clone(&snap));
        Ok(snap)
    }

    #[cfg(test)]
    fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Invalidator for CatalogCache {
    fn invalidate(&self, partition: &str) {
        if partition != PROJECTS_PARTITION {
            debug!(partition, "ignoring unknown cache partition");
            return;
        }
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        info!(partition, "cache partition invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn record(slug: &str) -> String {
        format!(
            r#"slug = "{slug}"
name = "{slug}"
short_desc = "about {slug}"
repo = "https://github.com/example/{slug}"
license = "MIT"
location_city = "Jaipur"
location_indian_state = "Rajasthan"
added_at = "2024-02-02"
"#
        )
    }

    #[test]
    fn test_snapshot_is_shared_until_invalidated() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("one.toml"), record("one")).unwrap();
        let cache = CatalogCache::new(tmp.path());
        assert!(!cache.is_loaded());

        let first = cache.snapshot().unwrap();
        assert_eq!(first.store.len(), 1);
        assert_eq!(first.index.len(), 1);

        fs::write(tmp.path().join("two.toml"), record("two")).unwrap();
        let again = cache.snapshot().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.store.len(), 1);

        cache.invalidate(PROJECTS_PARTITION);
        assert!(!cache.is_loaded());
        let rebuilt = cache.snapshot().unwrap();
        assert_eq!(rebuilt.store.len(), 2);
        // Readers holding the old snapshot keep a consistent view.
        assert_eq!(first.store.len(), 1);
    }

    #[test]
    fn test_unknown_partition_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("one.toml"), record("one")).unwrap();
        let cache = CatalogCache::new(tmp.path());
        cache.snapshot().unwrap();
        cache.invalidate("sessions");
        assert!(cache.is_loaded());
    }

    #[test]
    fn test_missing_directory_reported_on_read() {
        let tmp = TempDir::new().unwrap();
        let cache = CatalogCache::new(&tmp.path().join("nope"));
        assert!(cache.snapshot().is_err());
        assert!(!cache.is_loaded());
    }
}
