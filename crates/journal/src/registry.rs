//! Path-keyed registry of persistent stores.
//!
//! Guarantees at most one live `PersistentStore` per path string. Paths are
//! compared verbatim: `/var/spool/x` and `/var/spool/x/` (or a symlink to the
//! same directory) map to distinct stores.
//!
//! The lock only guards the lookup/insert decision. Opening a new store probes
//! the filesystem, so that happens outside the lock; if two callers race to
//! open the same new path, the first insert wins and the other instance is
//! dropped before anyone sees it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::error::Result;
use crate::store::PersistentStore;

static GLOBAL: OnceLock<StoreRegistry> = OnceLock::new();

/// Deduplicates `PersistentStore` instances by path.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<String, Arc<PersistentStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, created on first use and never torn down.
    ///
    /// Prefer passing an explicit registry from the composition root; this
    /// exists for callers that need one shared instance without wiring.
    pub fn global() -> &'static StoreRegistry {
        GLOBAL.get_or_init(StoreRegistry::new)
    }

    /// Return the store bound to `path`, opening it on first use.
    ///
    /// Failed opens are not remembered: a later call for the same path tries
    /// again.
    pub fn get_instance(&self, path: &str) -> Result<Arc<PersistentStore>> {
        if let Some(store) = self.stores.lock().get(path) {
            return Ok(Arc::clone(store));
        }

        let opened = Arc::new(PersistentStore::new(path)?);

        let mut stores = self.stores.lock();
        let store = stores
            .entry(path.to_string())
            .or_insert_with(|| {
                tracing::info!(path = %path, "Registered persistent store");
                opened
            });
        Ok(Arc::clone(store))
    }

    /// Number of registered stores.
    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JournalError;
    use crate::store::RecordStore;

    #[test]
    fn test_get_instance_returns_same_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        let registry = StoreRegistry::new();

        let first = registry.get_instance(path).unwrap();
        let second = registry.get_instance(path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_instance_invalid_path_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("later");
        let path = missing.to_str().unwrap();
        let registry = StoreRegistry::new();

        for _ in 0..2 {
            let err = registry.get_instance(path).unwrap_err();
            assert!(matches!(err, JournalError::StorageUnavailable { .. }));
        }
        assert!(registry.is_empty());

        // Once the directory shows up the same path succeeds.
        std::fs::create_dir(&missing).unwrap();
        let store = registry.get_instance(path).unwrap();
        assert_eq!(store.root(), missing.as_path());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_instance_empty_path_fails() {
        let registry = StoreRegistry::new();
        let err = registry.get_instance("").unwrap_err();
        assert!(matches!(err, JournalError::StorageUnavailable { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_paths_compared_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().to_str().unwrap().to_string();
        let trailing = format!("{plain}/");
        let registry = StoreRegistry::new();

        let a = registry.get_instance(&plain).unwrap();
        let b = registry.get_instance(&trailing).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);

        // Both still see the same directory contents.
        a.set("shared", Some(b"x")).unwrap();
        assert_eq!(b.get("shared").unwrap(), b"x");
    }

    #[test]
    fn test_separate_registries_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        let a = StoreRegistry::new().get_instance(path).unwrap();
        let b = StoreRegistry::new().get_instance(path).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_global_registry_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        let a = StoreRegistry::global().get_instance(path).unwrap();
        let b = StoreRegistry::global().get_instance(path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(std::ptr::eq(StoreRegistry::global(), StoreRegistry::global()));
    }
}
