//! Concurrency and aging behaviour of the persistent store and registry.
//!
//! Uses real directories from `tempfile` and real wall-clock sleeps, so the
//! expiry test takes a little over a second.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tattler_journal::{PersistentStore, RecordStore, StoreRegistry};

#[test]
fn test_clear_expired_between_two_batches() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new();
    let store = registry.get_instance(dir.path().to_str().unwrap()).unwrap();

    let nitems = 20;
    for i in 0..nitems {
        store.set(&i.to_string(), Some(b"1st")).unwrap();
    }
    assert_eq!(store.len(), nitems);

    // Nothing is old enough yet.
    store.clear_expired(Duration::from_secs(2)).unwrap();
    assert_eq!(store.len(), nitems);

    thread::sleep(Duration::from_millis(1100));
    for i in nitems..2 * nitems {
        store.set(&i.to_string(), Some(b"2nd")).unwrap();
    }
    assert_eq!(store.len(), 2 * nitems);

    let removed = store.clear_expired(Duration::from_secs(1)).unwrap();
    assert_eq!(removed, nitems);
    assert_eq!(store.len(), nitems);

    let remaining: HashSet<String> = store.list().unwrap().into_iter().collect();
    let expected: HashSet<String> = (nitems..2 * nitems).map(|i| i.to_string()).collect();
    assert_eq!(remaining, expected);
    for key in &remaining {
        assert_eq!(store.get(key).unwrap(), b"2nd");
    }
}

#[test]
fn test_concurrent_get_instance_yields_one_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_str().unwrap().to_string();
    let registry = StoreRegistry::new();

    let stores: Vec<Arc<PersistentStore>> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| s.spawn(|| registry.get_instance(&path).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(registry.len(), 1);
    let canonical = registry.get_instance(&path).unwrap();
    for store in &stores {
        assert!(Arc::ptr_eq(store, &canonical));
    }
    // Losing constructions must not leave probe files behind.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_concurrent_writers_never_tear_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentStore::new(dir.path()).unwrap();

    let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![b'a' + i; 64 * 1024]).collect();

    thread::scope(|s| {
        for payload in &payloads {
            let store = &store;
            s.spawn(move || {
                for _ in 0..20 {
                    store.set("shared", Some(payload.as_slice())).unwrap();
                }
            });
        }
        s.spawn(|| {
            for _ in 0..200 {
                if let Some(seen) = store.get("shared") {
                    assert!(payloads.contains(&seen), "observed a torn record");
                }
            }
        });
    });

    let last = store.get("shared").unwrap();
    assert!(payloads.contains(&last));
    assert_eq!(store.list().unwrap(), vec!["shared".to_string()]);
}

#[test]
fn test_concurrent_unset_removes_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentStore::new(dir.path()).unwrap();
    store.set("once", Some(b"x")).unwrap();

    let removals: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| store.unset("once"))).collect();
        handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum()
    });

    assert_eq!(removals, 1);
    assert!(store.is_empty());
}

#[test]
fn test_clear_after_mixed_content() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new();
    let store = registry.get_instance(dir.path().to_str().unwrap()).unwrap();

    store.set("1700000000_deadbeef_url", Some(b"http://localhost/")).unwrap();
    store.set("1700000000_deadbeef_body", Some(b"{}")).unwrap();
    std::fs::create_dir(dir.path().join("stray")).unwrap();

    store.clear().unwrap();
    assert_eq!(store.len(), 0);
    assert!(store.list().unwrap().is_empty());
}
