//! Integration tests for the reference datastore: snapshot persistence,
//! transactional isolation under concurrent writers, and query invariants.

use std::sync::Arc;
use std::thread;

use dsfs_store::{
    Datastore, Entity, FilterOp, Key, MemoryDatastore, Query, StoreError, Timestamp, Transaction,
    Value,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn key(name: &str) -> Key {
    Key::new("", "file", name)
}

fn record(parent: &str, data: &[u8]) -> Entity {
    Entity::new()
        .with("parent", parent)
        .with("dir", false)
        .with("mode", 0o644i64)
        .with("data", data.to_vec())
        .with("mod_time", Timestamp::now())
}

#[test]
fn test_snapshot_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.bin");

    {
        let store = MemoryDatastore::open(&path).unwrap();
        assert!(store.is_empty());
        store.put(key("/a"), record("/", b"alpha")).unwrap();
        store.put(Key::new("tenant", "file", "/b"), record("/", b"beta")).unwrap();
        store.flush().unwrap();
    }

    let reopened = MemoryDatastore::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    let a = reopened.get(&key("/a")).unwrap().unwrap();
    assert_eq!(
        a.get("data").cloned().and_then(Value::into_bytes),
        Some(b"alpha".to_vec())
    );
    assert!(reopened
        .get(&Key::new("tenant", "file", "/b"))
        .unwrap()
        .is_some());
}

#[test]
fn test_snapshot_named_with_tmp_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.tmp");

    {
        let store = MemoryDatastore::open(&path).unwrap();
        store.put(key("/a"), record("/", b"alpha")).unwrap();
        store.flush().unwrap();
        store.put(key("/b"), record("/", b"beta")).unwrap();
        store.flush().unwrap();
    }

    assert!(path.exists());
    assert!(!dir.path().join("store.tmp.tmp").exists());
    let reopened = MemoryDatastore::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
}

#[test]
fn test_snapshot_corrupt_file_is_encoding_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.bin");
    std::fs::write(&path, [0xffu8; 3]).unwrap();

    match MemoryDatastore::open(&path) {
        Err(StoreError::Encoding(_)) => {}
        Err(other) => panic!("expected Encoding, got {:?}", other),
        Ok(_) => panic!("expected Encoding error"),
    }
}

#[test]
fn test_concurrent_transactions_never_lose_the_record() {
    let store = Arc::new(MemoryDatastore::new());
    store.put(key("/ping"), record("/", b"x")).unwrap();

    // Each thread moves the single record between /ping and /pong. Because
    // every move is a transaction, exactly one of the two keys exists at any
    // point and after all moves.
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    store
                        .run_in_transaction(&mut |txn: &mut dyn Transaction| {
                            let (from, to) = match txn.get(&key("/ping"))? {
                                Some(_) => (key("/ping"), key("/pong")),
                                None => (key("/pong"), key("/ping")),
                            };
                            let Some(entity) = txn.get(&from)? else {
                                return Err(StoreError::Backend("record vanished".into()));
                            };
                            txn.put(to, entity)?;
                            txn.delete(&from)
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 1);
}

#[test]
fn test_descendant_range_query() {
    let store = MemoryDatastore::new();
    store.put(key("/dir"), record("/", b"")).unwrap();
    store.put(key("/dir/a"), record("/dir", b"")).unwrap();
    store.put(key("/dir/b"), record("/dir", b"")).unwrap();
    store.put(key("/dir/b/c"), record("/dir/b", b"")).unwrap();
    store.put(key("/other/z"), record("/other", b"")).unwrap();

    let query = Query::new("file")
        .filter("parent", FilterOp::Ge, "/dir")
        .filter("parent", FilterOp::Lt, "/dir\x7F")
        .keys_only();
    let names: Vec<String> = store
        .run(&query)
        .unwrap()
        .map(|r| r.unwrap().key.name)
        .collect();
    assert_eq!(names, vec!["/dir/a", "/dir/b", "/dir/b/c"]);
}

proptest! {
    /// Paging through a query with any page size visits every match exactly
    /// once and in key order.
    #[test]
    fn test_pagination_is_complete_and_ordered(
        names in proptest::collection::btree_set("[a-z]{1,6}", 0..30),
        page in 1usize..7,
    ) {
        let store = MemoryDatastore::new();
        for name in &names {
            store.put(key(&format!("/d/{}", name)), record("/d", b"")).unwrap();
        }
        store.put(key("/e/noise"), record("/e", b"")).unwrap();

        let mut seen = Vec::new();
        loop {
            let query = Query::new("file")
                .filter("parent", FilterOp::Eq, "/d")
                .offset(seen.len())
                .limit(page);
            let batch: Vec<String> = store
                .run(&query)
                .unwrap()
                .map(|r| r.unwrap().key.name)
                .collect();
            if batch.is_empty() {
                break;
            }
            prop_assert!(batch.len() <= page);
            seen.extend(batch);
        }

        let expected: Vec<String> = names.iter().map(|n| format!("/d/{}", n)).collect();
        prop_assert_eq!(seen, expected);
    }
}
