//! In-memory document store with optional snapshot persistence.
//!
//! Entities live in a `BTreeMap` keyed by [`Key`], so key-ordered queries are
//! plain range scans. Transactions hold the write lock for their whole
//! duration and stage writes in an overlay that is applied only on commit.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::kvstore::{check_batch, Datastore, Transaction};
use crate::query::{Query, QueryIter, QueryResult};
use crate::types::{Entity, Key};

#[derive(Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<(Key, Entity)>,
}

/// In-memory store backed by a BTreeMap. Thread-safe via RwLock.
///
/// When opened with [`MemoryDatastore::open`], [`MemoryDatastore::flush`]
/// writes a bincode snapshot that the next `open` reloads.
pub struct MemoryDatastore {
    data: RwLock<BTreeMap<Key, Entity>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryDatastore {
    /// Creates a new empty, purely in-memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            snapshot_path: None,
        }
    }

    /// Opens a snapshot-backed store, loading `path` if it exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut data = BTreeMap::new();
        if path.exists() {
            let bytes = fs::read(&path)?;
            let snapshot: Snapshot =
                bincode::deserialize(&bytes).map_err(|e| StoreError::Encoding(e.to_string()))?;
            data.extend(snapshot.entries);
            tracing::debug!(path = %path.display(), entities = data.len(), "loaded snapshot");
        }
        Ok(Self {
            data: RwLock::new(data),
            snapshot_path: Some(path),
        })
    }

    /// Writes the current contents to the snapshot file. A no-op for stores
    /// created with [`MemoryDatastore::new`].
    pub fn flush(&self) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = {
            let data = self.data.read();
            Snapshot {
                entries: data.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            }
        };
        let bytes =
            bincode::serialize(&snapshot).map_err(|e| StoreError::Encoding(e.to_string()))?;

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(
            path = %path.display(),
            entities = snapshot.entries.len(),
            "flushed snapshot"
        );
        Ok(())
    }

    /// Number of stored entities across all namespaces and kinds.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns every stored key in order.
    pub fn keys(&self) -> Vec<Key> {
        self.data.read().keys().cloned().collect()
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryTransaction<'a> {
    base: &'a BTreeMap<Key, Entity>,
    writes: BTreeMap<Key, Option<Entity>>,
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&mut self, key: &Key) -> StoreResult<Option<Entity>> {
        match self.writes.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.base.get(key).cloned()),
        }
    }

    fn put(&mut self, key: Key, entity: Entity) -> StoreResult<()> {
        self.writes.insert(key, Some(entity));
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> StoreResult<()> {
        self.writes.insert(key.clone(), None);
        Ok(())
    }
}

impl Datastore for MemoryDatastore {
    fn get(&self, key: &Key) -> StoreResult<Option<Entity>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: Key, entity: Entity) -> StoreResult<Key> {
        self.data.write().insert(key.clone(), entity);
        Ok(key)
    }

    fn put_multi(&self, keys: Vec<Key>, entities: Vec<Entity>) -> StoreResult<Vec<Key>> {
        check_batch(&keys, &entities)?;
        let mut data = self.data.write();
        for (key, entity) in keys.iter().cloned().zip(entities) {
            data.insert(key, entity);
        }
        Ok(keys)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn delete_multi(&self, keys: &[Key]) -> StoreResult<()> {
        let mut data = self.data.write();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }

    fn run(&self, query: &Query) -> StoreResult<QueryIter<'_>> {
        let data = self.data.read();
        let start = Key::new(
            query.namespace.clone(),
            query.kind.clone(),
            query.start_after.clone().unwrap_or_default(),
        );
        let lower = match query.start_after {
            Some(_) => Bound::Excluded(start),
            None => Bound::Included(start),
        };
        let results: Vec<QueryResult> = data
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| query.selects_key(key))
            .filter(|(_, entity)| query.matches(entity))
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(key, entity)| QueryResult {
                key: key.clone(),
                entity: (!query.keys_only).then(|| entity.clone()),
            })
            .collect();
        Ok(Box::new(results.into_iter().map(Ok)))
    }

    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut data = self.data.write();
        let writes = {
            let mut txn = MemoryTransaction {
                base: &data,
                writes: BTreeMap::new(),
            };
            if let Err(e) = f(&mut txn) {
                tracing::debug!(error = %e, staged = txn.writes.len(), "transaction rolled back");
                return Err(e);
            }
            txn.writes
        };
        for (key, staged) in writes {
            match staged {
                Some(entity) => {
                    data.insert(key, entity);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterOp;

    fn key(name: &str) -> Key {
        Key::new("", "file", name)
    }

    fn child_of(parent: &str) -> Entity {
        Entity::new().with("parent", parent)
    }

    #[test]
    fn test_put_get() {
        let store = MemoryDatastore::new();
        store.put(key("/a"), child_of("/")).unwrap();
        assert_eq!(store.get(&key("/a")).unwrap(), Some(child_of("/")));
        assert_eq!(store.get(&key("/b")).unwrap(), None);
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let store = MemoryDatastore::new();
        store.delete(&key("/missing")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_multi_and_get_multi() {
        let store = MemoryDatastore::new();
        let keys = vec![key("/a"), key("/a/b")];
        let stored = store
            .put_multi(keys.clone(), vec![child_of("/"), child_of("/a")])
            .unwrap();
        assert_eq!(stored, keys);

        let got = store.get_multi(&[key("/a/b"), key("/zz"), key("/a")]).unwrap();
        assert_eq!(got, vec![Some(child_of("/a")), None, Some(child_of("/"))]);
    }

    #[test]
    fn test_put_multi_mismatch() {
        let store = MemoryDatastore::new();
        let result = store.put_multi(vec![key("/a")], vec![]);
        assert!(matches!(result, Err(StoreError::BatchMismatch { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_multi() {
        let store = MemoryDatastore::new();
        store.put(key("/a"), child_of("/")).unwrap();
        store.put(key("/b"), child_of("/")).unwrap();
        store.put(key("/c"), child_of("/")).unwrap();
        store.delete_multi(&[key("/a"), key("/c")]).unwrap();
        assert_eq!(store.keys(), vec![key("/b")]);
    }

    #[test]
    fn test_query_orders_by_key_and_filters() {
        let store = MemoryDatastore::new();
        store.put(key("/d/c"), child_of("/d")).unwrap();
        store.put(key("/d/a"), child_of("/d")).unwrap();
        store.put(key("/e/x"), child_of("/e")).unwrap();
        store.put(key("/d/b"), child_of("/d")).unwrap();

        let query = Query::new("file").filter("parent", FilterOp::Eq, "/d");
        let names: Vec<String> = store
            .run(&query)
            .unwrap()
            .map(|r| r.unwrap().key.name)
            .collect();
        assert_eq!(names, vec!["/d/a", "/d/b", "/d/c"]);
    }

    #[test]
    fn test_query_offset_limit() {
        let store = MemoryDatastore::new();
        for name in ["/d/a", "/d/b", "/d/c"] {
            store.put(key(name), child_of("/d")).unwrap();
        }
        let query = Query::new("file")
            .filter("parent", FilterOp::Eq, "/d")
            .offset(1)
            .limit(1);
        let results: Vec<QueryResult> = store.run(&query).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key.name(), "/d/b");
        assert!(results[0].entity.is_some());
    }

    #[test]
    fn test_query_start_after_applies_before_offset() {
        let store = MemoryDatastore::new();
        store.put(key("/"), child_of("/")).unwrap();
        for name in ["/a", "/b", "/c"] {
            store.put(key(name), child_of("/")).unwrap();
        }
        let page = |offset| -> Vec<String> {
            let query = Query::new("file")
                .filter("parent", FilterOp::Eq, "/")
                .start_after("/")
                .offset(offset)
                .limit(1);
            store
                .run(&query)
                .unwrap()
                .map(|r| r.unwrap().key.name)
                .collect()
        };
        assert_eq!(page(0), vec!["/a"]);
        assert_eq!(page(1), vec!["/b"]);
        assert_eq!(page(2), vec!["/c"]);
        assert!(page(3).is_empty());
    }

    #[test]
    fn test_query_keys_only() {
        let store = MemoryDatastore::new();
        store.put(key("/a"), child_of("/")).unwrap();
        let query = Query::new("file").keys_only();
        let results: Vec<QueryResult> = store.run(&query).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].entity.is_none());
    }

    #[test]
    fn test_query_respects_namespace_and_kind() {
        let store = MemoryDatastore::new();
        store.put(Key::new("", "file", "/a"), child_of("/")).unwrap();
        store.put(Key::new("other", "file", "/b"), child_of("/")).unwrap();
        store.put(Key::new("", "thing", "/c"), child_of("/")).unwrap();

        let query = Query::new("file").filter("parent", FilterOp::Eq, "/");
        let names: Vec<String> = store
            .run(&query)
            .unwrap()
            .map(|r| r.unwrap().key.name)
            .collect();
        assert_eq!(names, vec!["/a"]);

        let query = Query::new("file").namespace("other");
        assert_eq!(store.run(&query).unwrap().count(), 1);
    }

    #[test]
    fn test_transaction_commit() {
        let store = MemoryDatastore::new();
        store.put(key("/old"), child_of("/")).unwrap();

        store
            .run_in_transaction(&mut |txn: &mut dyn Transaction| {
                let entity = txn.get(&key("/old"))?.unwrap_or_default();
                txn.put(key("/new"), entity)?;
                txn.delete(&key("/old"))
            })
            .unwrap();

        assert_eq!(store.keys(), vec![key("/new")]);
    }

    #[test]
    fn test_transaction_sees_own_writes() {
        let store = MemoryDatastore::new();
        store
            .run_in_transaction(&mut |txn: &mut dyn Transaction| {
                txn.put(key("/a"), child_of("/"))?;
                assert!(txn.get(&key("/a"))?.is_some());
                txn.delete(&key("/a"))?;
                assert!(txn.get(&key("/a"))?.is_none());
                Ok(())
            })
            .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_transaction_rollback_discards_writes() {
        let store = MemoryDatastore::new();
        store.put(key("/old"), child_of("/")).unwrap();

        let result = store.run_in_transaction(&mut |txn: &mut dyn Transaction| {
            txn.put(key("/new"), child_of("/"))?;
            txn.delete(&key("/old"))?;
            Err(StoreError::Backend("injected".to_string()))
        });

        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(store.keys(), vec![key("/old")]);
    }

    #[test]
    fn test_flush_without_snapshot_path_is_noop() {
        let store = MemoryDatastore::new();
        store.put(key("/a"), child_of("/")).unwrap();
        store.flush().unwrap();
    }
}
