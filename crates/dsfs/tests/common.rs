//! Shared fixtures: filesystems over a fresh store and a store wrapper that
//! fails selected operations on demand.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dsfs::FileSystem;
use dsfs_store::{
    Datastore, Entity, Key, MemoryDatastore, Query, QueryIter, StoreError, StoreResult,
    Transaction,
};

/// A filesystem over an empty in-memory store, plus the store itself.
pub fn new_fs() -> (Arc<MemoryDatastore>, FileSystem) {
    let store = Arc::new(MemoryDatastore::new());
    let fs = FileSystem::new(store.clone(), "", "");
    (store, fs)
}

/// Writes `data` to a new file at `path` and closes it.
pub fn write_file(fs: &FileSystem, path: &str, data: &[u8]) {
    let mut file = fs.create(path).unwrap();
    file.write(data).unwrap();
    file.close().unwrap();
}

/// Reads the whole payload at `path`.
pub fn read_file(fs: &FileSystem, path: &str) -> Vec<u8> {
    use std::io::Read;
    let mut file = fs.open(path).unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}

/// Store names of every stored key, in order.
pub fn stored_paths(store: &MemoryDatastore) -> Vec<String> {
    store.keys().into_iter().map(|k| k.name).collect()
}

/// Delegates to a [`MemoryDatastore`] but returns a backend error from the
/// operations whose switch is on.
#[derive(Default)]
pub struct FaultyDatastore {
    pub inner: MemoryDatastore,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_query: AtomicBool,
    pub fail_commit: AtomicBool,
}

impl FaultyDatastore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn check(flag: &AtomicBool, op: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("injected {} failure", op)));
        }
        Ok(())
    }
}

impl Datastore for FaultyDatastore {
    fn get(&self, key: &Key) -> StoreResult<Option<Entity>> {
        Self::check(&self.fail_get, "get")?;
        self.inner.get(key)
    }

    fn put(&self, key: Key, entity: Entity) -> StoreResult<Key> {
        Self::check(&self.fail_put, "put")?;
        self.inner.put(key, entity)
    }

    fn put_multi(&self, keys: Vec<Key>, entities: Vec<Entity>) -> StoreResult<Vec<Key>> {
        Self::check(&self.fail_put, "put")?;
        self.inner.put_multi(keys, entities)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(key)
    }

    fn delete_multi(&self, keys: &[Key]) -> StoreResult<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete_multi(keys)
    }

    fn run(&self, query: &Query) -> StoreResult<QueryIter<'_>> {
        Self::check(&self.fail_query, "query")?;
        self.inner.run(query)
    }

    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let fail_commit = &self.fail_commit;
        self.inner.run_in_transaction(&mut |txn: &mut dyn Transaction| {
            f(txn)?;
            Self::check(fail_commit, "commit")
        })
    }
}
