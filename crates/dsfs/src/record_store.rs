//! Path-keyed record cache over a [`Datastore`].
//!
//! Reads go through the cache to the store on a miss; writes go straight to
//! the store. While a path is cached it maps to exactly one [`Record`]
//! instance, so every handle opened on that path shares the same bytes.
//!
//! Directories are emulated: each record carries its parent path, children
//! are found by an equality query on that property, and subtrees by a range
//! query over it.

use std::collections::HashMap;
use std::sync::Arc;

use dsfs_store::{Datastore, FilterOp, Key, Query, StoreError, Transaction, Value};
use parking_lot::RwLock;

use crate::error::{FsError, Result};
use crate::path;
use crate::record::{Record, RecordData, PROP_PARENT};
use crate::types::FileMode;

/// Cache plus the namespace/kind pair that scopes every key.
pub struct RecordStore {
    store: Arc<dyn Datastore>,
    namespace: String,
    kind: String,
    cache: RwLock<HashMap<String, Arc<Record>>>,
}

impl RecordStore {
    /// Creates an empty cache over `store`.
    pub fn new(store: Arc<dyn Datastore>, namespace: &str, kind: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The namespace records are stored in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The entity kind records are stored as.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    fn key(&self, path: &str) -> Key {
        Key::new(self.namespace.clone(), self.kind.clone(), path)
    }

    /// Returns the cached record for `path`, if any.
    pub fn cached(&self, path: &str) -> Option<Arc<Record>> {
        self.cache.read().get(path).cloned()
    }

    /// Caches `record` under its current path unless the path is already
    /// cached. Returns the instance the cache holds afterwards.
    pub fn insert(&self, record: Arc<Record>) -> Arc<Record> {
        let path = record.path();
        self.cache.write().entry(path).or_insert(record).clone()
    }

    /// Drops `path` from the cache without touching the store.
    pub fn evict(&self, path: &str) -> Option<Arc<Record>> {
        self.cache.write().remove(path)
    }

    /// Number of cached records.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Resolves `path` from the cache, falling back to the store.
    ///
    /// The root always resolves: if no record was ever written for it, a
    /// directory record is synthesized and cached (not persisted).
    pub fn load(&self, path: &str) -> Result<Arc<Record>> {
        self.find(path)?
            .ok_or_else(|| FsError::not_found("open", path))
    }

    /// Like [`RecordStore::load`], but a missing record is `Ok(None)`.
    pub fn find(&self, path: &str) -> Result<Option<Arc<Record>>> {
        if let Some(record) = self.cached(path) {
            return Ok(Some(record));
        }

        let fetched = match self.fetch(path)? {
            Some(data) => Record::from_data(data),
            None if path::is_root(path) => Record::new_dir(path::ROOT, FileMode::DEFAULT_DIR),
            None => return Ok(None),
        };

        // Another caller may have populated the entry while we were reading
        // the store; theirs wins so the path keeps a single instance.
        let mut cache = self.cache.write();
        let record = cache
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(fetched))
            .clone();
        tracing::trace!(path, "cached record");
        Ok(Some(record))
    }

    /// Reads a record straight from the store, bypassing the cache.
    pub fn fetch(&self, path: &str) -> Result<Option<RecordData>> {
        let entity = self
            .store
            .get(&self.key(path))
            .map_err(FsError::io("open", path))?;
        Ok(entity.map(|e| RecordData::from_entity(path, e)))
    }

    /// Upserts one record.
    pub fn save(&self, record: &Record) -> Result<()> {
        self.persist(&record.lock())
    }

    /// Upserts record state whose lock the caller already holds.
    pub fn persist(&self, data: &RecordData) -> Result<()> {
        self.store
            .put(self.key(&data.path), data.to_entity())
            .map_err(FsError::io("save", &data.path))?;
        tracing::trace!(path = %data.path, bytes = data.data.len(), "persisted record");
        Ok(())
    }

    /// Upserts several records in one store call.
    pub fn save_many(&self, records: &[Arc<Record>]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let first_path = first.path();
        let (keys, entities): (Vec<Key>, Vec<_>) = records
            .iter()
            .map(|record| {
                let data = record.lock();
                (self.key(&data.path), data.to_entity())
            })
            .unzip();
        self.store
            .put_multi(keys, entities)
            .map_err(FsError::io("save", &first_path))?;
        Ok(())
    }

    /// Persists `record` and caches it, replacing whatever was stored at its
    /// path. If the path is already cached, the cached instance takes on the
    /// new state instead, so handles already open on it see the
    /// replacement. The cache stays write-locked until the record is cached.
    pub fn create(&self, record: Record) -> Result<Arc<Record>> {
        let data = record.into_data();
        let mut cache = self.cache.write();
        if let Some(existing) = cache.get(&data.path) {
            let mut current = existing.lock();
            self.persist(&data)?;
            *current = data;
            return Ok(existing.clone());
        }
        self.persist(&data)?;
        let record = Arc::new(Record::from_data(data));
        cache.insert(record.path(), record.clone());
        Ok(record)
    }

    /// Persists and caches `record` only if its path is not cached yet.
    /// Returns `None`, writing nothing, when it is.
    pub fn create_new(&self, record: Record) -> Result<Option<Arc<Record>>> {
        let mut cache = self.cache.write();
        let path = record.path();
        if cache.contains_key(&path) {
            return Ok(None);
        }
        self.save(&record)?;
        let record = Arc::new(record);
        cache.insert(path, record.clone());
        Ok(Some(record))
    }

    /// Persists the records whose paths are not cached yet in one store
    /// call, then caches them. Returns how many were written.
    pub fn create_missing(&self, records: Vec<Record>) -> Result<usize> {
        let mut cache = self.cache.write();
        let fresh: Vec<Arc<Record>> = records
            .into_iter()
            .filter(|record| !cache.contains_key(&record.path()))
            .map(Arc::new)
            .collect();
        self.save_many(&fresh)?;
        for record in &fresh {
            cache.insert(record.path(), record.clone());
        }
        Ok(fresh.len())
    }

    /// Removes one record from the cache and the store.
    pub fn delete(&self, path: &str) -> Result<()> {
        self.evict(path);
        self.store
            .delete(&self.key(path))
            .map_err(FsError::io("remove", path))
    }

    /// Lists the records whose parent is exactly `parent`, in key order,
    /// skipping `offset` and returning at most `limit`. The root is never
    /// listed as its own child. Records already cached are returned as the
    /// cached instance so listings reflect unflushed writes.
    pub fn list_children(
        &self,
        parent: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<impl Iterator<Item = Result<Arc<Record>>> + '_> {
        // Every child key extends `parent`, so starting after it drops the
        // root's own entry (parent "/") before offset and limit apply.
        let mut query = Query::new(self.kind.clone())
            .namespace(self.namespace.clone())
            .filter(PROP_PARENT, FilterOp::Eq, parent)
            .start_after(parent)
            .offset(offset);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let parent = parent.to_string();
        let results = self
            .store
            .run(&query)
            .map_err(FsError::io("readdir", &parent))?;

        Ok(results.map(move |result| {
            let result = result.map_err(FsError::io("readdir", &parent))?;
            let name = result.key.name;
            if let Some(cached) = self.cached(&name) {
                return Ok(cached);
            }
            let entity = result.entity.unwrap_or_default();
            Ok(Arc::new(Record::from_data(RecordData::from_entity(
                &name, entity,
            ))))
        }))
    }

    /// Atomically moves the record at `old_path` to `new_path`.
    ///
    /// Inside one store transaction the old entity is read, its parent is
    /// rewritten, it is written under the new key and the old key is
    /// deleted. A missing source aborts with `NotFound` and changes nothing.
    /// The cache is write-locked across the transaction; after commit a
    /// cached instance is re-keyed to the new path so open handles follow
    /// the rename.
    pub fn rename_record(&self, old_path: &str, new_path: &str) -> Result<()> {
        let old_key = self.key(old_path);
        let new_key = self.key(new_path);
        let new_parent = path::directory_of(new_path);
        let mut missing = false;

        let mut cache = self.cache.write();
        self.store
            .run_in_transaction(&mut |txn: &mut dyn Transaction| -> std::result::Result<(), StoreError> {
                missing = false;
                let Some(mut entity) = txn.get(&old_key)? else {
                    missing = true;
                    return Ok(());
                };
                entity.set(PROP_PARENT, Value::from(new_parent.clone()));
                txn.put(new_key.clone(), entity)?;
                txn.delete(&old_key)
            })
            .map_err(FsError::io("rename", old_path))?;

        if missing {
            tracing::warn!(old_path, new_path, "rename source missing");
            return Err(FsError::not_found("rename", old_path));
        }

        cache.remove(new_path);
        if let Some(record) = cache.remove(old_path) {
            record.lock().rename_to(new_path);
            cache.insert(new_path.to_string(), record);
        }
        Ok(())
    }

    /// Deletes `path` and every record whose parent lies in the half-open
    /// range `[path, path + MAX_SUFFIX)`, in one batch. Range hits that are
    /// not actually beneath `path` (a sibling such as `/dir2` when removing
    /// `/dir`) are left alone. Returns the number of keys deleted.
    pub fn delete_subtree(&self, path: &str) -> Result<usize> {
        let query = Query::new(self.kind.clone())
            .namespace(self.namespace.clone())
            .filter(PROP_PARENT, FilterOp::Ge, path)
            .filter(PROP_PARENT, FilterOp::Lt, path::range_end(path))
            .keys_only();

        let mut keys = Vec::new();
        for result in self
            .store
            .run(&query)
            .map_err(FsError::io("removeall", path))?
        {
            let key = result.map_err(FsError::io("removeall", path))?.key;
            if path::is_descendant(key.name(), path) {
                keys.push(key);
            }
        }
        keys.push(self.key(path));

        self.store
            .delete_multi(&keys)
            .map_err(FsError::io("removeall", path))?;

        let mut cache = self.cache.write();
        cache.retain(|cached, _| cached != path && !path::is_descendant(cached, path));
        tracing::debug!(path, deleted = keys.len(), "deleted subtree");
        Ok(keys.len())
    }
}
