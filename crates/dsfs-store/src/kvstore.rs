//! Document store contract consumed by the filesystem layer.
//!
//! The contract covers exact-key get/put/delete (single and batched),
//! key-ordered property queries, and closure-scoped transactions.
//! Anything that can provide these primitives can back a filesystem.

use crate::error::{StoreError, StoreResult};
use crate::query::{Query, QueryIter};
use crate::types::{Entity, Key};

/// Transactional view handed to the closure of
/// [`Datastore::run_in_transaction`].
///
/// Reads observe the transaction's own uncommitted writes. Nothing written
/// through a transaction is visible to other callers until it commits.
pub trait Transaction {
    /// Reads an entity. Returns `None` if the key does not exist.
    fn get(&mut self, key: &Key) -> StoreResult<Option<Entity>>;

    /// Stages an upsert.
    fn put(&mut self, key: Key, entity: Entity) -> StoreResult<()>;

    /// Stages a delete. Deleting a missing key is not an error.
    fn delete(&mut self, key: &Key) -> StoreResult<()>;
}

/// Key-ordered document store.
pub trait Datastore: Send + Sync {
    /// Gets an entity by key. Returns `None` if the key doesn't exist.
    fn get(&self, key: &Key) -> StoreResult<Option<Entity>>;

    /// Gets several entities; the result is aligned with `keys`. Fails on the
    /// first lookup error.
    fn get_multi(&self, keys: &[Key]) -> StoreResult<Vec<Option<Entity>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Upserts an entity and returns the key it was stored under.
    fn put(&self, key: Key, entity: Entity) -> StoreResult<Key>;

    /// Upserts several entities. Backends apply the batch atomically where
    /// they can.
    fn put_multi(&self, keys: Vec<Key>, entities: Vec<Entity>) -> StoreResult<Vec<Key>>;

    /// Deletes a key. Returns Ok(()) even if the key didn't exist.
    fn delete(&self, key: &Key) -> StoreResult<()>;

    /// Deletes several keys.
    fn delete_multi(&self, keys: &[Key]) -> StoreResult<()>;

    /// Runs a query and returns its results in key order.
    fn run(&self, query: &Query) -> StoreResult<QueryIter<'_>>;

    /// Runs `f` inside a transaction. Staged writes commit only if `f`
    /// returns `Ok`; otherwise they are discarded and the error is returned.
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> StoreResult<()>,
    ) -> StoreResult<()>;
}

/// Checks that a batch call received one entity per key.
pub fn check_batch(keys: &[Key], entities: &[Entity]) -> StoreResult<()> {
    if keys.len() != entities.len() {
        return Err(StoreError::BatchMismatch {
            keys: keys.len(),
            entities: entities.len(),
        });
    }
    Ok(())
}
