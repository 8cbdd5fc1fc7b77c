#![warn(missing_docs)]

//! DSFS storage subsystem: the key-ordered document store contract and an
//! in-memory reference backend with snapshot persistence.

pub mod error;
pub mod kvstore;
pub mod memory;
pub mod query;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use kvstore::{Datastore, Transaction};
pub use memory::MemoryDatastore;
pub use query::{Filter, FilterOp, Query, QueryIter, QueryResult};
pub use types::{Entity, Key, Timestamp, Value};
