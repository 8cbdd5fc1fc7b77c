#![warn(missing_docs)]

//! DSFS filesystem subsystem: a hierarchical filesystem emulated on a flat,
//! key-ordered document store, with shared file handles and a record cache.

pub mod cli;
pub mod config;
pub mod error;
pub mod file;
pub mod filesystem;
pub mod info;
pub mod path;
pub mod record;
pub mod record_store;
pub mod types;

pub use config::FsConfig;
pub use error::{FsError, Result};
pub use file::File;
pub use filesystem::{FileSystem, DEFAULT_KIND, NAME};
pub use info::{FileInfo, DIRECTORY_SIZE};
pub use record::{Record, RecordData};
pub use record_store::RecordStore;
pub use types::{FileMode, OpenFlags, Whence};
