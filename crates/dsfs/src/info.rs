//! Read-only metadata projection returned by `stat` and directory listings.

use dsfs_store::Timestamp;

use crate::path;
use crate::record::RecordData;
use crate::types::FileMode;

/// Size reported for every directory, whatever bytes its record holds.
pub const DIRECTORY_SIZE: u64 = 42;

/// Snapshot of a record's metadata at the time it was taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    name: String,
    size: u64,
    mode: FileMode,
    mod_time: Timestamp,
    is_dir: bool,
}

impl FileInfo {
    /// Projects a record. Files report their live payload length.
    pub fn from_record(record: &RecordData) -> Self {
        let size = if record.is_dir {
            DIRECTORY_SIZE
        } else {
            record.data.len() as u64
        };
        Self {
            name: path::base_name(&record.path).to_string(),
            size,
            mode: record.mode,
            mod_time: record.mod_time,
            is_dir: record.is_dir,
        }
    }

    /// Base name of the entry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in bytes, or [`DIRECTORY_SIZE`] for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stored mode bits.
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Last modification time.
    pub fn mod_time(&self) -> Timestamp {
        self.mod_time
    }

    /// Whether the entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }
}
