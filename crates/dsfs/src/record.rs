//! Records: the persisted form of one file or directory.
//!
//! A record is stored as one entity whose key name is the full path. The
//! property names below are the on-store layout and must not change, or
//! existing data becomes unreadable.

use dsfs_store::{Entity, Timestamp, Value};
use parking_lot::{Mutex, MutexGuard};

use crate::info::FileInfo;
use crate::path;
use crate::types::FileMode;

/// Mode bits.
pub const PROP_MODE: &str = "mode";
/// Directory flag.
pub const PROP_DIR: &str = "dir";
/// Parent directory path; the only property queries filter on.
pub const PROP_PARENT: &str = "parent";
/// Payload encoding tag.
pub const PROP_FORMAT: &str = "format";
/// Payload length as of the last close.
pub const PROP_SIZE: &str = "size";
/// Payload bytes.
pub const PROP_DATA: &str = "data";
/// Last modification time.
pub const PROP_MOD_TIME: &str = "mod_time";

/// Mutable state of a record, guarded by the record's lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordData {
    /// Full normalized path; the store key, never stored as a property.
    pub path: String,
    /// Path of the containing directory.
    pub parent: String,
    /// Whether this record is a directory.
    pub is_dir: bool,
    /// Opaque mode bits.
    pub mode: FileMode,
    /// Encoding tag for `data`, passed through untouched.
    pub format: String,
    /// Payload length recorded at the last close.
    pub size: u64,
    /// File content.
    pub data: Vec<u8>,
    /// Last modification time.
    pub mod_time: Timestamp,
}

impl RecordData {
    fn new(path: &str, is_dir: bool, mode: FileMode) -> Self {
        Self {
            path: path.to_string(),
            parent: path::directory_of(path),
            is_dir,
            mode,
            format: String::new(),
            size: 0,
            data: Vec::new(),
            mod_time: Timestamp::now(),
        }
    }

    /// Encodes the record as a store entity.
    pub fn to_entity(&self) -> Entity {
        Entity::new()
            .with(PROP_MODE, i64::from(self.mode.bits()))
            .with(PROP_DIR, self.is_dir)
            .with(PROP_PARENT, self.parent.clone())
            .with(PROP_FORMAT, self.format.clone())
            .with(PROP_SIZE, i64::try_from(self.size).unwrap_or(i64::MAX))
            .with(PROP_DATA, self.data.clone())
            .with(PROP_MOD_TIME, self.mod_time)
    }

    /// Decodes an entity stored under `path`. Missing or mistyped properties
    /// fall back to their zero values, as a document store does for fields
    /// added after the entity was written. The parent is always derived from
    /// `path`.
    pub fn from_entity(path: &str, mut entity: Entity) -> Self {
        let mode = entity
            .get(PROP_MODE)
            .and_then(Value::as_int)
            .and_then(|m| u32::try_from(m).ok())
            .unwrap_or_default();
        let size = entity
            .get(PROP_SIZE)
            .and_then(Value::as_int)
            .and_then(|s| u64::try_from(s).ok())
            .unwrap_or_default();
        Self {
            path: path.to_string(),
            parent: path::directory_of(path),
            is_dir: entity
                .get(PROP_DIR)
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            mode: FileMode::new(mode),
            format: entity
                .get(PROP_FORMAT)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            size,
            data: entity
                .take(PROP_DATA)
                .and_then(Value::into_bytes)
                .unwrap_or_default(),
            mod_time: entity
                .get(PROP_MOD_TIME)
                .and_then(Value::as_time)
                .unwrap_or_default(),
        }
    }

    /// Moves the record to a new path, keeping its identity.
    pub fn rename_to(&mut self, new_path: &str) {
        self.path = new_path.to_string();
        self.parent = path::directory_of(new_path);
    }

    /// Projects the metadata view.
    pub fn info(&self) -> FileInfo {
        FileInfo::from_record(self)
    }
}

/// One file or directory, shared by every handle that has it open.
#[derive(Debug)]
pub struct Record {
    state: Mutex<RecordData>,
}

impl Record {
    /// Creates an empty file record.
    pub fn new_file(path: &str) -> Self {
        Self::from_data(RecordData::new(path, false, FileMode::DEFAULT_FILE))
    }

    /// Creates a directory record with the given mode.
    pub fn new_dir(path: &str, mode: FileMode) -> Self {
        Self::from_data(RecordData::new(path, true, mode))
    }

    /// Wraps existing record state.
    pub fn from_data(data: RecordData) -> Self {
        Self {
            state: Mutex::new(data),
        }
    }

    /// Unwraps the record state.
    pub fn into_data(self) -> RecordData {
        self.state.into_inner()
    }

    /// Acquires the record's exclusive lock.
    pub fn lock(&self) -> MutexGuard<'_, RecordData> {
        self.state.lock()
    }

    /// Current path of the record.
    pub fn path(&self) -> String {
        self.lock().path.clone()
    }

    /// Whether the record is a directory.
    pub fn is_dir(&self) -> bool {
        self.lock().is_dir
    }

    /// Metadata snapshot.
    pub fn info(&self) -> FileInfo {
        self.lock().info()
    }

    /// Encodes the current state as a store entity.
    pub fn to_entity(&self) -> Entity {
        self.lock().to_entity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::DIRECTORY_SIZE;

    #[test]
    fn test_new_file_defaults() {
        let record = Record::new_file("/a/b.txt");
        let data = record.lock();
        assert_eq!(data.parent, "/a");
        assert!(!data.is_dir);
        assert!(data.data.is_empty());
        assert_eq!(data.mode, FileMode::DEFAULT_FILE);
    }

    #[test]
    fn test_new_dir() {
        let record = Record::new_dir("/a", FileMode::new(0o700));
        assert!(record.is_dir());
        assert_eq!(record.lock().parent, "/");
        assert_eq!(record.info().size(), DIRECTORY_SIZE);
    }

    #[test]
    fn test_entity_layout() {
        let record = Record::new_file("/x");
        record.lock().data = b"hello".to_vec();
        record.lock().size = 5;
        record.lock().format = "raw".to_string();
        let entity = record.to_entity();

        assert_eq!(entity.get(PROP_PARENT).and_then(Value::as_str), Some("/"));
        assert_eq!(entity.get(PROP_DIR).and_then(Value::as_bool), Some(false));
        assert_eq!(entity.get(PROP_SIZE).and_then(Value::as_int), Some(5));
        assert_eq!(entity.get(PROP_FORMAT).and_then(Value::as_str), Some("raw"));
        assert_eq!(
            entity.get(PROP_MODE).and_then(Value::as_int),
            Some(i64::from(FileMode::DEFAULT_FILE.bits()))
        );
        assert!(entity.get(PROP_MOD_TIME).and_then(Value::as_time).is_some());
        assert!(entity.get("path").is_none());
    }

    #[test]
    fn test_entity_decode_restores_state() {
        let original = Record::new_dir("/d", FileMode::new(0o040711));
        original.lock().format = "gzip".to_string();
        let decoded = RecordData::from_entity("/d", original.to_entity());
        assert_eq!(decoded, *original.lock());
    }

    #[test]
    fn test_entity_decode_tolerates_missing_properties() {
        let decoded = RecordData::from_entity("/a/b", Entity::new());
        assert_eq!(decoded.parent, "/a");
        assert!(!decoded.is_dir);
        assert!(decoded.data.is_empty());
        assert_eq!(decoded.mod_time, Timestamp::EPOCH);
    }

    #[test]
    fn test_rename_rewrites_parent() {
        let record = Record::new_file("/a/x");
        record.lock().rename_to("/b/c/y");
        let data = record.lock();
        assert_eq!(data.path, "/b/c/y");
        assert_eq!(data.parent, "/b/c");
    }

    #[test]
    fn test_info_reports_live_length() {
        let record = Record::new_file("/f");
        record.lock().data.extend_from_slice(b"abc");
        let info = record.info();
        assert_eq!(info.name(), "f");
        assert_eq!(info.size(), 3);
        assert!(!info.is_dir());
    }
}
