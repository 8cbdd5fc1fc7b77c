//! Hierarchical filesystem facade over a flat [`Datastore`].
//!
//! Every path argument is normalized before use, so `a/b`, `/a//b/` and
//! `/a/./c/../b` all address the same record.

use std::sync::Arc;
use std::time::SystemTime;

use dsfs_store::Datastore;

use crate::config::FsConfig;
use crate::error::{FsError, Result};
use crate::file::File;
use crate::info::FileInfo;
use crate::path;
use crate::record::Record;
use crate::record_store::RecordStore;
use crate::types::{FileMode, OpenFlags, Whence};

/// Name reported by [`FileSystem::name`].
pub const NAME: &str = "Datastore Fs";

/// Entity kind used when none is configured.
pub const DEFAULT_KIND: &str = "file";

/// Filesystem operations over one namespace/kind partition of a store.
#[derive(Clone)]
pub struct FileSystem {
    records: Arc<RecordStore>,
}

impl FileSystem {
    /// Creates a filesystem over `store`. An empty `kind` selects
    /// [`DEFAULT_KIND`].
    pub fn new(store: Arc<dyn Datastore>, namespace: &str, kind: &str) -> Self {
        let kind = if kind.is_empty() { DEFAULT_KIND } else { kind };
        tracing::debug!(namespace, kind, "filesystem created");
        Self {
            records: Arc::new(RecordStore::new(store, namespace, kind)),
        }
    }

    /// Creates a filesystem using the namespace and kind from `config`.
    pub fn from_config(store: Arc<dyn Datastore>, config: &FsConfig) -> Self {
        Self::new(store, &config.namespace, &config.kind)
    }

    /// Name of this filesystem implementation.
    pub fn name(&self) -> &'static str {
        NAME
    }

    /// The record cache backing this filesystem.
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    fn handle(&self, record: Arc<Record>, read_only: bool) -> File {
        File::new(record, self.records.clone(), read_only)
    }

    /// Creates an empty file, creating missing parent directories, and
    /// returns a writable handle. An existing file is replaced.
    pub fn create(&self, name: &str) -> Result<File> {
        let path = path::normalize(name);
        tracing::debug!(path = %path, "create");
        if path::is_root(&path) {
            return Err(FsError::AlreadyExists { op: "create", path });
        }

        let record = self.create_record(&path, FileMode::DEFAULT_FILE)?;
        Ok(self.handle(record, false))
    }

    fn create_record(&self, path: &str, mode: FileMode) -> Result<Arc<Record>> {
        self.mkdir_all(&path::directory_of(path), FileMode::DEFAULT_DIR)?;

        let record = Record::new_file(path);
        record.lock().mode = mode;
        self.records.create(record)
    }

    /// Creates one directory. The parent is not required to exist.
    pub fn mkdir(&self, name: &str, mode: FileMode) -> Result<()> {
        let path = path::normalize(name);
        tracing::debug!(path = %path, mode = %mode, "mkdir");
        if self.records.find(&path)?.is_some() {
            return Err(FsError::AlreadyExists { op: "mkdir", path });
        }

        match self.records.create_new(Record::new_dir(&path, mode))? {
            Some(_) => Ok(()),
            None => Err(FsError::AlreadyExists { op: "mkdir", path }),
        }
    }

    /// Creates a directory and every missing ancestor, all with `mode`,
    /// in one batch write. An existing directory is left untouched.
    pub fn mkdir_all(&self, name: &str, mode: FileMode) -> Result<()> {
        let path = path::normalize(name);
        tracing::debug!(path = %path, mode = %mode, "mkdir_all");
        if path::is_root(&path) {
            return Ok(());
        }
        if let Some(existing) = self.records.find(&path)? {
            if existing.is_dir() {
                return Ok(());
            }
            return Err(FsError::NotADirectory { op: "mkdir", path });
        }

        let mut missing = vec![path.clone()];
        let mut candidate = path::directory_of(&path);
        while candidate.len() > 1 {
            match self.records.find(&candidate)? {
                Some(parent) if parent.is_dir() => break,
                Some(_) => {
                    return Err(FsError::NotADirectory {
                        op: "mkdir",
                        path: candidate,
                    })
                }
                None => {
                    let next = path::directory_of(&candidate);
                    missing.push(candidate);
                    candidate = next;
                }
            }
        }

        let batch = missing
            .iter()
            .rev()
            .map(|dir| Record::new_dir(dir, mode))
            .collect();
        let created = self.records.create_missing(batch)?;
        tracing::debug!(path = %path, created, "directories created");
        Ok(())
    }

    /// Opens an existing file or directory read-only.
    pub fn open(&self, name: &str) -> Result<File> {
        let path = path::normalize(name);
        tracing::debug!(path = %path, "open");
        let record = self.records.load(&path)?;
        Ok(self.handle(record, true))
    }

    /// Opens a file with explicit flags.
    ///
    /// With `CREATE`, a missing file is created with `mode`; adding
    /// `EXCLUSIVE` makes an existing file an error. `APPEND` places the
    /// cursor at the end. `TRUNCATE` empties the file, but only when the
    /// access mode allows writing.
    pub fn open_file(&self, name: &str, flags: OpenFlags, mode: FileMode) -> Result<File> {
        let path = path::normalize(name);
        tracing::debug!(path = %path, flags = flags.bits(), mode = %mode, "open_file");

        let mut file = match self.records.find(&path)? {
            Some(_) if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) => {
                return Err(FsError::AlreadyExists { op: "open", path });
            }
            Some(record) => self.handle(record, flags.is_read_only()),
            None if flags.contains(OpenFlags::CREATE) => {
                let record = self.create_record(&path, mode)?;
                self.handle(record, flags.is_read_only())
            }
            None => return Err(FsError::not_found("open", path)),
        };

        if flags.contains(OpenFlags::APPEND) {
            file.seek(0, Whence::End);
        }
        if flags.contains(OpenFlags::TRUNCATE) && flags.is_writable() {
            file.truncate(0)?;
        }
        Ok(file)
    }

    /// Removes one record. A non-empty directory loses only its own
    /// record; its children stay in the store.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = path::normalize(name);
        tracing::debug!(path = %path, "remove");
        self.records.load(&path)?;
        self.records.delete(&path)
    }

    /// Removes a record and everything beneath it.
    pub fn remove_all(&self, name: &str) -> Result<()> {
        let path = path::normalize(name);
        tracing::debug!(path = %path, "remove_all");
        self.records.load(&path)?;
        self.records.delete_subtree(&path)?;
        Ok(())
    }

    /// Atomically moves a record. Only the record itself moves; children of
    /// a renamed directory keep their old paths.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let old_path = path::normalize(old_name);
        let new_path = path::normalize(new_name);
        tracing::debug!(old_path = %old_path, new_path = %new_path, "rename");
        if old_path == new_path {
            return Ok(());
        }
        self.records.rename_record(&old_path, &new_path)
    }

    /// Returns metadata for `name`.
    pub fn stat(&self, name: &str) -> Result<FileInfo> {
        let path = path::normalize(name);
        tracing::debug!(path = %path, "stat");
        match self.records.load(&path) {
            Ok(record) => Ok(record.info()),
            Err(FsError::NotFound { path, .. }) => Err(FsError::not_found("stat", path)),
            Err(e) => Err(e),
        }
    }

    /// Not supported.
    pub fn chmod(&self, name: &str, mode: FileMode) -> Result<()> {
        tracing::debug!(path = name, mode = %mode, "chmod");
        Err(FsError::NotImplemented { op: "chmod" })
    }

    /// Not supported.
    pub fn chtimes(&self, name: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        tracing::debug!(path = name, ?atime, ?mtime, "chtimes");
        Err(FsError::NotImplemented { op: "chtimes" })
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("namespace", &self.records.namespace())
            .field("kind", &self.records.kind())
            .finish()
    }
}
