//! Open file handles.
//!
//! A handle owns a cursor and a directory-listing offset; the bytes live in
//! the shared [`Record`]. Every payload access takes the record's lock for
//! the duration of the call only, so handles on the same path interleave at
//! call granularity.

use std::io;
use std::sync::Arc;

use dsfs_store::Timestamp;

use crate::error::{FsError, Result};
use crate::info::FileInfo;
use crate::record::{Record, RecordData};
use crate::record_store::RecordStore;
use crate::types::Whence;

/// An open session on one record.
pub struct File {
    at: i64,
    read_dir_offset: usize,
    closed: bool,
    read_only: bool,
    record: Arc<Record>,
    records: Arc<RecordStore>,
}

impl File {
    pub(crate) fn new(record: Arc<Record>, records: Arc<RecordStore>, read_only: bool) -> Self {
        Self {
            at: 0,
            read_dir_offset: 0,
            closed: false,
            read_only,
            record,
            records,
        }
    }

    /// Reopens the handle: rewinds the cursor and the directory offset.
    pub fn open(&mut self) {
        self.at = 0;
        self.read_dir_offset = 0;
        self.closed = false;
    }

    /// Closes the handle, stamping the modification time and persisting the
    /// record. A closed handle can be reopened with [`File::open`].
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        let mut data = self.record.lock();
        data.mod_time = Timestamp::now();
        data.size = data.data.len() as u64;
        tracing::debug!(path = %data.path, size = data.size, "close");
        self.records.persist(&data)
    }

    /// Full path of the underlying record.
    pub fn name(&self) -> String {
        self.record.path()
    }

    /// Metadata of the underlying record.
    pub fn stat(&self) -> Result<FileInfo> {
        Ok(self.record.info())
    }

    /// Writes are persisted on close; nothing to flush here.
    pub fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Whether the handle rejects writes.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Current cursor position.
    pub fn position(&self) -> i64 {
        self.at
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(FsError::Closed);
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if self.read_only {
            return Err(FsError::ReadOnly { path: self.name() });
        }
        Ok(())
    }

    fn cursor(&self) -> Result<usize> {
        usize::try_from(self.at).map_err(|_| FsError::OutOfRange)
    }

    /// Reads from the cursor into `buf`, returning the number of bytes
    /// copied. Fails with `EndOfStream` when the cursor is at or past the
    /// end and `buf` is non-empty.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_open()?;
        let at = self.cursor()?;
        let data = self.record.lock();
        let len = data.data.len();
        if buf.is_empty() {
            return Ok(0);
        }
        if at >= len {
            return Err(FsError::EndOfStream);
        }
        let n = buf.len().min(len - at);
        buf[..n].copy_from_slice(&data.data[at..at + n]);
        self.at += n as i64;
        tracing::trace!(path = %data.path, offset = at, bytes = n, "read");
        Ok(n)
    }

    /// Seeks to `offset` from the start, then reads.
    pub fn read_at(&mut self, buf: &mut [u8], offset: i64) -> Result<usize> {
        self.seek(offset, Whence::Start);
        self.read(buf)
    }

    /// Writes `buf` at the cursor.
    ///
    /// A cursor beyond the end zero-fills the gap first. Bytes past the
    /// written region are kept. Afterwards the cursor sits at the end of
    /// the payload.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.check_writable()?;
        let at = self.cursor()?;
        let mut data = self.record.lock();
        let end = at.checked_add(buf.len()).ok_or(FsError::OutOfRange)?;
        grow(&mut data, end)?;
        data.data[at..end].copy_from_slice(buf);
        self.at = data.data.len() as i64;
        tracing::trace!(path = %data.path, offset = at, bytes = buf.len(), "write");
        Ok(buf.len())
    }

    /// Seeks to `offset` from the start, then writes.
    pub fn write_at(&mut self, buf: &[u8], offset: i64) -> Result<usize> {
        self.seek(offset, Whence::Start);
        self.write(buf)
    }

    /// Writes the UTF-8 bytes of `s`.
    pub fn write_str(&mut self, s: &str) -> Result<usize> {
        self.write(s.as_bytes())
    }

    /// Resizes the payload to `size` bytes, zero-padding when growing. The
    /// cursor is not moved. Growth the allocator refuses fails with
    /// `TooLarge` and leaves the payload unchanged.
    pub fn truncate(&mut self, size: i64) -> Result<()> {
        self.check_writable()?;
        let size = usize::try_from(size).map_err(|_| FsError::OutOfRange)?;
        let mut data = self.record.lock();
        grow(&mut data, size)?;
        data.data.truncate(size);
        data.mod_time = Timestamp::now();
        tracing::debug!(path = %data.path, size, "truncate");
        Ok(())
    }

    fn resolve(&self, offset: i64, whence: Whence) -> i64 {
        match whence {
            Whence::Start => offset,
            Whence::Current => self.at.saturating_add(offset),
            Whence::End => (self.record.lock().data.len() as i64).saturating_add(offset),
        }
    }

    /// Moves the cursor and returns its new position. Positions are not
    /// validated; a negative cursor makes the next read or write fail with
    /// `OutOfRange`.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> i64 {
        self.at = self.resolve(offset, whence);
        self.at
    }

    /// Returns up to `count` directory entries after those already
    /// returned by this handle; `0` returns all remaining. A positive
    /// `count` with nothing left fails with `EndOfStream`.
    pub fn read_dir(&mut self, count: usize) -> Result<Vec<FileInfo>> {
        self.check_open()?;
        let path = self.name();
        if !self.record.is_dir() {
            return Err(FsError::NotADirectory { op: "readdir", path });
        }

        let limit = (count > 0).then_some(count);
        let entries = self
            .records
            .list_children(&path, self.read_dir_offset, limit)?
            .map(|record| record.map(|r| r.info()))
            .collect::<Result<Vec<_>>>()?;
        self.read_dir_offset += entries.len();
        tracing::debug!(path = %path, offset = self.read_dir_offset, returned = entries.len(), "readdir");

        if count > 0 && entries.is_empty() {
            return Err(FsError::EndOfStream);
        }
        Ok(entries)
    }

    /// Base names of [`File::read_dir`].
    pub fn read_dir_names(&mut self, count: usize) -> Result<Vec<String>> {
        Ok(self
            .read_dir(count)?
            .into_iter()
            .map(|info| info.name().to_string())
            .collect())
    }
}

/// Zero-extends the payload to at least `len` bytes.
fn grow(data: &mut RecordData, len: usize) -> Result<()> {
    let current = data.data.len();
    if current >= len {
        return Ok(());
    }
    data.data
        .try_reserve_exact(len - current)
        .map_err(|_| FsError::TooLarge {
            path: data.path.clone(),
        })?;
    data.data.resize(len, 0);
    Ok(())
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.record.path())
            .field("at", &self.at)
            .field("closed", &self.closed)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl io::Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match File::read(self, buf) {
            Ok(n) => Ok(n),
            Err(FsError::EndOfStream) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl io::Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        File::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync().map_err(io::Error::from)
    }
}

impl io::Seek for File {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(n) => (i64::try_from(n).unwrap_or(i64::MAX), Whence::Start),
            io::SeekFrom::Current(n) => (n, Whence::Current),
            io::SeekFrom::End(n) => (n, Whence::End),
        };
        let target = self.resolve(offset, whence);
        let position = u64::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        self.at = target;
        Ok(position)
    }
}
