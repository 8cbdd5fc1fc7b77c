//! Small value types shared by the filesystem facade and file handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission and type bits of a record. The filesystem stores and returns
/// these verbatim; only [`FileMode::DIR`] is ever interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMode(u32);

impl FileMode {
    /// Directory type bit (S_IFDIR).
    pub const DIR: FileMode = FileMode(0o040000);
    /// Regular file type bit (S_IFREG).
    pub const REGULAR: FileMode = FileMode(0o100000);
    /// Mask of the permission bits.
    pub const PERM_MASK: u32 = 0o7777;

    /// Mode given to files created without an explicit mode.
    pub const DEFAULT_FILE: FileMode = FileMode(0o100644);
    /// Mode given to directories created implicitly as parents.
    pub const DEFAULT_DIR: FileMode = FileMode(0o040755);

    /// Wraps raw mode bits.
    pub const fn new(bits: u32) -> Self {
        FileMode(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns only the permission bits.
    pub const fn perm(self) -> u32 {
        self.0 & Self::PERM_MASK
    }

    /// Returns true if the directory type bit is set.
    pub const fn is_dir(self) -> bool {
        self.0 & Self::DIR.0 != 0
    }
}

impl From<u32> for FileMode {
    fn from(bits: u32) -> Self {
        FileMode(bits)
    }
}

impl std::ops::BitOr for FileMode {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        FileMode(self.0 | rhs.0)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

/// Flags for [`FileSystem::open_file`](crate::FileSystem::open_file).
///
/// The two low bits select the access mode; the remaining bits are
/// independent modifiers. Values follow the Linux `open(2)` layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// Read-only access (the zero access mode).
    pub const READ_ONLY: OpenFlags = OpenFlags(0o0);
    /// Write-only access.
    pub const WRITE_ONLY: OpenFlags = OpenFlags(0o1);
    /// Read-write access.
    pub const READ_WRITE: OpenFlags = OpenFlags(0o2);
    /// Create the file if it does not exist.
    pub const CREATE: OpenFlags = OpenFlags(0o100);
    /// With `CREATE`, fail if the file already exists.
    pub const EXCLUSIVE: OpenFlags = OpenFlags(0o200);
    /// Truncate to zero length on open (write modes only).
    pub const TRUNCATE: OpenFlags = OpenFlags(0o1000);
    /// Position the cursor at the end of the file on open.
    pub const APPEND: OpenFlags = OpenFlags(0o2000);

    const ACCESS_MASK: u32 = 0o3;

    /// Wraps raw flag bits.
    pub const fn from_bits(bits: u32) -> Self {
        OpenFlags(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every modifier bit of `other` is set. Access modes
    /// are compared with [`OpenFlags::is_read_only`] and
    /// [`OpenFlags::is_writable`] instead.
    pub fn contains(&self, other: OpenFlags) -> bool {
        let bits = other.0 & !Self::ACCESS_MASK;
        bits != 0 && self.0 & bits == bits
    }

    /// Returns true if the access mode is read-only.
    pub fn is_read_only(&self) -> bool {
        self.0 & Self::ACCESS_MASK == Self::READ_ONLY.0
    }

    /// Returns true if the access mode permits writing.
    pub fn is_writable(&self) -> bool {
        let access = self.0 & Self::ACCESS_MASK;
        access == Self::WRITE_ONLY.0 || access == Self::READ_WRITE.0
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        OpenFlags(self.0 | rhs.0)
    }
}

/// Reference point for [`File::seek`](crate::File::seek).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Whence {
    /// Relative to the start of the payload.
    Start,
    /// Relative to the current cursor.
    Current,
    /// Relative to the end of the payload.
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bits() {
        assert!(FileMode::DEFAULT_DIR.is_dir());
        assert!(!FileMode::DEFAULT_FILE.is_dir());
        assert_eq!(FileMode::DEFAULT_FILE.perm(), 0o644);
        assert_eq!((FileMode::DIR | FileMode::new(0o700)).bits(), 0o040700);
        assert_eq!(FileMode::new(0o755).to_string(), "755");
    }

    #[test]
    fn test_access_modes() {
        assert!(OpenFlags::READ_ONLY.is_read_only());
        assert!(!OpenFlags::READ_ONLY.is_writable());
        assert!(OpenFlags::WRITE_ONLY.is_writable());
        assert!(OpenFlags::READ_WRITE.is_writable());
        assert!(!(OpenFlags::READ_WRITE | OpenFlags::CREATE).is_read_only());
        assert!((OpenFlags::READ_ONLY | OpenFlags::CREATE).is_read_only());
    }

    #[test]
    fn test_contains_modifiers() {
        let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE;
        assert!(flags.contains(OpenFlags::CREATE));
        assert!(flags.contains(OpenFlags::TRUNCATE));
        assert!(flags.contains(OpenFlags::CREATE | OpenFlags::TRUNCATE));
        assert!(!flags.contains(OpenFlags::APPEND));
        assert!(!flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE));
        assert!(!flags.contains(OpenFlags::READ_WRITE));
    }
}
