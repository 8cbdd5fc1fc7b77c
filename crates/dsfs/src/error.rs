//! Errors returned by filesystem operations and their `std::io` mapping.

use dsfs_store::StoreError;
use std::io::ErrorKind;
use thiserror::Error;

/// Failure of a filesystem or handle operation. Variants that name a path
/// carry the operation that failed (`open`, `mkdir`, ...) alongside it.
#[derive(Debug, Error)]
pub enum FsError {
    /// No record exists at the path.
    #[error("{op} {path}: file does not exist")]
    NotFound {
        /// Failing operation.
        op: &'static str,
        /// Normalized path.
        path: String,
    },

    /// A record already exists where a new one was required.
    #[error("{op} {path}: file already exists")]
    AlreadyExists {
        /// Failing operation.
        op: &'static str,
        /// Normalized path.
        path: String,
    },

    /// The path, or one of its ancestors, is a file where a directory was
    /// expected.
    #[error("{op} {path}: not a directory")]
    NotADirectory {
        /// Failing operation.
        op: &'static str,
        /// Offending path.
        path: String,
    },

    /// The handle was closed.
    #[error("file is closed")]
    Closed,

    /// A cursor or size does not fit the payload's address range.
    #[error("out of range")]
    OutOfRange,

    /// Nothing left to read or list.
    #[error("end of stream")]
    EndOfStream,

    /// Write through a handle opened read-only.
    #[error("{path}: handle is read-only")]
    ReadOnly {
        /// Path the handle is open on.
        path: String,
    },

    /// The payload could not be grown to the requested length.
    #[error("{path}: file too large")]
    TooLarge {
        /// Path of the record being grown.
        path: String,
    },

    /// Operation has no backing in the store.
    #[error("{op}: not implemented")]
    NotImplemented {
        /// Unsupported operation.
        op: &'static str,
    },

    /// The datastore failed.
    #[error("{op} {path}: {source}")]
    Io {
        /// Failing operation.
        op: &'static str,
        /// Path being operated on.
        path: String,
        /// Backend error.
        #[source]
        source: StoreError,
    },
}

/// Result alias for filesystem operations.
pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// Shorthand for [`FsError::NotFound`].
    pub fn not_found(op: &'static str, path: impl Into<String>) -> Self {
        FsError::NotFound {
            op,
            path: path.into(),
        }
    }

    /// Returns a closure that wraps a backend error with the failing
    /// operation and path, for use with `map_err`.
    pub fn io<'a>(op: &'static str, path: &'a str) -> impl FnOnce(StoreError) -> FsError + 'a {
        move |source| FsError::Io {
            op,
            path: path.to_string(),
            source,
        }
    }

    /// Whether this is [`FsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }

    /// The closest `std::io::ErrorKind`.
    pub fn to_io_kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound { .. } => ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FsError::NotADirectory { .. } => ErrorKind::InvalidInput,
            FsError::Closed => ErrorKind::BrokenPipe,
            FsError::OutOfRange => ErrorKind::InvalidInput,
            FsError::EndOfStream => ErrorKind::UnexpectedEof,
            FsError::ReadOnly { .. } => ErrorKind::PermissionDenied,
            FsError::TooLarge { .. } => ErrorKind::OutOfMemory,
            FsError::NotImplemented { .. } => ErrorKind::Unsupported,
            FsError::Io {
                source: StoreError::Io(e),
                ..
            } => e.kind(),
            FsError::Io { .. } => ErrorKind::Other,
        }
    }
}

impl From<FsError> for std::io::Error {
    fn from(err: FsError) -> Self {
        std::io::Error::new(err.to_io_kind(), err)
    }
}
