//! Error types.
//!
//! Two families: [`FetchError`] never leaves a refresh (it is logged and the
//! store keeps its previous contents), while [`FsError`] is what a
//! filesystem request sees and maps directly onto an errno.

use std::os::raw::c_int;

use thiserror::Error;

/// Failure to obtain or parse a feed during refresh.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or client-side HTTP failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The body was neither a valid RSS channel nor a valid Atom feed.
    #[error("not an RSS or Atom document: {0}")]
    Parse(String),
}

/// Errors surfaced to filesystem callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FsError {
    /// Wrong suffix or unknown item name.
    #[error("no such entry: {0}")]
    NotFound(String),

    /// Negative read offset.
    #[error("invalid read offset: {0}")]
    InvalidArgument(i64),

    /// Directory operation on a file.
    #[error("not a directory")]
    NotADirectory,

    /// File operation on the directory.
    #[error("is a directory")]
    IsADirectory,

    /// Open for writing.
    #[error("filesystem is read-only")]
    ReadOnly,
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// The errno reported to the kernel.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::ReadOnly => libc::EROFS,
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;
