//! Error types for backing-store operations.
//!
//! [`HostError`] is the single error type returned by all [`Host`](crate::Host)
//! methods and by [`TreePath`](crate::TreePath) validation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`Host`](crate::Host) operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// A file the operation needed was not present in the store.
    #[error("not found: {path}")]
    NotFound {
        /// The normalized path that was missing.
        path: String,
    },

    /// A rename target is already occupied.
    #[error("already exists: {path}")]
    AlreadyExists {
        /// The normalized path that was occupied.
        path: String,
    },

    /// A path string could not be normalized into a [`TreePath`](crate::TreePath).
    #[error("invalid path `{value}`: {reason}")]
    InvalidPath {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// The on-disk root of an [`FsHost`](crate::FsHost) is unusable.
    #[error("invalid host root {}: {reason}", root.display())]
    InvalidRoot {
        /// The directory the host was opened on.
        root: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// An I/O error occurred in the underlying store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
