//! The [`Host`] trait: the boundary between arbor trees and real storage.
//!
//! Trees only ever *read* through a host. Writes, deletes and renames are
//! issued exclusively by a commit sink, after the whole action log has been
//! validated.
//!
//! | Group   | Methods                          |
//! |---------|----------------------------------|
//! | Read    | `read`, `exists`, `list`         |
//! | Mutate  | `write`, `delete`, `rename`      |
//!
//! Directories are implicit: a directory exists exactly when some file lives
//! underneath it.

use crate::error::HostError;
use crate::path::TreePath;

/// The immediate children of a directory, each list sorted by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing {
    /// Names of sub-directories (single segments).
    pub dirs: Vec<String>,
    /// Names of files (single segments).
    pub files: Vec<String>,
}

impl Listing {
    /// Returns `true` if the directory has no children at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    /// Sort and de-duplicate both lists.
    pub fn normalize(&mut self) {
        self.dirs.sort();
        self.dirs.dedup();
        self.files.sort();
        self.files.dedup();
    }
}

/// A backing store of files addressed by [`TreePath`].
///
/// # Object safety
///
/// This trait is object-safe. Trees hold an `Arc<dyn Host>` so that every
/// branch of a tree shares one store.
pub trait Host: Send + Sync {
    /// Read a file's bytes, returning `None` if no file exists at `path`.
    fn read(&self, path: &TreePath) -> Result<Option<Vec<u8>>, HostError>;

    /// Returns `true` if a *file* exists at `path`.
    fn exists(&self, path: &TreePath) -> Result<bool, HostError>;

    /// List the immediate children of `dir`.
    ///
    /// A directory that does not exist lists as empty.
    fn list(&self, dir: &TreePath) -> Result<Listing, HostError>;

    /// Create or replace the file at `path`, creating parent directories.
    fn write(&self, path: &TreePath, content: &[u8]) -> Result<(), HostError>;

    /// Delete the file at `path`.
    ///
    /// Returns [`HostError::NotFound`] if there is no such file.
    fn delete(&self, path: &TreePath) -> Result<(), HostError>;

    /// Move the file at `from` to `to`. An existing file at `to` is never
    /// replaced.
    ///
    /// Returns [`HostError::NotFound`] if `from` is missing and
    /// [`HostError::AlreadyExists`] if `to` is occupied.
    fn rename(&self, from: &TreePath, to: &TreePath) -> Result<(), HostError>;
}
