//! [`Host`] rooted at an on-disk directory.
//!
//! Writes go through a temporary file in the destination directory followed
//! by a rename, so a crash mid-write never leaves a truncated file behind.
//! Directories are created on demand and pruned when their last file leaves.

use std::fs;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::HostError;
use crate::host::{Host, Listing};
use crate::path::TreePath;

/// A [`Host`] that maps `/a/b` to `<root>/a/b` on disk.
#[derive(Clone, Debug)]
pub struct FsHost {
    root: PathBuf,
}

impl FsHost {
    /// Open a host on an existing directory.
    ///
    /// # Errors
    /// Returns [`HostError::InvalidRoot`] if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, HostError> {
        let root = root.into();
        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => Ok(Self { root }),
            Ok(_) => Err(HostError::InvalidRoot {
                root,
                reason: "not a directory".to_owned(),
            }),
            Err(e) => Err(HostError::InvalidRoot {
                root,
                reason: e.to_string(),
            }),
        }
    }

    /// The on-disk directory this host is rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &TreePath) -> PathBuf {
        self.root.join(path.to_relative())
    }

    /// Remove now-empty directories between `path`'s parent and the root.
    fn prune_empty_parents(&self, path: &TreePath) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                break;
            }
            // remove_dir fails on non-empty directories, which ends the walk.
            if fs::remove_dir(self.resolve(&dir)).is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    fn ensure_parent(&self, path: &TreePath) -> Result<PathBuf, HostError> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(target)
    }
}

fn contains_files(dir: &Path) -> Result<bool, HostError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let kind = entry.file_type()?;
        if kind.is_file() || (kind.is_dir() && contains_files(&entry.path())?) {
            return Ok(true);
        }
    }
    Ok(false)
}

impl Host for FsHost {
    fn read(&self, path: &TreePath) -> Result<Option<Vec<u8>>, HostError> {
        let target = self.resolve(path);
        match fs::read(&target) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            // Reading a directory is "no file here".
            Err(_) if target.is_dir() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &TreePath) -> Result<bool, HostError> {
        match fs::metadata(self.resolve(path)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, dir: &TreePath) -> Result<Listing, HostError> {
        let target = self.resolve(dir);
        let entries = match fs::read_dir(&target) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Listing::default()),
            Err(e) => return Err(e.into()),
        };
        let mut listing = Listing::default();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            let kind = entry.file_type()?;
            if kind.is_file() {
                listing.files.push(name);
            } else if kind.is_dir() && contains_files(&entry.path())? {
                listing.dirs.push(name);
            }
        }
        listing.normalize();
        Ok(listing)
    }

    fn write(&self, path: &TreePath, content: &[u8]) -> Result<(), HostError> {
        let target = self.ensure_parent(path)?;
        let dir = target.parent().unwrap_or(&self.root);
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(content)?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|e| HostError::Io(e.error))?;
        tracing::debug!(path = %path, bytes = content.len(), "host write");
        Ok(())
    }

    fn delete(&self, path: &TreePath) -> Result<(), HostError> {
        match fs::remove_file(self.resolve(path)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(HostError::NotFound {
                    path: path.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
        self.prune_empty_parents(path);
        tracing::debug!(path = %path, "host delete");
        Ok(())
    }

    fn rename(&self, from: &TreePath, to: &TreePath) -> Result<(), HostError> {
        if !self.exists(from)? {
            return Err(HostError::NotFound {
                path: from.to_string(),
            });
        }
        if self.exists(to)? {
            return Err(HostError::AlreadyExists {
                path: to.to_string(),
            });
        }
        let target = self.ensure_parent(to)?;
        fs::rename(self.resolve(from), target)?;
        self.prune_empty_parents(from);
        tracing::debug!(from = %from, to = %to, "host rename");
        Ok(())
    }
}
