//! In-memory [`Host`] used by tests and pure-virtual workflows.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::error::HostError;
use crate::host::{Host, Listing};
use crate::path::TreePath;

/// A [`Host`] backed by a sorted map of path → bytes.
#[derive(Debug, Default)]
pub struct MemoryHost {
    files: RwLock<BTreeMap<TreePath, Vec<u8>>>,
}

impl MemoryHost {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated from `(path, content)` pairs.
    ///
    /// # Errors
    /// Returns [`HostError::InvalidPath`] if any path fails to normalize.
    pub fn with_files<I, P, C>(files: I) -> Result<Self, HostError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let mut map = BTreeMap::new();
        for (path, content) in files {
            map.insert(TreePath::new(path.as_ref())?, content.into());
        }
        Ok(Self {
            files: RwLock::new(map),
        })
    }

    /// Snapshot every file in the store, sorted by path.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<TreePath, Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of files in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the store holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Host for MemoryHost {
    fn read(&self, path: &TreePath) -> Result<Option<Vec<u8>>, HostError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        Ok(files.get(path).cloned())
    }

    fn exists(&self, path: &TreePath) -> Result<bool, HostError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        Ok(files.contains_key(path))
    }

    fn list(&self, dir: &TreePath) -> Result<Listing, HostError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let mut listing = Listing::default();
        for path in files.keys() {
            let Some(rest) = path.strip_prefix(dir) else {
                continue;
            };
            let mut segments = rest.segments();
            let Some(first) = segments.next() else {
                continue;
            };
            if segments.next().is_some() {
                listing.dirs.push(first.to_owned());
            } else {
                listing.files.push(first.to_owned());
            }
        }
        listing.normalize();
        Ok(listing)
    }

    fn write(&self, path: &TreePath, content: &[u8]) -> Result<(), HostError> {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(path.clone(), content.to_vec());
        Ok(())
    }

    fn delete(&self, path: &TreePath) -> Result<(), HostError> {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| HostError::NotFound {
                path: path.to_string(),
            })
    }

    fn rename(&self, from: &TreePath, to: &TreePath) -> Result<(), HostError> {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        if files.contains_key(to) {
            return Err(HostError::AlreadyExists {
                path: to.to_string(),
            });
        }
        let content = files.remove(from).ok_or_else(|| HostError::NotFound {
            path: from.to_string(),
        })?;
        files.insert(to.clone(), content);
        Ok(())
    }
}
