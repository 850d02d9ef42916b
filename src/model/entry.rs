//! Immutable file snapshots handed out by trees.

use std::sync::Arc;

use arbor_host::TreePath;

/// A file's path and the content it had when the entry was taken.
///
/// Content is shared, so cloning an entry never copies bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    path: TreePath,
    content: Arc<[u8]>,
}

impl FileEntry {
    /// Build an entry.
    #[must_use]
    pub const fn new(path: TreePath, content: Arc<[u8]>) -> Self {
        Self { path, content }
    }

    /// The file's path.
    #[must_use]
    pub const fn path(&self) -> &TreePath {
        &self.path
    }

    /// The file's bytes.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// A shared handle to the file's bytes.
    #[must_use]
    pub fn shared_content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }
}
