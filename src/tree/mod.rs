//! Virtual file trees.
//!
//! A [`Tree`] is a staged, branchable view of a file system. Reads fall
//! through to a read-only [`Host`](arbor_host::Host); every mutation is
//! validated immediately and appended to the tree's [`ActionList`].
//!
//! # Object safety
//!
//! `Tree` is object-safe. Views stack as `ScopedTree<FilterTree<HostTree>>`
//! or as `Box<dyn Tree>`, and [`innermost`] walks to the tree that owns the
//! log without runtime type checks.
//!
//! | Group     | Methods                                                           |
//! |-----------|-------------------------------------------------------------------|
//! | Identity  | `kind`, `unwrap_base`, `id`, `ancestry`                           |
//! | Read      | `exists`, `read`, `get`, `list`, `visit`, `read_text`, `read_json` |
//! | Mutate    | `create`, `overwrite`, `delete`, `rename`                         |
//! | Update    | `begin_update`, `commit_update`                                   |
//! | Log/merge | `actions`, `apply`, `branch`, `merge_actions`, `merge`            |
//!
//! Directory helpers and typed JSON reads live on [`TreeExt`].

use std::collections::BTreeSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use arbor_host::{Listing, TreePath};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::error::TreeError;
use crate::model::{Action, ActionList, FileEntry, MergeStrategy};
use crate::update::{UTF8_BOM, UpdateRecorder};

pub mod filter;
pub mod host_tree;
mod merge;
pub mod scoped;

pub use filter::FilterTree;
pub use host_tree::{HostTree, TreeOptions};
pub use scoped::ScopedTree;

// ---------------------------------------------------------------------------
// TreeId / TreeKind
// ---------------------------------------------------------------------------

/// Identity of a tree, allocated by a [`Context`](crate::context::Context).
///
/// Ids carry the allocating context's scope, so trees built from unrelated
/// contexts never compare equal even when their counters line up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TreeId {
    scope: u64,
    raw: u64,
}

impl TreeId {
    /// Wrap a raw id outside any context.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self { scope: 0, raw }
    }

    pub(crate) const fn scoped(scope: u64, raw: u64) -> Self {
        Self { scope, raw }
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.raw
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree#{}", self.raw)
    }
}

/// What a tree is, as reported by [`Tree::kind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TreeKind {
    /// A [`HostTree`]: owns an overlay and an action log.
    Host,
    /// A [`ScopedTree`]: a re-rooted view.
    Scoped,
    /// A [`FilterTree`]: a filtered view.
    Filtered,
}

/// Visitor callback for [`Tree::visit`].
pub type Visitor<'v> = dyn FnMut(&FileEntry) -> ControlFlow<()> + 'v;

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A staged, branchable file tree.
pub trait Tree: Send + Sync {
    // -- identity --

    /// What kind of tree this is.
    fn kind(&self) -> TreeKind;

    /// The tree a view wraps, or `None` for a tree that owns its log.
    fn unwrap_base(&self) -> Option<&dyn Tree>;

    /// The id of the tree that owns the log.
    fn id(&self) -> TreeId;

    /// Ids of every tree this one was branched from.
    fn ancestry(&self) -> &BTreeSet<TreeId>;

    // -- reads --

    /// Returns `true` if a file exists at `path`.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    fn exists(&self, path: &TreePath) -> Result<bool, TreeError>;

    /// The file's content, or `None` if there is no file at `path`.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    fn read(&self, path: &TreePath) -> Result<Option<Arc<[u8]>>, TreeError>;

    /// A snapshot of the file at `path`.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    fn get(&self, path: &TreePath) -> Result<Option<FileEntry>, TreeError> {
        Ok(self
            .read(path)?
            .map(|content| FileEntry::new(path.clone(), content)))
    }

    /// The immediate children of `dir`. Directories with no files list as
    /// absent.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    fn list(&self, dir: &TreePath) -> Result<Listing, TreeError>;

    /// Pre-order walk from `dir`: each directory's files in sorted order,
    /// then its sub-directories in sorted order.
    ///
    /// Returns `Break` if the visitor stopped the walk.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    fn visit(
        &self,
        dir: &TreePath,
        visitor: &mut Visitor<'_>,
    ) -> Result<ControlFlow<()>, TreeError> {
        let listing = self.list(dir)?;
        for name in &listing.files {
            let path = dir.join(name)?;
            if let Some(content) = self.read(&path)?
                && visitor(&FileEntry::new(path, content)).is_break()
            {
                return Ok(ControlFlow::Break(()));
            }
        }
        for name in &listing.dirs {
            if self.visit(&dir.join(name)?, visitor)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// The file decoded as UTF-8, with any leading BOM stripped.
    ///
    /// # Errors
    /// Returns [`TreeError::InvalidUtf8`] if decoding fails.
    fn read_text(&self, path: &TreePath) -> Result<Option<String>, TreeError> {
        let Some(content) = self.read(path)? else {
            return Ok(None);
        };
        let body = content.strip_prefix(UTF8_BOM).unwrap_or(&content[..]);
        String::from_utf8(body.to_vec())
            .map(Some)
            .map_err(|_| TreeError::InvalidUtf8 { path: path.clone() })
    }

    /// The file parsed as JSON.
    ///
    /// # Errors
    /// Returns [`TreeError::InvalidUtf8`] or [`TreeError::InvalidJson`].
    fn read_json(&self, path: &TreePath) -> Result<Option<serde_json::Value>, TreeError> {
        let Some(text) = self.read_text(path)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| TreeError::InvalidJson {
                path: path.clone(),
                source,
            })
    }

    // -- mutations --

    /// Create a new file. Creating a file with identical content is a no-op.
    ///
    /// # Errors
    /// Returns [`TreeError::FileAlreadyExists`] if a different file is there.
    fn create(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError>;

    /// Replace an existing file's content. Identical content is a no-op.
    ///
    /// # Errors
    /// Returns [`TreeError::FileDoesNotExist`] if there is no such file.
    fn overwrite(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError>;

    /// Delete a file.
    ///
    /// # Errors
    /// Returns [`TreeError::FileDoesNotExist`] if there is no such file.
    fn delete(&mut self, path: &TreePath) -> Result<(), TreeError>;

    /// Move a file.
    ///
    /// # Errors
    /// Returns [`TreeError::FileDoesNotExist`] for a missing source and
    /// [`TreeError::FileAlreadyExists`] for an occupied target.
    fn rename(&mut self, from: &TreePath, to: &TreePath) -> Result<(), TreeError>;

    // -- offset-anchored updates --

    /// Open an [`UpdateRecorder`] over the file's current content.
    ///
    /// # Errors
    /// Returns [`TreeError::FileDoesNotExist`] if there is no such file.
    fn begin_update(&self, path: &TreePath) -> Result<UpdateRecorder, TreeError>;

    /// Write a recorder's result back.
    ///
    /// # Errors
    /// Returns [`TreeError::InvalidUpdateRecord`] if the recorder was opened
    /// by an unrelated tree and [`TreeError::ContentMutated`] if the file
    /// changed since it was opened.
    fn commit_update(&mut self, recorder: UpdateRecorder) -> Result<(), TreeError>;

    // -- log and merge --

    /// The tree's action log, in this tree's coordinates.
    fn actions(&self) -> ActionList;

    /// Apply one action with the merge conflict rules of `strategy`.
    ///
    /// # Errors
    /// Returns [`TreeError::MergeConflict`] for conflicts `strategy` does not
    /// tolerate.
    fn apply(&mut self, action: &Action, strategy: MergeStrategy) -> Result<(), TreeError>;

    /// A copy-on-write branch sharing this tree's backing store, with its own
    /// id and this tree in its ancestry.
    fn branch(&self) -> Box<dyn Tree>;

    /// Fold `actions` in, skipping ids this tree already has.
    ///
    /// # Errors
    /// Stops at the first [`TreeError::MergeConflict`]; actions before it
    /// stay applied.
    fn merge_actions(&mut self, actions: &ActionList, strategy: MergeStrategy) -> Result<(), TreeError>;

    /// Fold `source`'s log into this tree.
    ///
    /// Merging a tree into itself does nothing. Merging a branch back into
    /// one of its ancestors also tolerates overwrite conflicts.
    ///
    /// # Errors
    /// Stops at the first [`TreeError::MergeConflict`].
    #[instrument(skip_all, fields(target = %self.id(), source = %source.id()))]
    fn merge(&mut self, source: &dyn Tree, strategy: MergeStrategy) -> Result<(), TreeError> {
        if source.id() == self.id() {
            return Ok(());
        }
        let mut strategy = strategy;
        if source.ancestry().contains(&self.id()) {
            strategy |= MergeStrategy::ALLOW_OVERWRITE_CONFLICT;
        }
        self.merge_actions(&source.actions(), strategy)
    }
}

/// Walk [`Tree::unwrap_base`] to the tree that owns the log.
#[must_use]
pub fn innermost(tree: &dyn Tree) -> &dyn Tree {
    let mut current = tree;
    while let Some(base) = current.unwrap_base() {
        current = base;
    }
    current
}

// ---------------------------------------------------------------------------
// Forwarding impls
// ---------------------------------------------------------------------------

macro_rules! forward_tree {
    () => {
        fn kind(&self) -> TreeKind {
            (**self).kind()
        }
        fn unwrap_base(&self) -> Option<&dyn Tree> {
            (**self).unwrap_base()
        }
        fn id(&self) -> TreeId {
            (**self).id()
        }
        fn ancestry(&self) -> &BTreeSet<TreeId> {
            (**self).ancestry()
        }
        fn exists(&self, path: &TreePath) -> Result<bool, TreeError> {
            (**self).exists(path)
        }
        fn read(&self, path: &TreePath) -> Result<Option<Arc<[u8]>>, TreeError> {
            (**self).read(path)
        }
        fn list(&self, dir: &TreePath) -> Result<Listing, TreeError> {
            (**self).list(dir)
        }
        fn create(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError> {
            (**self).create(path, content)
        }
        fn overwrite(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError> {
            (**self).overwrite(path, content)
        }
        fn delete(&mut self, path: &TreePath) -> Result<(), TreeError> {
            (**self).delete(path)
        }
        fn rename(&mut self, from: &TreePath, to: &TreePath) -> Result<(), TreeError> {
            (**self).rename(from, to)
        }
        fn begin_update(&self, path: &TreePath) -> Result<UpdateRecorder, TreeError> {
            (**self).begin_update(path)
        }
        fn commit_update(&mut self, recorder: UpdateRecorder) -> Result<(), TreeError> {
            (**self).commit_update(recorder)
        }
        fn actions(&self) -> ActionList {
            (**self).actions()
        }
        fn apply(&mut self, action: &Action, strategy: MergeStrategy) -> Result<(), TreeError> {
            (**self).apply(action, strategy)
        }
        fn branch(&self) -> Box<dyn Tree> {
            (**self).branch()
        }
        fn merge_actions(
            &mut self,
            actions: &ActionList,
            strategy: MergeStrategy,
        ) -> Result<(), TreeError> {
            (**self).merge_actions(actions, strategy)
        }
    };
}

impl Tree for Box<dyn Tree> {
    forward_tree!();
}

impl<T: Tree + ?Sized> Tree for &mut T {
    forward_tree!();
}

// ---------------------------------------------------------------------------
// TreeExt / DirEntry
// ---------------------------------------------------------------------------

/// Convenience methods available on every tree.
pub trait TreeExt: Tree {
    /// A directory view rooted at `path`.
    fn get_dir(&self, path: &TreePath) -> DirEntry<'_, Self> {
        DirEntry {
            tree: self,
            path: path.clone(),
        }
    }

    /// The file parsed as JSON into `T`.
    ///
    /// # Errors
    /// Returns [`TreeError::InvalidUtf8`] or [`TreeError::InvalidJson`].
    fn read_json_as<T: DeserializeOwned>(&self, path: &TreePath) -> Result<Option<T>, TreeError> {
        let Some(text) = self.read_text(path)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| TreeError::InvalidJson {
                path: path.clone(),
                source,
            })
    }

    /// Every file in the tree, in [`Tree::visit`] order.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    fn files(&self) -> Result<Vec<FileEntry>, TreeError> {
        let mut out = Vec::new();
        self.visit(&TreePath::root(), &mut |entry| {
            out.push(entry.clone());
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }
}

impl<T: Tree + ?Sized> TreeExt for T {}

/// A directory inside a tree. Directories are implicit, so a `DirEntry`
/// for a path with no files underneath simply lists nothing.
pub struct DirEntry<'a, T: Tree + ?Sized> {
    tree: &'a T,
    path: TreePath,
}

impl<'a, T: Tree + ?Sized> DirEntry<'a, T> {
    /// The directory's path.
    #[must_use]
    pub const fn path(&self) -> &TreePath {
        &self.path
    }

    /// Names of sub-directories.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    pub fn subdirs(&self) -> Result<Vec<String>, TreeError> {
        Ok(self.tree.list(&self.path)?.dirs)
    }

    /// Names of files directly inside.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    pub fn subfiles(&self) -> Result<Vec<String>, TreeError> {
        Ok(self.tree.list(&self.path)?.files)
    }

    /// The sub-directory `name`.
    ///
    /// # Errors
    /// Returns an error if `name` would climb above the root.
    pub fn dir(&self, name: &str) -> Result<Self, TreeError> {
        Ok(Self {
            tree: self.tree,
            path: self.path.join(name)?,
        })
    }

    /// The file `name` directly inside.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    pub fn file(&self, name: &str) -> Result<Option<FileEntry>, TreeError> {
        self.tree.get(&self.path.join(name)?)
    }

    /// The containing directory, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.path.parent().map(|path| Self {
            tree: self.tree,
            path,
        })
    }

    /// Walk every file underneath, in [`Tree::visit`] order.
    ///
    /// # Errors
    /// Propagates backing-store failures.
    pub fn visit(
        &self,
        mut visitor: impl FnMut(&FileEntry) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>, TreeError> {
        self.tree.visit(&self.path, &mut visitor)
    }
}

impl<T: Tree + ?Sized> fmt::Debug for DirEntry<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntry").field("path", &self.path).finish()
    }
}
