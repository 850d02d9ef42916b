//! Re-rooted views.
//!
//! A [`ScopedTree`] exposes the directory `root` of its base tree as `/`.
//! Every path is translated on the way in (`/x` → `root/x`) and on the way
//! out. The view owns no state: reads, writes and the log all belong to the
//! base.

use std::collections::BTreeSet;
use std::sync::Arc;

use arbor_host::{Listing, TreePath};

use super::{Tree, TreeId, TreeKind};
use crate::error::TreeError;
use crate::model::{Action, ActionList, MergeStrategy};
use crate::update::UpdateRecorder;

/// A view of `base` rooted at a sub-directory.
#[derive(Debug)]
pub struct ScopedTree<B> {
    base: B,
    root: TreePath,
}

impl<B: Tree> ScopedTree<B> {
    /// Scope `base` to `root`.
    #[must_use]
    pub const fn new(base: B, root: TreePath) -> Self {
        Self { base, root }
    }

    /// The base-tree directory this view exposes as `/`.
    #[must_use]
    pub const fn root(&self) -> &TreePath {
        &self.root
    }

    /// Give back the wrapped tree.
    pub fn into_inner(self) -> B {
        self.base
    }

    fn outer(&self, path: &TreePath) -> TreePath {
        path.under(&self.root)
    }

    fn inner(&self, path: &TreePath) -> Option<TreePath> {
        path.strip_prefix(&self.root)
    }

    fn outer_action(&self, action: &Action) -> Action {
        Action {
            kind: action
                .kind
                .map_paths(|path| Some(self.outer(path)))
                .unwrap_or_else(|| action.kind.clone()),
            ..action.clone()
        }
    }
}

impl<B: Tree> Tree for ScopedTree<B> {
    fn kind(&self) -> TreeKind {
        TreeKind::Scoped
    }

    fn unwrap_base(&self) -> Option<&dyn Tree> {
        Some(&self.base)
    }

    fn id(&self) -> TreeId {
        self.base.id()
    }

    fn ancestry(&self) -> &BTreeSet<TreeId> {
        self.base.ancestry()
    }

    fn exists(&self, path: &TreePath) -> Result<bool, TreeError> {
        self.base.exists(&self.outer(path))
    }

    fn read(&self, path: &TreePath) -> Result<Option<Arc<[u8]>>, TreeError> {
        self.base.read(&self.outer(path))
    }

    fn list(&self, dir: &TreePath) -> Result<Listing, TreeError> {
        self.base.list(&self.outer(dir))
    }

    fn create(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError> {
        let path = self.outer(path);
        self.base.create(&path, content)
    }

    fn overwrite(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError> {
        let path = self.outer(path);
        self.base.overwrite(&path, content)
    }

    fn delete(&mut self, path: &TreePath) -> Result<(), TreeError> {
        let path = self.outer(path);
        self.base.delete(&path)
    }

    fn rename(&mut self, from: &TreePath, to: &TreePath) -> Result<(), TreeError> {
        let (from, to) = (self.outer(from), self.outer(to));
        self.base.rename(&from, &to)
    }

    fn begin_update(&self, path: &TreePath) -> Result<UpdateRecorder, TreeError> {
        Ok(self
            .base
            .begin_update(&self.outer(path))?
            .relocated(path.clone()))
    }

    fn commit_update(&mut self, recorder: UpdateRecorder) -> Result<(), TreeError> {
        let path = self.outer(recorder.path());
        self.base.commit_update(recorder.relocated(path))
    }

    /// The base log restricted to actions entirely inside the scope.
    fn actions(&self) -> ActionList {
        let mut scoped = ActionList::new();
        for action in &self.base.actions() {
            if let Some(kind) = action.kind.map_paths(|path| self.inner(path)) {
                scoped.record_with_id(action.id, kind);
            }
        }
        scoped
    }

    fn apply(&mut self, action: &Action, strategy: MergeStrategy) -> Result<(), TreeError> {
        let action = self.outer_action(action);
        self.base.apply(&action, strategy)
    }

    fn branch(&self) -> Box<dyn Tree> {
        Box::new(ScopedTree::new(self.base.branch(), self.root.clone()))
    }

    fn merge_actions(&mut self, actions: &ActionList, strategy: MergeStrategy) -> Result<(), TreeError> {
        let mut outer = ActionList::new();
        for action in actions {
            let action = self.outer_action(action);
            outer.record_with_id(action.id, action.kind);
        }
        self.base.merge_actions(&outer, strategy)
    }
}
