//! Per-action merge rules for [`HostTree`].
//!
//! Each incoming action is checked against this tree's current state and
//! either applied, skipped as a no-op, or rejected as a conflict. The
//! `ALLOW_*` flags of a [`MergeStrategy`] relax specific conflict classes:
//!
//! | Incoming | Situation                       | Outcome                              |
//! |----------|---------------------------------|--------------------------------------|
//! | create   | same content already there      | no-op                                |
//! | create   | different content there         | conflict, or overwrite with `CREATION` |
//! | overwrite| target pending delete           | conflict, or re-create with `OVERWRITE` |
//! | overwrite| target missing                  | conflict                             |
//! | overwrite| same content                    | no-op                                |
//! | rename   | source pending delete           | conflict (never relaxed)             |
//! | rename   | same rename already pending     | no-op                                |
//! | rename   | target already renamed onto source | conflict (cycle)                  |
//! | rename   | source missing                  | conflict                             |
//! | rename   | target exists                   | conflict, or replace with `OVERWRITE` |
//! | delete   | already pending delete          | no-op                                |
//! | delete   | missing                         | conflict, or no-op with `DELETE`     |
//!
//! Applied actions keep their original id so a repeated merge skips them.
//!
//! A cycle is judged against the renames this tree had pending when the
//! merge call started, so an incoming log that moves a file away and back
//! merges cleanly. A rename chain the target already walked (`a→b`, `b→c`
//! on both sides) is recognized step by step through the source path each
//! incoming file started at.

use std::collections::BTreeMap;
use std::sync::Arc;

use arbor_host::TreePath;
use tracing::debug;

use super::Tree;
use super::host_tree::{Hidden, HostTree};
use crate::error::TreeError;
use crate::model::{Action, ActionId, ActionKind, MergeStrategy};

/// Bookkeeping for one merge call.
#[derive(Debug)]
pub(super) struct MergeState {
    /// Pending renames of the target before the first incoming action.
    baseline: BTreeMap<TreePath, TreePath>,
    /// Incoming rename target → the path that file started at, in the
    /// incoming log's coordinates.
    origins: BTreeMap<TreePath, TreePath>,
}

impl MergeState {
    pub(super) fn new(tree: &HostTree) -> Self {
        Self {
            baseline: tree.overlay.renames.clone(),
            origins: BTreeMap::new(),
        }
    }

    /// Follow an incoming `path → to` and return where the file started.
    pub(super) fn moved(&mut self, path: &TreePath, to: &TreePath) -> TreePath {
        let origin = self.origins.remove(path).unwrap_or_else(|| path.clone());
        if &origin != to {
            self.origins.insert(to.clone(), origin.clone());
        }
        origin
    }
}

impl HostTree {
    pub(super) fn merge_one(
        &mut self,
        action: &Action,
        strategy: MergeStrategy,
        state: &mut MergeState,
    ) -> Result<(), TreeError> {
        let id = if action.id == ActionId::NONE {
            self.ctx.next_action_id()
        } else {
            action.id
        };
        match &action.kind {
            ActionKind::Create { path, content } => self.merge_create(id, path, content, strategy),
            ActionKind::Overwrite { path, content } => {
                self.merge_overwrite(id, path, content, strategy)
            }
            ActionKind::Rename { path, to } => self.merge_rename(id, path, to, strategy, state),
            ActionKind::Delete { path } => self.merge_delete(id, path, strategy),
        }
    }

    fn merge_create(
        &mut self,
        id: ActionId,
        path: &TreePath,
        content: &Arc<[u8]>,
        strategy: MergeStrategy,
    ) -> Result<(), TreeError> {
        let Some(current) = self.resolve(path)? else {
            self.put(path, Arc::clone(content));
            self.record(
                id,
                ActionKind::Create {
                    path: path.clone(),
                    content: Arc::clone(content),
                },
            );
            return Ok(());
        };
        if current == *content {
            return Ok(());
        }
        if !strategy.allows_creation() {
            return Err(TreeError::conflict(
                path,
                "file already exists with different content",
            ));
        }
        self.put(path, Arc::clone(content));
        self.record(
            id,
            ActionKind::Overwrite {
                path: path.clone(),
                content: Arc::clone(content),
            },
        );
        Ok(())
    }

    fn merge_overwrite(
        &mut self,
        id: ActionId,
        path: &TreePath,
        content: &Arc<[u8]>,
        strategy: MergeStrategy,
    ) -> Result<(), TreeError> {
        if self.is_pending_delete(path) {
            if !strategy.allows_overwrite() {
                return Err(TreeError::conflict(path, "target is pending delete"));
            }
            self.put(path, Arc::clone(content));
            self.record(
                id,
                ActionKind::Create {
                    path: path.clone(),
                    content: Arc::clone(content),
                },
            );
            return Ok(());
        }
        let Some(current) = self.resolve(path)? else {
            return Err(TreeError::conflict(path, "target does not exist"));
        };
        if current == *content {
            return Ok(());
        }
        self.put(path, Arc::clone(content));
        self.record(
            id,
            ActionKind::Overwrite {
                path: path.clone(),
                content: Arc::clone(content),
            },
        );
        Ok(())
    }

    fn merge_rename(
        &mut self,
        id: ActionId,
        path: &TreePath,
        to: &TreePath,
        strategy: MergeStrategy,
        state: &mut MergeState,
    ) -> Result<(), TreeError> {
        if self.is_pending_delete(path) {
            return Err(TreeError::conflict(path, "source is pending delete"));
        }
        let origin = state.moved(path, to);
        let already_moved = matches!(self.overlay.hidden.get(path), Some(Hidden::RenamedTo(t)) if t == to)
            || self.overlay.renames.get(to) == Some(path)
            || self.overlay.renames.get(to) == Some(&origin);
        if already_moved && !self.present(path)? {
            return Ok(());
        }
        if state.baseline.get(path) == Some(to) && self.overlay.renames.get(path) == Some(to) {
            return Err(TreeError::conflict(
                path,
                format!("cyclic rename: {to} was already renamed to {path}"),
            ));
        }
        let Some(content) = self.resolve(path)? else {
            return Err(TreeError::conflict(path, "source does not exist"));
        };
        if path == to {
            return Ok(());
        }
        if self.present(to)? {
            if !strategy.allows_overwrite() {
                return Err(TreeError::conflict(to, "rename target already exists"));
            }
            self.remove(to)?;
            let replaced = self.ctx.next_action_id();
            self.record(replaced, ActionKind::Delete { path: to.clone() });
        }
        self.relocate(path, to, content)?;
        self.record(
            id,
            ActionKind::Rename {
                path: path.clone(),
                to: to.clone(),
            },
        );
        Ok(())
    }

    fn merge_delete(
        &mut self,
        id: ActionId,
        path: &TreePath,
        strategy: MergeStrategy,
    ) -> Result<(), TreeError> {
        if self.is_pending_delete(path) {
            return Ok(());
        }
        if !self.present(path)? {
            if strategy.allows_delete() {
                return Ok(());
            }
            return Err(TreeError::conflict(path, "file does not exist"));
        }
        self.remove(path)?;
        self.record(id, ActionKind::Delete { path: path.clone() });
        Ok(())
    }

    fn record(&mut self, id: ActionId, kind: ActionKind) {
        debug!(tree = %self.id(), action = %id, %kind, "merged action");
        self.log.record_with_id(id, kind);
    }
}
