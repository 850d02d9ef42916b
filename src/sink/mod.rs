//! Commit sinks, where a finished action log ends up.
//!
//! Both sinks run every action through one [`CommitPlan`], which validates
//! the action against the host plus everything planned before it and then
//! folds it into a per-path net effect:
//!
//! - create after delete becomes an update;
//! - create then delete disappears;
//! - a rename of a created file moves the create;
//! - rename chains collapse to one rename per original file.
//!
//! The plan's output is ordered deletes, renames, creates, updates, which
//! is an order the host can execute without ever writing onto a path that
//! is still occupied.
//!
//! - [`DryRunSink`] reports problems as events and keeps going.
//! - [`HostSink`] stops at the first problem, before any I/O.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arbor_host::{Host, TreePath};

use crate::context::Context;
use crate::error::TreeError;
use crate::model::action::NetEffect;
use crate::model::{Action, ActionKind, ActionList};
use crate::tree::{Tree, innermost};

pub mod dry_run;
pub mod host;

pub use dry_run::{DryRunEvent, DryRunReport, DryRunSink};
pub use host::{CommitSummary, HostSink};

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// A consumer of finished action logs.
pub trait Sink {
    /// What a commit produces.
    type Output;

    /// Commit a log.
    ///
    /// # Errors
    /// Depends on the sink: see [`DryRunSink`] and [`HostSink`].
    fn commit_actions(&mut self, actions: &ActionList) -> Result<Self::Output, TreeError>;

    /// Commit the log of the tree that owns `tree` (views are unwrapped).
    ///
    /// # Errors
    /// As [`Sink::commit_actions`].
    fn commit(&mut self, tree: &dyn Tree) -> Result<Self::Output, TreeError> {
        self.commit_actions(&innermost(tree).actions())
    }
}

// ---------------------------------------------------------------------------
// NetChange / CommitPlan
// ---------------------------------------------------------------------------

/// One host operation of a validated plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetChange {
    /// Remove a host file.
    Delete {
        /// The file to remove.
        path: TreePath,
    },
    /// Move a host file.
    Rename {
        /// Current location.
        path: TreePath,
        /// New location.
        to: TreePath,
    },
    /// Write a file that does not exist on the host.
    Create {
        /// Where to write.
        path: TreePath,
        /// What to write.
        content: Arc<[u8]>,
    },
    /// Replace an existing host file.
    Update {
        /// Where to write.
        path: TreePath,
        /// What to write.
        content: Arc<[u8]>,
    },
}

/// Validation state shared by the sinks.
pub struct CommitPlan<'h> {
    host: &'h dyn Host,
    force: bool,
    /// Planned existence, overriding the host.
    planned: BTreeMap<TreePath, bool>,
    net: NetEffect,
}

impl<'h> CommitPlan<'h> {
    /// An empty plan against `host`. With `force`, creating over an
    /// existing file is planned as an update instead of rejected.
    #[must_use]
    pub fn new(host: &'h dyn Host, force: bool) -> Self {
        Self {
            host,
            force,
            planned: BTreeMap::new(),
            net: NetEffect::default(),
        }
    }

    fn exists(&self, path: &TreePath) -> Result<bool, TreeError> {
        match self.planned.get(path) {
            Some(&planned) => Ok(planned),
            None => Ok(self.host.exists(path)?),
        }
    }

    /// Validate `action` and fold it in. A rejected action leaves the plan
    /// unchanged.
    ///
    /// # Errors
    /// Returns [`TreeError::FileDoesNotExist`] for an overwrite, rename or
    /// delete of a missing file and [`TreeError::FileAlreadyExists`] for a
    /// create (without `force`) or rename onto an existing one.
    pub fn add(&mut self, action: &Action) -> Result<(), TreeError> {
        match &action.kind {
            ActionKind::Create { path, .. } => {
                if !self.force && self.exists(path)? {
                    return Err(TreeError::FileAlreadyExists { path: path.clone() });
                }
                self.planned.insert(path.clone(), true);
            }
            ActionKind::Overwrite { path, .. } => {
                if !self.exists(path)? {
                    return Err(TreeError::FileDoesNotExist { path: path.clone() });
                }
            }
            ActionKind::Rename { path, to } => {
                if !self.exists(path)? {
                    return Err(TreeError::FileDoesNotExist { path: path.clone() });
                }
                if self.exists(to)? {
                    return Err(TreeError::FileAlreadyExists { path: to.clone() });
                }
                self.planned.insert(path.clone(), false);
                self.planned.insert(to.clone(), true);
            }
            ActionKind::Delete { path } => {
                if !self.exists(path)? {
                    return Err(TreeError::FileDoesNotExist { path: path.clone() });
                }
                self.planned.insert(path.clone(), false);
            }
        }
        self.net.fold(action);
        Ok(())
    }

    /// The host operations that realize every accepted action, in safe
    /// execution order.
    ///
    /// # Errors
    /// Propagates host failures while classifying creates.
    pub fn finish(self) -> Result<Vec<NetChange>, TreeError> {
        let folded = self.net.into_actions(&Context::new());

        let mut deleted = BTreeSet::new();
        let mut vacated = BTreeSet::new();
        let mut created = BTreeSet::new();
        for action in &folded {
            match &action.kind {
                ActionKind::Delete { path } => {
                    deleted.insert(path.clone());
                }
                ActionKind::Rename { path, .. } => {
                    vacated.insert(path.clone());
                }
                ActionKind::Create { path, .. } => {
                    created.insert(path.clone());
                }
                ActionKind::Overwrite { .. } => {}
            }
        }

        let (mut deletes, mut renames, mut creates, mut updates) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for action in folded {
            match action.kind {
                ActionKind::Delete { path } => {
                    if !created.contains(&path) {
                        deletes.push(NetChange::Delete { path });
                    }
                }
                ActionKind::Rename { path, to } => renames.push(NetChange::Rename { path, to }),
                ActionKind::Create { path, content } => {
                    let replaces = deleted.contains(&path)
                        || (!vacated.contains(&path) && self.host.exists(&path)?);
                    if replaces {
                        updates.push(NetChange::Update { path, content });
                    } else {
                        creates.push(NetChange::Create { path, content });
                    }
                }
                ActionKind::Overwrite { path, content } => {
                    updates.push(NetChange::Update { path, content });
                }
            }
        }
        deletes.append(&mut renames);
        deletes.append(&mut creates);
        deletes.append(&mut updates);
        Ok(deletes)
    }
}
