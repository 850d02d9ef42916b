//! Filtered views.
//!
//! A [`FilterTree`] shows only the files of its base whose path passes a
//! predicate. Rejected files read as absent and cannot be overwritten,
//! deleted, renamed or updated through the view. New files may be created
//! anywhere; the filter governs what the view exposes, not what it accepts.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use arbor_host::{Listing, TreePath};
use glob::{MatchOptions, Pattern};

use super::{Tree, TreeId, TreeKind};
use crate::error::TreeError;
use crate::model::{Action, ActionKind, ActionList, MergeStrategy};
use crate::update::UpdateRecorder;

type Predicate = Arc<dyn Fn(&TreePath) -> bool + Send + Sync>;

/// A view of `base` restricted to paths accepted by a predicate.
pub struct FilterTree<B> {
    base: B,
    accepts: Predicate,
}

impl<B: fmt::Debug> fmt::Debug for FilterTree<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterTree")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl<B: Tree> FilterTree<B> {
    /// Filter `base` with an arbitrary predicate.
    pub fn new(base: B, accepts: impl Fn(&TreePath) -> bool + Send + Sync + 'static) -> Self {
        Self {
            base,
            accepts: Arc::new(accepts),
        }
    }

    /// Show only paths matching at least one glob (`/src/**/*.rs`).
    ///
    /// `*` does not cross `/`; `**` does.
    ///
    /// # Errors
    /// Returns [`TreeError::InvalidGlob`] for a malformed pattern.
    pub fn with_globs<S: AsRef<str>>(base: B, globs: &[S]) -> Result<Self, TreeError> {
        let patterns = globs
            .iter()
            .map(|glob| {
                let glob = glob.as_ref();
                Pattern::new(glob).map_err(|source| TreeError::InvalidGlob {
                    pattern: glob.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        Ok(Self::new(base, move |path: &TreePath| {
            patterns
                .iter()
                .any(|pattern| pattern.matches_with(path.as_str(), options))
        }))
    }

    /// Give back the wrapped tree.
    pub fn into_inner(self) -> B {
        self.base
    }

    /// Returns `true` if the view exposes `path`.
    #[must_use]
    pub fn accepts(&self, path: &TreePath) -> bool {
        (self.accepts)(path)
    }

    fn visible(&self, kind: &ActionKind) -> bool {
        match kind {
            ActionKind::Rename { path, to } => self.accepts(path) && self.accepts(to),
            other => self.accepts(other.path()),
        }
    }

    fn require(&self, path: &TreePath) -> Result<(), TreeError> {
        if self.accepts(path) {
            Ok(())
        } else {
            Err(TreeError::FileDoesNotExist { path: path.clone() })
        }
    }

    fn has_visible_files(&self, dir: &TreePath) -> Result<bool, TreeError> {
        let listing = self.base.list(dir)?;
        for name in &listing.files {
            if self.accepts(&dir.join(name)?) {
                return Ok(true);
            }
        }
        for name in &listing.dirs {
            if self.has_visible_files(&dir.join(name)?)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl<B: Tree> Tree for FilterTree<B> {
    fn kind(&self) -> TreeKind {
        TreeKind::Filtered
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
        Ok(self.accepts(path) && self.base.exists(path)?)
    }

    fn read(&self, path: &TreePath) -> Result<Option<Arc<[u8]>>, TreeError> {
        if !self.accepts(path) {
            return Ok(None);
        }
        self.base.read(path)
    }

    fn list(&self, dir: &TreePath) -> Result<Listing, TreeError> {
        let listing = self.base.list(dir)?;
        let mut visible = Listing::default();
        for name in listing.files {
            if self.accepts(&dir.join(&name)?) {
                visible.files.push(name);
            }
        }
        for name in listing.dirs {
            if self.has_visible_files(&dir.join(&name)?)? {
                visible.dirs.push(name);
            }
        }
        Ok(visible)
    }

    fn create(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError> {
        self.base.create(path, content)
    }

    fn overwrite(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError> {
        self.require(path)?;
        self.base.overwrite(path, content)
    }

    fn delete(&mut self, path: &TreePath) -> Result<(), TreeError> {
        self.require(path)?;
        self.base.delete(path)
    }

    fn rename(&mut self, from: &TreePath, to: &TreePath) -> Result<(), TreeError> {
        self.require(from)?;
        self.base.rename(from, to)
    }

    fn begin_update(&self, path: &TreePath) -> Result<UpdateRecorder, TreeError> {
        self.require(path)?;
        self.base.begin_update(path)
    }

    fn commit_update(&mut self, recorder: UpdateRecorder) -> Result<(), TreeError> {
        self.require(recorder.path())?;
        self.base.commit_update(recorder)
    }

    /// The base log restricted to actions whose paths are all visible.
    fn actions(&self) -> ActionList {
        let mut visible = ActionList::new();
        for action in &self.base.actions() {
            if self.visible(&action.kind) {
                visible.record_with_id(action.id, action.kind.clone());
            }
        }
        visible
    }

    fn apply(&mut self, action: &Action, strategy: MergeStrategy) -> Result<(), TreeError> {
        if !matches!(action.kind, ActionKind::Create { .. }) {
            self.require(action.kind.path())?;
        }
        self.base.apply(action, strategy)
    }

    fn branch(&self) -> Box<dyn Tree> {
        Box::new(FilterTree {
            base: self.base.branch(),
            accepts: Arc::clone(&self.accepts),
        })
    }

    fn merge_actions(&mut self, actions: &ActionList, strategy: MergeStrategy) -> Result<(), TreeError> {
        let mut visible = ActionList::new();
        for action in actions {
            if self.visible(&action.kind) {
                visible.record_with_id(action.id, action.kind.clone());
            }
        }
        self.base.merge_actions(&visible, strategy)
    }
}
