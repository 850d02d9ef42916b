//! The copy-on-write tree backed by a read-only [`Host`].
//!
//! A [`HostTree`] never writes to its host. It keeps an overlay of
//! everything staged so far:
//!
//! - `files`: content written by this tree (created, overwritten or moved in);
//! - `hidden`: host paths that were deleted or renamed away;
//! - `renames`: pending renames, target → the path the file started at.
//!
//! Reads consult `files`, then `hidden`, then the host. Branching clones
//! the overlay and the log, so branches are cheap and independent.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use arbor_host::{Host, Listing, MemoryHost, TreePath};
use tracing::{debug, instrument, trace};

use super::merge::MergeState;
use super::{Tree, TreeId, TreeKind};
use crate::context::Context;
use crate::error::TreeError;
use crate::model::{Action, ActionKind, ActionList, MergeStrategy};
use crate::update::{BufferKind, UpdateRecorder};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Construction options for a [`HostTree`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeOptions {
    /// Which update buffer [`Tree::begin_update`] hands out.
    pub buffer: BufferKind,
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Hidden {
    Deleted,
    RenamedTo(TreePath),
}

#[derive(Clone, Debug, Default)]
pub(super) struct Overlay {
    pub(super) files: BTreeMap<TreePath, Arc<[u8]>>,
    pub(super) hidden: BTreeMap<TreePath, Hidden>,
    pub(super) renames: BTreeMap<TreePath, TreePath>,
}

// ---------------------------------------------------------------------------
// HostTree
// ---------------------------------------------------------------------------

/// A staged tree over a shared, read-only backing store.
pub struct HostTree {
    pub(super) ctx: Context,
    id: TreeId,
    ancestry: BTreeSet<TreeId>,
    host: Arc<dyn Host>,
    options: TreeOptions,
    pub(super) overlay: Overlay,
    pub(super) log: ActionList,
}

impl fmt::Debug for HostTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostTree")
            .field("id", &self.id)
            .field("ancestry", &self.ancestry)
            .field("staged_files", &self.overlay.files.len())
            .field("hidden", &self.overlay.hidden.len())
            .field("actions", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl HostTree {
    /// A tree over `host` with default options.
    #[must_use]
    pub fn new(ctx: &Context, host: Arc<dyn Host>) -> Self {
        Self::with_options(ctx, host, TreeOptions::default())
    }

    /// A purely virtual tree over an empty in-memory store.
    #[must_use]
    pub fn empty(ctx: &Context) -> Self {
        Self::new(ctx, Arc::new(MemoryHost::new()))
    }

    /// A tree over `host` with explicit options.
    #[must_use]
    pub fn with_options(ctx: &Context, host: Arc<dyn Host>, options: TreeOptions) -> Self {
        Self {
            ctx: ctx.clone(),
            id: ctx.next_tree_id(),
            ancestry: BTreeSet::new(),
            host,
            options,
            overlay: Overlay::default(),
            log: ActionList::new(),
        }
    }

    /// A branch of this tree as a concrete `HostTree`.
    #[must_use]
    pub fn fork(&self) -> Self {
        let mut ancestry = self.ancestry.clone();
        ancestry.insert(self.id);
        let branch = Self {
            ctx: self.ctx.clone(),
            id: self.ctx.next_tree_id(),
            ancestry,
            host: Arc::clone(&self.host),
            options: self.options,
            overlay: self.overlay.clone(),
            log: self.log.clone(),
        };
        debug!(parent = %self.id, branch = %branch.id, "branched tree");
        branch
    }

    /// A copy that keeps this tree's id, for exercising same-tree merges.
    #[cfg(test)]
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            id: self.id,
            ancestry: self.ancestry.clone(),
            host: Arc::clone(&self.host),
            options: self.options,
            overlay: self.overlay.clone(),
            log: self.log.clone(),
        }
    }

    /// The shared backing store.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// The id allocator this tree draws from.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.ctx
    }

    /// The options the tree was built with.
    #[must_use]
    pub const fn options(&self) -> TreeOptions {
        self.options
    }

    /// Returns `true` if `path` is a host file this tree deleted and has not
    /// written again.
    #[must_use]
    pub fn is_pending_delete(&self, path: &TreePath) -> bool {
        !self.overlay.files.contains_key(path)
            && matches!(self.overlay.hidden.get(path), Some(Hidden::Deleted))
    }

    // -- overlay primitives (no validation, no logging) --

    pub(super) fn resolve(&self, path: &TreePath) -> Result<Option<Arc<[u8]>>, TreeError> {
        if let Some(content) = self.overlay.files.get(path) {
            return Ok(Some(Arc::clone(content)));
        }
        if self.overlay.hidden.contains_key(path) {
            return Ok(None);
        }
        Ok(self.host.read(path)?.map(Arc::from))
    }

    pub(super) fn present(&self, path: &TreePath) -> Result<bool, TreeError> {
        if self.overlay.files.contains_key(path) {
            return Ok(true);
        }
        if self.overlay.hidden.contains_key(path) {
            return Ok(false);
        }
        Ok(self.host.exists(path)?)
    }

    pub(super) fn put(&mut self, path: &TreePath, content: Arc<[u8]>) {
        self.overlay.hidden.remove(path);
        self.overlay.files.insert(path.clone(), content);
    }

    pub(super) fn remove(&mut self, path: &TreePath) -> Result<(), TreeError> {
        self.overlay.files.remove(path);
        self.overlay.renames.remove(path);
        if self.host.exists(path)? {
            self.overlay.hidden.insert(path.clone(), Hidden::Deleted);
        }
        Ok(())
    }

    pub(super) fn relocate(
        &mut self,
        from: &TreePath,
        to: &TreePath,
        content: Arc<[u8]>,
    ) -> Result<(), TreeError> {
        self.overlay.files.remove(from);
        if self.host.exists(from)? {
            self.overlay
                .hidden
                .insert(from.clone(), Hidden::RenamedTo(to.clone()));
        }
        self.put(to, content);
        let origin = self
            .overlay
            .renames
            .remove(from)
            .unwrap_or_else(|| from.clone());
        if &origin != to {
            self.overlay.renames.insert(to.clone(), origin);
        }
        Ok(())
    }
}

impl Tree for HostTree {
    fn kind(&self) -> TreeKind {
        TreeKind::Host
    }

    fn unwrap_base(&self) -> Option<&dyn Tree> {
        None
    }

    fn id(&self) -> TreeId {
        self.id
    }

    fn ancestry(&self) -> &BTreeSet<TreeId> {
        &self.ancestry
    }

    fn exists(&self, path: &TreePath) -> Result<bool, TreeError> {
        self.present(path)
    }

    fn read(&self, path: &TreePath) -> Result<Option<Arc<[u8]>>, TreeError> {
        self.resolve(path)
    }

    fn list(&self, dir: &TreePath) -> Result<Listing, TreeError> {
        let mut listing = Listing::default();
        let from_host = self.host.list(dir)?;
        for name in from_host.files {
            if self.present(&dir.join(&name)?)? {
                listing.files.push(name);
            }
        }
        for name in from_host.dirs {
            if self.has_files_under(&dir.join(&name)?)? {
                listing.dirs.push(name);
            }
        }
        for path in self.overlay.files.keys() {
            let Some(rel) = path.strip_prefix(dir) else {
                continue;
            };
            let mut segments = rel.segments();
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

    fn create(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError> {
        if let Some(current) = self.resolve(path)? {
            if &*current == content {
                return Ok(());
            }
            return Err(TreeError::FileAlreadyExists { path: path.clone() });
        }
        let content: Arc<[u8]> = Arc::from(content);
        self.put(path, Arc::clone(&content));
        let id = self.log.record(
            &self.ctx,
            ActionKind::Create {
                path: path.clone(),
                content,
            },
        );
        debug!(tree = %self.id, action = %id, %path, "create");
        Ok(())
    }

    fn overwrite(&mut self, path: &TreePath, content: &[u8]) -> Result<(), TreeError> {
        let Some(current) = self.resolve(path)? else {
            return Err(TreeError::FileDoesNotExist { path: path.clone() });
        };
        if &*current == content {
            return Ok(());
        }
        let content: Arc<[u8]> = Arc::from(content);
        self.put(path, Arc::clone(&content));
        let id = self.log.record(
            &self.ctx,
            ActionKind::Overwrite {
                path: path.clone(),
                content,
            },
        );
        debug!(tree = %self.id, action = %id, %path, "overwrite");
        Ok(())
    }

    fn delete(&mut self, path: &TreePath) -> Result<(), TreeError> {
        if !self.present(path)? {
            return Err(TreeError::FileDoesNotExist { path: path.clone() });
        }
        self.remove(path)?;
        let id = self
            .log
            .record(&self.ctx, ActionKind::Delete { path: path.clone() });
        debug!(tree = %self.id, action = %id, %path, "delete");
        Ok(())
    }

    fn rename(&mut self, from: &TreePath, to: &TreePath) -> Result<(), TreeError> {
        let Some(content) = self.resolve(from)? else {
            return Err(TreeError::FileDoesNotExist { path: from.clone() });
        };
        if from == to {
            return Ok(());
        }
        if self.present(to)? {
            return Err(TreeError::FileAlreadyExists { path: to.clone() });
        }
        self.relocate(from, to, content)?;
        let id = self.log.record(
            &self.ctx,
            ActionKind::Rename {
                path: from.clone(),
                to: to.clone(),
            },
        );
        debug!(tree = %self.id, action = %id, %from, %to, "rename");
        Ok(())
    }

    fn begin_update(&self, path: &TreePath) -> Result<UpdateRecorder, TreeError> {
        let content = self
            .resolve(path)?
            .ok_or_else(|| TreeError::FileDoesNotExist { path: path.clone() })?;
        Ok(UpdateRecorder::new(
            self.id,
            path.clone(),
            content,
            self.options.buffer,
        ))
    }

    fn commit_update(&mut self, recorder: UpdateRecorder) -> Result<(), TreeError> {
        let origin = recorder.tree_id();
        let path = recorder.path().clone();
        if origin != self.id && !self.ancestry.contains(&origin) {
            return Err(TreeError::InvalidUpdateRecord { path });
        }
        let current = self
            .resolve(&path)?
            .ok_or_else(|| TreeError::FileDoesNotExist { path: path.clone() })?;
        if &*current != recorder.original() {
            return Err(TreeError::ContentMutated { path });
        }
        self.overwrite(&path, &recorder.generate())
    }

    fn actions(&self) -> ActionList {
        self.log.clone()
    }

    fn apply(&mut self, action: &Action, strategy: MergeStrategy) -> Result<(), TreeError> {
        let mut state = MergeState::new(self);
        self.merge_next(action, strategy, &mut state)
    }

    fn branch(&self) -> Box<dyn Tree> {
        Box::new(self.fork())
    }

    #[instrument(skip_all, fields(tree = %self.id, actions = actions.len(), %strategy))]
    fn merge_actions(&mut self, actions: &ActionList, strategy: MergeStrategy) -> Result<(), TreeError> {
        let mut state = MergeState::new(self);
        for action in actions {
            self.merge_next(action, strategy, &mut state)?;
        }
        Ok(())
    }
}

impl HostTree {
    fn merge_next(
        &mut self,
        action: &Action,
        strategy: MergeStrategy,
        state: &mut MergeState,
    ) -> Result<(), TreeError> {
        if self.log.contains(action.id) {
            trace!(tree = %self.id, action = %action.id, "skipping shared action");
            if let ActionKind::Rename { path, to } = &action.kind {
                state.moved(path, to);
            }
            return Ok(());
        }
        self.merge_one(action, strategy, state)
    }

    fn has_files_under(&self, dir: &TreePath) -> Result<bool, TreeError> {
        if self
            .overlay
            .files
            .keys()
            .any(|path| path != dir && path.starts_with(dir))
        {
            return Ok(true);
        }
        let listing = self.host.list(dir)?;
        for name in &listing.files {
            if self.present(&dir.join(name)?)? {
                return Ok(true);
            }
        }
        for name in &listing.dirs {
            if self.has_files_under(&dir.join(name)?)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;

    use crate::tree::TreeExt;

    fn p(s: &str) -> TreePath {
        TreePath::new(s).unwrap()
    }

    fn tree_over(files: &[(&str, &str)]) -> HostTree {
        let host = MemoryHost::with_files(files.iter().map(|(p, c)| (*p, c.as_bytes().to_vec())))
            .unwrap();
        HostTree::new(&Context::new(), Arc::new(host))
    }

    #[test]
    fn reads_fall_through_to_the_host() {
        let tree = tree_over(&[("/a.txt", "host")]);
        assert_eq!(tree.read_text(&p("/a.txt")).unwrap().as_deref(), Some("host"));
        assert!(tree.exists(&p("/a.txt")).unwrap());
        assert!(!tree.exists(&p("/b.txt")).unwrap());
        assert!(tree.actions().is_empty());
    }

    #[test]
    fn create_rejects_different_content_and_ignores_identical() {
        let mut tree = tree_over(&[("/a.txt", "host")]);
        tree.create(&p("/a.txt"), b"host").unwrap();
        assert!(tree.actions().is_empty());
        let err = tree.create(&p("/a.txt"), b"other").unwrap_err();
        assert!(matches!(err, TreeError::FileAlreadyExists { .. }));
        assert_eq!(tree.read_text(&p("/a.txt")).unwrap().as_deref(), Some("host"));
    }

    #[test]
    fn overwrite_and_delete_require_the_file() {
        let mut tree = HostTree::empty(&Context::new());
        assert!(matches!(
            tree.overwrite(&p("/x"), b"1"),
            Err(TreeError::FileDoesNotExist { .. })
        ));
        assert!(matches!(
            tree.delete(&p("/x")),
            Err(TreeError::FileDoesNotExist { .. })
        ));
        tree.create(&p("/x"), b"1").unwrap();
        tree.overwrite(&p("/x"), b"1").unwrap();
        assert_eq!(tree.actions().len(), 1, "identical overwrite is a no-op");
    }

    #[test]
    fn delete_hides_host_files() {
        let mut tree = tree_over(&[("/dir/a", "a"), ("/dir/b", "b")]);
        tree.delete(&p("/dir/a")).unwrap();
        assert!(tree.is_pending_delete(&p("/dir/a")));
        assert_eq!(tree.read(&p("/dir/a")).unwrap(), None);
        assert_eq!(tree.list(&p("/dir")).unwrap().files, vec!["b"]);
        tree.delete(&p("/dir/b")).unwrap();
        assert!(tree.list(&TreePath::root()).unwrap().dirs.is_empty());
    }

    #[test]
    fn rename_moves_content_and_checks_both_ends() {
        let mut tree = tree_over(&[("/a", "A"), ("/b", "B")]);
        assert!(matches!(
            tree.rename(&p("/a"), &p("/b")),
            Err(TreeError::FileAlreadyExists { .. })
        ));
        assert!(matches!(
            tree.rename(&p("/missing"), &p("/c")),
            Err(TreeError::FileDoesNotExist { .. })
        ));
        tree.rename(&p("/a"), &p("/c/d")).unwrap();
        assert!(!tree.exists(&p("/a")).unwrap());
        assert!(!tree.is_pending_delete(&p("/a")));
        assert_eq!(tree.read_text(&p("/c/d")).unwrap().as_deref(), Some("A"));
        assert_eq!(tree.overlay.renames.get(&p("/c/d")), Some(&p("/a")));
    }

    #[test]
    fn rename_chains_remember_the_original_source() {
        let mut tree = tree_over(&[("/a", "A")]);
        tree.rename(&p("/a"), &p("/b")).unwrap();
        tree.rename(&p("/b"), &p("/c")).unwrap();
        assert_eq!(tree.overlay.renames.get(&p("/c")), Some(&p("/a")));
        tree.rename(&p("/c"), &p("/a")).unwrap();
        assert!(tree.overlay.renames.is_empty());
    }

    #[test]
    fn list_merges_host_and_overlay() {
        let mut tree = tree_over(&[("/src/lib.rs", "lib"), ("/README", "r")]);
        tree.create(&p("/src/new.rs"), b"new").unwrap();
        tree.create(&p("/docs/guide/intro.md"), b"intro").unwrap();
        let root = tree.list(&TreePath::root()).unwrap();
        assert_eq!(root.files, vec!["README"]);
        assert_eq!(root.dirs, vec!["docs", "src"]);
        assert_eq!(
            tree.get_dir(&p("/src")).subfiles().unwrap(),
            vec!["lib.rs", "new.rs"]
        );
    }

    #[test]
    fn visit_is_files_first_then_sorted_subdirs() {
        let tree = tree_over(&[
            ("/z.txt", ""),
            ("/a/2.txt", ""),
            ("/a/1.txt", ""),
            ("/a/b/deep.txt", ""),
            ("/m.txt", ""),
            ("/c/x.txt", ""),
        ]);
        let paths: Vec<String> = tree
            .files()
            .unwrap()
            .iter()
            .map(|e| e.path().to_string())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/m.txt",
                "/z.txt",
                "/a/1.txt",
                "/a/2.txt",
                "/a/b/deep.txt",
                "/c/x.txt"
            ]
        );
    }

    #[test]
    fn visit_stops_when_the_visitor_breaks() {
        let tree = tree_over(&[("/a", ""), ("/b", ""), ("/c", "")]);
        let mut seen = Vec::new();
        let flow = tree
            .get_dir(&TreePath::root())
            .visit(|entry| {
                seen.push(entry.path().clone());
                if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert!(flow.is_break());
        assert_eq!(seen, vec![p("/a"), p("/b")]);
    }

    #[test]
    fn dir_entry_navigation() {
        let tree = tree_over(&[("/a/b/c.txt", "c")]);
        let dir = tree.get_dir(&p("/a"));
        assert_eq!(dir.subdirs().unwrap(), vec!["b"]);
        let b = dir.dir("b").unwrap();
        assert_eq!(b.file("c.txt").unwrap().unwrap().content(), b"c");
        assert_eq!(b.parent().unwrap().path(), &p("/a"));
        assert!(tree.get_dir(&TreePath::root()).parent().is_none());
    }

    #[test]
    fn json_reads_report_the_path() {
        let mut tree = HostTree::empty(&Context::new());
        tree.create(&p("/ok.json"), br#"{"name":"arbor"}"#).unwrap();
        tree.create(&p("/bad.json"), b"{nope").unwrap();
        tree.create(&p("/bin"), &[0xff, 0xfe]).unwrap();

        let value = tree.read_json(&p("/ok.json")).unwrap().unwrap();
        assert_eq!(value["name"], "arbor");

        #[derive(serde::Deserialize)]
        struct Manifest {
            name: String,
        }
        let manifest: Manifest = tree.read_json_as(&p("/ok.json")).unwrap().unwrap();
        assert_eq!(manifest.name, "arbor");

        assert!(matches!(
            tree.read_json(&p("/bad.json")),
            Err(TreeError::InvalidJson { path, .. }) if path == p("/bad.json")
        ));
        assert!(matches!(
            tree.read_text(&p("/bin")),
            Err(TreeError::InvalidUtf8 { .. })
        ));
        assert_eq!(tree.read_json(&p("/absent.json")).unwrap(), None);
    }

    #[test]
    fn branches_get_new_ids_and_ancestry() {
        let tree = HostTree::empty(&Context::new());
        let child = tree.fork();
        let grandchild = child.branch();
        assert_ne!(child.id(), tree.id());
        assert!(child.ancestry().contains(&tree.id()));
        assert!(grandchild.ancestry().contains(&tree.id()));
        assert!(grandchild.ancestry().contains(&child.id()));
    }

    #[test]
    fn update_commits_through_the_recorder() {
        let mut tree = tree_over(&[("/a.txt", "hello world")]);
        let mut recorder = tree.begin_update(&p("/a.txt")).unwrap();
        recorder.remove(0, 5).unwrap().insert_right(0, "goodbye").unwrap();
        tree.commit_update(recorder).unwrap();
        assert_eq!(
            tree.read_text(&p("/a.txt")).unwrap().as_deref(),
            Some("goodbye world")
        );
    }

    #[test]
    fn update_rejects_mutated_content_and_foreign_recorders() {
        let mut tree = tree_over(&[("/a.txt", "v1")]);
        let recorder = tree.begin_update(&p("/a.txt")).unwrap();
        tree.overwrite(&p("/a.txt"), b"v2").unwrap();
        assert!(matches!(
            tree.commit_update(recorder),
            Err(TreeError::ContentMutated { .. })
        ));

        let sibling = HostTree::new(tree.context(), Arc::clone(tree.host()));
        let foreign = sibling.begin_update(&p("/a.txt")).unwrap();
        assert!(matches!(
            tree.commit_update(foreign),
            Err(TreeError::InvalidUpdateRecord { .. })
        ));

        // Same counter values, different context.
        let stranger = tree_over(&[("/a.txt", "v2")]);
        assert_eq!(stranger.id().get(), tree.id().get());
        let foreign = stranger.begin_update(&p("/a.txt")).unwrap();
        assert!(matches!(
            tree.commit_update(foreign),
            Err(TreeError::InvalidUpdateRecord { .. })
        ));

        // A recorder opened by an ancestor is accepted by its branch.
        let from_parent = tree.begin_update(&p("/a.txt")).unwrap();
        let mut child = tree.fork();
        child.commit_update(from_parent).unwrap();
    }

    #[test]
    fn anchored_buffers_are_selected_by_options() {
        let host = Arc::new(MemoryHost::with_files([("/a", "abc")]).unwrap());
        let tree = HostTree::with_options(
            &Context::new(),
            host,
            TreeOptions {
                buffer: BufferKind::Anchored,
            },
        );
        let recorder = tree.begin_update(&p("/a")).unwrap();
        assert!(format!("{recorder:?}").contains("AnchorBuffer"));
    }
}
