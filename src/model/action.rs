//! Action log: the ordered, replayable record of structural mutations.
//!
//! Every mutation a tree accepts is appended to its [`ActionList`] as an
//! [`Action`]: a [`ActionKind`] plus a globally increasing [`ActionId`] and the
//! id of the action before it in the same log. Ids give actions an identity
//! that survives branching, so a merge can recognise history it already has.
//!
//! Wire format (one JSON object per action):
//!
//! ```json
//! {"id":3,"parent":2,"kind":"r","path":"/a","to":"/b"}
//! {"id":4,"parent":3,"kind":"c","path":"/c","content":"aGVsbG8="}
//! ```
//!
//! `content` is base64 and appears only for `c`/`o`; `to` only for `r`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use arbor_host::TreePath;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::TreeError;

// ---------------------------------------------------------------------------
// ActionId
// ---------------------------------------------------------------------------

/// Globally increasing identity of an action, allocated by a [`Context`].
///
/// `ActionId::NONE` (zero) is the parent of the first action in a log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(u64);

impl ActionId {
    /// The "no action" sentinel.
    pub const NONE: Self = Self(0);

    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The four structural mutations a tree can record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// A new file.
    Create {
        /// Where the file is created.
        path: TreePath,
        /// Its full content.
        content: Arc<[u8]>,
    },
    /// New content for an existing file.
    Overwrite {
        /// The file being replaced.
        path: TreePath,
        /// Its full new content.
        content: Arc<[u8]>,
    },
    /// A move of an existing file.
    Rename {
        /// The source path.
        path: TreePath,
        /// The destination path.
        to: TreePath,
    },
    /// Removal of an existing file.
    Delete {
        /// The file being removed.
        path: TreePath,
    },
}

impl ActionKind {
    /// The path the action applies to (the source, for renames).
    #[must_use]
    pub const fn path(&self) -> &TreePath {
        match self {
            Self::Create { path, .. }
            | Self::Overwrite { path, .. }
            | Self::Rename { path, .. }
            | Self::Delete { path } => path,
        }
    }

    /// The single-character wire tag: `c`, `o`, `r` or `d`.
    #[must_use]
    pub const fn tag(&self) -> char {
        match self {
            Self::Create { .. } => 'c',
            Self::Overwrite { .. } => 'o',
            Self::Rename { .. } => 'r',
            Self::Delete { .. } => 'd',
        }
    }

    /// The written content, for creates and overwrites.
    #[must_use]
    pub fn content(&self) -> Option<&Arc<[u8]>> {
        match self {
            Self::Create { content, .. } | Self::Overwrite { content, .. } => Some(content),
            Self::Rename { .. } | Self::Delete { .. } => None,
        }
    }

    /// Apply `f` to every path the action mentions.
    ///
    /// Returns `None` if `f` rejects any of them.
    pub fn map_paths(&self, mut f: impl FnMut(&TreePath) -> Option<TreePath>) -> Option<Self> {
        Some(match self {
            Self::Create { path, content } => Self::Create {
                path: f(path)?,
                content: Arc::clone(content),
            },
            Self::Overwrite { path, content } => Self::Overwrite {
                path: f(path)?,
                content: Arc::clone(content),
            },
            Self::Rename { path, to } => Self::Rename {
                path: f(path)?,
                to: f(to)?,
            },
            Self::Delete { path } => Self::Delete { path: f(path)? },
        })
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { path, content } => write!(f, "create {path} ({} bytes)", content.len()),
            Self::Overwrite { path, content } => {
                write!(f, "overwrite {path} ({} bytes)", content.len())
            }
            Self::Rename { path, to } => write!(f, "rename {path} -> {to}"),
            Self::Delete { path } => write!(f, "delete {path}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One entry of an [`ActionList`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireAction", into = "WireAction")]
pub struct Action {
    /// Identity of this action.
    pub id: ActionId,
    /// Identity of the action before this one in the same log.
    pub parent: ActionId,
    /// What the action does.
    pub kind: ActionKind,
}

/// The serialized shape of an [`Action`].
#[derive(Serialize, Deserialize)]
struct WireAction {
    id: u64,
    #[serde(default)]
    parent: u64,
    kind: String,
    path: TreePath,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::model::encoding::optional")]
    content: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<TreePath>,
}

impl TryFrom<WireAction> for Action {
    type Error = TreeError;

    fn try_from(wire: WireAction) -> Result<Self, Self::Error> {
        let missing = |field: &str| TreeError::MalformedAction {
            id: wire.id,
            reason: format!("kind `{}` requires `{field}`", wire.kind),
        };
        let kind = match wire.kind.as_str() {
            "c" => ActionKind::Create {
                content: wire.content.clone().ok_or_else(|| missing("content"))?.into(),
                path: wire.path,
            },
            "o" => ActionKind::Overwrite {
                content: wire.content.clone().ok_or_else(|| missing("content"))?.into(),
                path: wire.path,
            },
            "r" => ActionKind::Rename {
                to: wire.to.clone().ok_or_else(|| missing("to"))?,
                path: wire.path,
            },
            "d" => ActionKind::Delete { path: wire.path },
            other => {
                return Err(TreeError::UnknownAction {
                    kind: other.to_owned(),
                });
            }
        };
        Ok(Self {
            id: ActionId(wire.id),
            parent: ActionId(wire.parent),
            kind,
        })
    }
}

impl From<Action> for WireAction {
    fn from(action: Action) -> Self {
        let kind = action.kind.tag().to_string();
        let (path, content, to) = match action.kind {
            ActionKind::Create { path, content } | ActionKind::Overwrite { path, content } => {
                (path, Some(content.to_vec()), None)
            }
            ActionKind::Rename { path, to } => (path, None, Some(to)),
            ActionKind::Delete { path } => (path, None, None),
        };
        Self {
            id: action.id.0,
            parent: action.parent.0,
            kind,
            path,
            content,
            to,
        }
    }
}

// ---------------------------------------------------------------------------
// ActionList
// ---------------------------------------------------------------------------

/// An ordered log of actions with O(1) "have I seen this id" lookups.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Action>", into = "Vec<Action>")]
pub struct ActionList {
    actions: Vec<Action>,
    ids: HashSet<ActionId>,
}

impl PartialEq for ActionList {
    fn eq(&self, other: &Self) -> bool {
        self.actions == other.actions
    }
}

impl Eq for ActionList {}

impl From<Vec<Action>> for ActionList {
    fn from(actions: Vec<Action>) -> Self {
        let ids = actions.iter().map(|a| a.id).collect();
        Self { actions, ids }
    }
}

impl From<ActionList> for Vec<Action> {
    fn from(list: ActionList) -> Self {
        list.actions
    }
}

impl IntoIterator for ActionList {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl<'a> IntoIterator for &'a ActionList {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl ActionList {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate in log order.
    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// The id of the most recent action, or [`ActionId::NONE`].
    #[must_use]
    pub fn last_id(&self) -> ActionId {
        self.actions.last().map_or(ActionId::NONE, |a| a.id)
    }

    /// The highest id in the log, or [`ActionId::NONE`]. Merged logs keep
    /// foreign ids, so this can be past [`last_id`](Self::last_id).
    #[must_use]
    pub fn max_id(&self) -> ActionId {
        self.ids.iter().max().copied().unwrap_or(ActionId::NONE)
    }

    /// Returns `true` if an action with this id is part of the log.
    #[must_use]
    pub fn contains(&self, id: ActionId) -> bool {
        self.ids.contains(&id)
    }

    /// Append `kind` under a freshly allocated id.
    pub fn record(&mut self, ctx: &Context, kind: ActionKind) -> ActionId {
        let id = ctx.next_action_id();
        self.record_with_id(id, kind);
        id
    }

    /// Append `kind` under an existing identity (used when folding in
    /// another tree's history).
    pub fn record_with_id(&mut self, id: ActionId, kind: ActionKind) {
        let parent = self.last_id();
        self.ids.insert(id);
        self.actions.push(Action { id, parent, kind });
    }

    /// The actions recorded after `id`.
    ///
    /// `ActionId::NONE` yields the whole log; an id that is not in the log
    /// yields `None`.
    #[must_use]
    pub fn since(&self, id: ActionId) -> Option<Self> {
        if id == ActionId::NONE {
            return Some(self.clone());
        }
        let pos = self.actions.iter().position(|a| a.id == id)?;
        Some(self.actions[pos + 1..].to_vec().into())
    }

    /// The log without identities, which is what two logically equal logs share.
    #[must_use]
    pub fn effects(&self) -> Vec<ActionKind> {
        self.actions.iter().map(|a| a.kind.clone()).collect()
    }

    /// Serialize to the JSON wire format (an array of actions).
    ///
    /// # Errors
    /// Returns [`TreeError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, TreeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse the JSON wire format.
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownAction`] or [`TreeError::MalformedAction`]
    /// for invalid entries, [`TreeError::Serialization`] for invalid JSON.
    pub fn from_json(text: &str) -> Result<Self, TreeError> {
        let raw: Vec<serde_json::Value> = serde_json::from_str(text)?;
        let mut actions = Vec::with_capacity(raw.len());
        for value in raw {
            let wire: WireAction = serde_json::from_value(value)?;
            actions.push(Action::try_from(wire)?);
        }
        Ok(actions.into())
    }

    /// Compact the log to its net effect relative to the log's base.
    ///
    /// - repeated writes to a path collapse to the last one;
    /// - a create followed by a delete disappears;
    /// - a create followed by renames becomes a create at the final path;
    /// - rename chains collapse to one rename per original file (or nothing,
    ///   if the file ends up where it started).
    ///
    /// The result is ordered deletes, renames, creates, overwrites. Surviving
    /// actions keep the id of the action that produced them. Renames are
    /// ordered so that no rename targets a path still occupied, and rename
    /// cycles go through a temporary path allocated from `ctx`.
    #[must_use]
    pub fn optimize(&self, ctx: &Context) -> Self {
        let mut net = NetEffect::default();
        for action in &self.actions {
            net.fold(action);
        }
        net.into_actions(ctx)
    }
}

// ---------------------------------------------------------------------------
// Net-effect folding
// ---------------------------------------------------------------------------

/// A file as seen at the end of the log.
#[derive(Debug)]
struct Node {
    /// The base path this file started at, or `None` if the log created it.
    origin: Option<TreePath>,
    /// Content written by the log, if any.
    content: Option<Arc<[u8]>>,
    write_id: ActionId,
    move_id: ActionId,
}

#[derive(Debug, Default)]
pub(crate) struct NetEffect {
    live: BTreeMap<TreePath, Node>,
    /// Base paths whose file was deleted, with the deleting action.
    deleted: BTreeMap<TreePath, ActionId>,
    /// Base paths the log has already accounted for.
    consumed: BTreeSet<TreePath>,
}

impl NetEffect {
    /// Remove the node currently at `path`, materializing an untouched base
    /// file on first use.
    fn take(&mut self, path: &TreePath) -> Option<Node> {
        if let Some(node) = self.live.remove(path) {
            return Some(node);
        }
        if self.consumed.insert(path.clone()) {
            return Some(Node {
                origin: Some(path.clone()),
                content: None,
                write_id: ActionId::NONE,
                move_id: ActionId::NONE,
            });
        }
        None
    }

    fn write(&mut self, id: ActionId, path: &TreePath, content: &Arc<[u8]>) {
        let node = self.take(path).unwrap_or(Node {
            origin: None,
            content: None,
            write_id: ActionId::NONE,
            move_id: ActionId::NONE,
        });
        self.live.insert(
            path.clone(),
            Node {
                content: Some(Arc::clone(content)),
                write_id: id,
                ..node
            },
        );
    }

    pub(crate) fn fold(&mut self, action: &Action) {
        match &action.kind {
            ActionKind::Create { path, content } => {
                if self.live.contains_key(path) {
                    self.write(action.id, path, content);
                } else {
                    self.live.insert(
                        path.clone(),
                        Node {
                            origin: None,
                            content: Some(Arc::clone(content)),
                            write_id: action.id,
                            move_id: ActionId::NONE,
                        },
                    );
                }
            }
            ActionKind::Overwrite { path, content } => self.write(action.id, path, content),
            ActionKind::Rename { path, to } => {
                if let Some(mut node) = self.take(path) {
                    node.move_id = action.id;
                    self.live.insert(to.clone(), node);
                }
            }
            ActionKind::Delete { path } => {
                if let Some(Node {
                    origin: Some(origin),
                    ..
                }) = self.take(path)
                {
                    self.deleted.insert(origin, action.id);
                }
            }
        }
    }

    pub(crate) fn into_actions(self, ctx: &Context) -> ActionList {
        let mut out = ActionList::new();

        for (path, id) in self.deleted {
            out.record_with_id(id, ActionKind::Delete { path });
        }

        let mut moves: BTreeMap<TreePath, (TreePath, ActionId)> = BTreeMap::new();
        for (path, node) in &self.live {
            if let Some(origin) = &node.origin
                && origin != path
            {
                moves.insert(origin.clone(), (path.clone(), node.move_id));
            }
        }
        order_renames(moves, ctx, &mut out);

        for (path, node) in &self.live {
            if node.origin.is_none()
                && let Some(content) = &node.content
            {
                out.record_with_id(
                    node.write_id,
                    ActionKind::Create {
                        path: path.clone(),
                        content: Arc::clone(content),
                    },
                );
            }
        }
        for (path, node) in &self.live {
            if node.origin.is_some()
                && let Some(content) = &node.content
            {
                out.record_with_id(
                    node.write_id,
                    ActionKind::Overwrite {
                        path: path.clone(),
                        content: Arc::clone(content),
                    },
                );
            }
        }
        out
    }
}

/// Emit `source → (target, id)` renames so that each target is vacated
/// before something moves onto it.
fn order_renames(
    mut moves: BTreeMap<TreePath, (TreePath, ActionId)>,
    ctx: &Context,
    out: &mut ActionList,
) {
    while !moves.is_empty() {
        let ready = moves
            .iter()
            .find(|(_, (target, _))| !moves.contains_key(target))
            .map(|(source, _)| source.clone());
        if let Some(source) = ready {
            if let Some((to, id)) = moves.remove(&source) {
                out.record_with_id(id, ActionKind::Rename { path: source, to });
            }
            continue;
        }

        // Every remaining rename is part of a cycle: park one file aside.
        let Some((source, (target, id))) = moves.pop_first() else {
            break;
        };
        let parking_id = ctx.next_action_id();
        let parked = TreePath::new(&format!("{target}.~arbor{}", parking_id.get()))
            .unwrap_or_else(|_| target.clone());
        out.record_with_id(
            parking_id,
            ActionKind::Rename {
                path: source,
                to: parked.clone(),
            },
        );
        moves.insert(parked, (target, id));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
