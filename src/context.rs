//! Process-scoped id allocation.
//!
//! Action ids, tree ids and task ids are all drawn from monotonic counters
//! owned by a [`Context`]. Cloning a `Context` shares its counters, so every
//! tree, sink and scheduler of one workflow invocation agrees on ordering.
//! Tests build a fresh `Context` to get reproducible ids.
//!
//! Each context also draws a process-unique scope that is stamped into its
//! tree ids, so a recorder or branch from one context is never mistaken for
//! a tree of another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::action::ActionId;
use crate::task::TaskId;
use crate::tree::TreeId;

static SCOPES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
struct Counters {
    scope: u64,
    actions: AtomicU64,
    trees: AtomicU64,
    tasks: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            scope: SCOPES.fetch_add(1, Ordering::Relaxed) + 1,
            actions: AtomicU64::new(0),
            trees: AtomicU64::new(0),
            tasks: AtomicU64::new(0),
        }
    }
}

/// Shared handle to the id counters of one workflow invocation.
#[derive(Clone, Debug, Default)]
pub struct Context {
    counters: Arc<Counters>,
}

impl Context {
    /// A context whose counters all start from zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose action ids continue after `last`.
    ///
    /// Used when extending a log read from elsewhere, so new actions never
    /// reuse one of its ids.
    #[must_use]
    pub fn after(last: ActionId) -> Self {
        let ctx = Self::new();
        ctx.counters.actions.store(last.get(), Ordering::Relaxed);
        ctx
    }

    /// Allocate the next action id. The first id is `1`; `0` means "no action".
    #[must_use]
    pub fn next_action_id(&self) -> ActionId {
        ActionId::new(self.counters.actions.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Allocate the next tree id.
    #[must_use]
    pub fn next_tree_id(&self) -> TreeId {
        TreeId::scoped(
            self.counters.scope,
            self.counters.trees.fetch_add(1, Ordering::Relaxed) + 1,
        )
    }

    /// Allocate the next task id.
    #[must_use]
    pub fn next_task_id(&self) -> TaskId {
        TaskId::new(self.counters.tasks.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
