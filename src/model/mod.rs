//! arbor data model: actions, file snapshots and merge policy.

pub mod action;
pub mod encoding;
pub mod entry;
pub mod strategy;

pub use action::{Action, ActionId, ActionKind, ActionList};
pub use entry::FileEntry;
pub use strategy::MergeStrategy;
