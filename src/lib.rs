//! arbor: branchable virtual file trees.
//!
//! A [`HostTree`] stages create/overwrite/rename/delete actions over a
//! read-only [`Host`](arbor_host::Host). Trees branch cheaply, merge under a
//! [`MergeStrategy`] and hand their log to a [`Sink`](sink::Sink): the
//! [`DryRunSink`] describes a commit, the [`HostSink`] performs it.
//! [`UpdateRecorder`] edits a file by its original offsets, and the
//! [`Workflow`] strings everything together with post-commit tasks.

pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod sink;
pub mod task;
pub mod telemetry;
pub mod tree;
pub mod update;
pub mod workflow;

pub use arbor_host::{FsHost, Host, HostError, MemoryHost, TreePath};
pub use config::ArborConfig;
pub use context::Context;
pub use error::TreeError;
pub use model::{Action, ActionId, ActionKind, ActionList, FileEntry, MergeStrategy};
pub use sink::{CommitSummary, DryRunEvent, DryRunReport, DryRunSink, HostSink, Sink};
pub use task::{TaskConfiguration, TaskId, TaskInfo, TaskScheduler};
pub use tree::{FilterTree, HostTree, ScopedTree, Tree, TreeExt};
pub use update::{BufferKind, UpdateRecorder};
pub use workflow::{RuleContext, Workflow, WorkflowOutcome};
