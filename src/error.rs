//! Error types for arbor trees, sinks and tasks.
//!
//! [`TreeError`] is the unified error type for every tree mutation, merge,
//! update-buffer edit, commit and task operation. Variants carry the
//! offending path (or id) so a caller can report exactly what went wrong
//! without parsing messages.

use arbor_host::{HostError, TreePath};
use thiserror::Error;

use crate::task::TaskId;

/// Boxed error returned by external task executors.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for arbor operations.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A create (or rename target) collided with a file that already exists.
    #[error("file {path} already exists")]
    FileAlreadyExists {
        /// The colliding path.
        path: TreePath,
    },

    /// An operation needed a file that does not exist.
    #[error("file {path} does not exist")]
    FileDoesNotExist {
        /// The missing path.
        path: TreePath,
    },

    /// Folding another tree's actions in hit a conflict the strategy forbids.
    #[error("merge conflict on {path}: {reason}")]
    MergeConflict {
        /// The path the conflicting action targeted.
        path: TreePath,
        /// Which conflict class was hit.
        reason: String,
    },

    /// An update recorder was committed after its file changed underneath it.
    #[error("content of {path} changed since the update was started")]
    ContentMutated {
        /// The file whose content no longer matches the recorder's snapshot.
        path: TreePath,
    },

    /// An update recorder was committed to a tree it does not belong to.
    #[error("update record for {path} was not opened against this tree or its ancestors")]
    InvalidUpdateRecord {
        /// The recorder's path.
        path: TreePath,
    },

    /// A serialized action used a kind other than `c`, `o`, `r` or `d`.
    #[error("unknown action kind `{kind}`")]
    UnknownAction {
        /// The unrecognized kind tag.
        kind: String,
    },

    /// A serialized action lacked a field its kind requires.
    #[error("malformed action {id}: {reason}")]
    MalformedAction {
        /// The action's id.
        id: u64,
        /// What was missing or inconsistent.
        reason: String,
    },

    /// An update-buffer offset fell outside the original content.
    #[error("index {index} is outside of the range [{min}, {max}]")]
    IndexOutOfBound {
        /// The offending offset.
        index: usize,
        /// Smallest valid offset.
        min: usize,
        /// Largest valid offset.
        max: usize,
    },

    /// A removal would have discarded an insertion marked essential.
    #[error("removal at offset {offset} would discard essential content")]
    ContentCannotBeRemoved {
        /// Start of the rejected removal.
        offset: usize,
    },

    /// A scheduled task names an executor nobody registered.
    #[error("task executor `{name}` is not registered")]
    UnregisteredTask {
        /// The executor name.
        name: String,
    },

    /// A task was scheduled with a dependency that was never scheduled.
    #[error("unknown task dependency {id}")]
    UnknownTaskDependency {
        /// The unknown dependency id.
        id: TaskId,
    },

    /// A task executor returned an error.
    #[error("task `{name}` failed")]
    TaskFailed {
        /// The executor name.
        name: String,
        /// The executor's error.
        #[source]
        source: ExecutorError,
    },

    /// A file read as text was not valid UTF-8.
    #[error("file {path} is not valid UTF-8")]
    InvalidUtf8 {
        /// The file that failed to decode.
        path: TreePath,
    },

    /// A file read as JSON failed to parse.
    #[error("file {path} is not valid JSON")]
    InvalidJson {
        /// The file that failed to parse.
        path: TreePath,
        /// The parser's error.
        #[source]
        source: serde_json::Error,
    },

    /// A filter view was built from a malformed glob.
    #[error("invalid glob pattern `{pattern}`")]
    InvalidGlob {
        /// The rejected pattern.
        pattern: String,
        /// The glob parser's error.
        #[source]
        source: glob::PatternError,
    },

    /// A dry run reported problems, so the real commit was not attempted.
    #[error("dry run reported {} problem(s); nothing was committed", problems.len())]
    DryRunRejected {
        /// One human-readable line per problem, in encounter order.
        problems: Vec<String>,
    },

    /// The backing store failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// An action log failed to (de)serialize.
    #[error("action log serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TreeError {
    /// The path this error is about, when it has one.
    #[must_use]
    pub fn path(&self) -> Option<&TreePath> {
        match self {
            Self::FileAlreadyExists { path }
            | Self::FileDoesNotExist { path }
            | Self::MergeConflict { path, .. }
            | Self::ContentMutated { path }
            | Self::InvalidUpdateRecord { path }
            | Self::InvalidUtf8 { path }
            | Self::InvalidJson { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Returns `true` for the existence-class errors a sink validation raises.
    #[must_use]
    pub const fn is_existence_error(&self) -> bool {
        matches!(
            self,
            Self::FileAlreadyExists { .. } | Self::FileDoesNotExist { .. }
        )
    }

    pub(crate) fn conflict(path: &TreePath, reason: impl Into<String>) -> Self {
        Self::MergeConflict {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}
