//! Post-commit tasks.
//!
//! Rules schedule follow-up work (install dependencies, initialize a
//! repository, run a formatter) while they mutate a tree. The
//! [`TaskScheduler`] orders those tasks by their dependencies, the
//! [`ExecutorRegistry`] maps task names to executors, and the
//! [`TaskRunner`] runs them one at a time once the commit has landed.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod registry;
pub mod scheduler;

pub use registry::{ExecutorRegistry, TaskExecutor, TaskRunner};
pub use scheduler::TaskScheduler;

/// Identifies a scheduled task within one [`Context`](crate::context::Context).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// What a rule asks for: an executor name, the tasks that must run first
/// and executor-specific options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfiguration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl TaskConfiguration {
    /// A task for executor `name` with no dependencies or options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            options: None,
        }
    }

    /// Require `id` to run before this task.
    #[must_use]
    pub fn depends_on(mut self, id: TaskId) -> Self {
        self.dependencies.push(id);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// A scheduled task as handed to its executor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    /// `0` for tasks without dependencies, otherwise one more than the sum
    /// of the dependencies' priorities. Lower runs first.
    pub priority: u64,
    pub configuration: TaskConfiguration,
}

impl TaskInfo {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.configuration.name
    }
}
