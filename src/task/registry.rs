use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::TaskInfo;
use crate::error::{ExecutorError, TreeError};

/// Runs one kind of task.
///
/// Closures `Fn(&TaskInfo) -> Result<(), ExecutorError>` are executors too.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &TaskInfo) -> Result<(), ExecutorError>;
}

#[async_trait]
impl<F> TaskExecutor for F
where
    F: Fn(&TaskInfo) -> Result<(), ExecutorError> + Send + Sync,
{
    async fn execute(&self, task: &TaskInfo) -> Result<(), ExecutorError> {
        self(task)
    }
}

/// Maps task names to their executors.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: BTreeMap<String, Arc<dyn TaskExecutor>>,
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.executors.keys()).finish()
    }
}

impl ExecutorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, executor: impl TaskExecutor + 'static) {
        self.executors.insert(name.into(), Arc::new(executor));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }
}

/// Executes finalized tasks strictly in order, one at a time.
pub struct TaskRunner<'r> {
    registry: &'r ExecutorRegistry,
}

impl<'r> TaskRunner<'r> {
    #[must_use]
    pub const fn new(registry: &'r ExecutorRegistry) -> Self {
        Self { registry }
    }

    /// Run `tasks` in the given order and return how many ran.
    ///
    /// Every executor is looked up before the first one starts.
    ///
    /// # Errors
    /// Returns [`TreeError::UnregisteredTask`] before running anything if a
    /// name is unknown, or [`TreeError::TaskFailed`] for the first executor
    /// that fails. Later tasks are not started.
    #[instrument(skip_all, fields(tasks = tasks.len()))]
    pub async fn run(&self, tasks: Vec<TaskInfo>) -> Result<usize, TreeError> {
        let mut resolved = Vec::with_capacity(tasks.len());
        for task in tasks {
            let Some(executor) = self.registry.get(task.name()) else {
                return Err(TreeError::UnregisteredTask {
                    name: task.name().to_owned(),
                });
            };
            resolved.push((task, executor));
        }

        let count = resolved.len();
        for (task, executor) in resolved {
            debug!(task = %task.id, name = task.name(), priority = task.priority, "running task");
            executor
                .execute(&task)
                .await
                .map_err(|source| TreeError::TaskFailed {
                    name: task.name().to_owned(),
                    source,
                })?;
        }
        info!(count, "tasks finished");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::task::{TaskConfiguration, TaskScheduler};
    use std::sync::Mutex;

    struct Recording {
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl TaskExecutor for Recording {
        async fn execute(&self, task: &TaskInfo) -> Result<(), ExecutorError> {
            self.seen.lock().unwrap().push(task.name().to_owned());
            if self.fail {
                return Err("exit status 1".into());
            }
            Ok(())
        }
    }

    fn registry(seen: &Arc<Mutex<Vec<String>>>, failing: &str) -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        for name in ["install", "format", "git-init"] {
            registry.register(
                name,
                Recording {
                    seen: Arc::clone(seen),
                    fail: name == failing,
                },
            );
        }
        registry
    }

    fn tasks(registry: &ExecutorRegistry) -> Vec<TaskInfo> {
        let mut scheduler = TaskScheduler::new(&Context::new());
        let install = scheduler.schedule(TaskConfiguration::new("install")).unwrap();
        scheduler
            .schedule(TaskConfiguration::new("format").depends_on(install))
            .unwrap();
        scheduler.schedule(TaskConfiguration::new("git-init")).unwrap();
        scheduler.finalize(registry).unwrap()
    }

    #[tokio::test]
    async fn runs_in_priority_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&seen, "");
        let count = TaskRunner::new(&registry).run(tasks(&registry)).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(*seen.lock().unwrap(), vec!["install", "git-init", "format"]);
    }

    #[tokio::test]
    async fn failure_stops_later_tasks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&seen, "git-init");
        let err = TaskRunner::new(&registry)
            .run(tasks(&registry))
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::TaskFailed { ref name, .. } if name == "git-init"));
        assert_eq!(*seen.lock().unwrap(), vec!["install", "git-init"]);
    }

    #[tokio::test]
    async fn unknown_executor_fails_before_anything_runs() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let full = registry(&seen, "");
        let planned = tasks(&full);
        let mut partial = ExecutorRegistry::new();
        partial.register("install", |_: &TaskInfo| Ok::<(), ExecutorError>(()));

        let err = TaskRunner::new(&partial).run(planned).await.unwrap_err();
        assert!(matches!(err, TreeError::UnregisteredTask { .. }));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(partial.names().collect::<Vec<_>>(), vec!["install"]);
    }
}
