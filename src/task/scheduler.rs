use std::collections::BTreeMap;

use tracing::debug;

use super::{ExecutorRegistry, TaskConfiguration, TaskId, TaskInfo};
use crate::context::Context;
use crate::error::TreeError;

/// Collects tasks during a workflow and orders them by dependency depth.
#[derive(Debug)]
pub struct TaskScheduler {
    ctx: Context,
    /// Registration order.
    queue: Vec<TaskInfo>,
    priorities: BTreeMap<TaskId, u64>,
}

impl TaskScheduler {
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            queue: Vec::new(),
            priorities: BTreeMap::new(),
        }
    }

    /// Number of tasks waiting for [`finalize`](Self::finalize).
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue a task.
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownTaskDependency`] if a dependency was not
    /// scheduled on this scheduler since its last finalize.
    ///
    /// Priorities saturate at `u64::MAX`. A saturated task ties with its
    /// saturated dependencies and still runs after them, since ties keep
    /// registration order.
    pub fn schedule(&mut self, configuration: TaskConfiguration) -> Result<TaskId, TreeError> {
        let mut priority = 0u64;
        for dependency in &configuration.dependencies {
            let Some(&dep) = self.priorities.get(dependency) else {
                return Err(TreeError::UnknownTaskDependency { id: *dependency });
            };
            priority = priority.saturating_add(dep);
        }
        if !configuration.dependencies.is_empty() {
            priority = priority.saturating_add(1);
        }

        let id = self.ctx.next_task_id();
        debug!(task = %id, name = %configuration.name, priority, "scheduled task");
        self.priorities.insert(id, priority);
        self.queue.push(TaskInfo {
            id,
            priority,
            configuration,
        });
        Ok(id)
    }

    /// Drain the queue in run order: ascending priority, ties in
    /// registration order.
    ///
    /// # Errors
    /// Returns [`TreeError::UnregisteredTask`] for the first task whose name
    /// has no executor in `registry`. The queue is kept in that case.
    pub fn finalize(&mut self, registry: &ExecutorRegistry) -> Result<Vec<TaskInfo>, TreeError> {
        if let Some(task) = self.queue.iter().find(|task| !registry.contains(task.name())) {
            return Err(TreeError::UnregisteredTask {
                name: task.name().to_owned(),
            });
        }
        self.priorities.clear();
        let mut tasks = std::mem::take(&mut self.queue);
        tasks.sort_by_key(|task| task.priority);
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::task::TaskInfo;

    fn registry(names: &[&str]) -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        for name in names {
            registry.register(*name, |_: &TaskInfo| Ok::<(), ExecutorError>(()));
        }
        registry
    }

    #[test]
    fn priority_is_one_plus_sum_of_dependencies() {
        let mut scheduler = TaskScheduler::new(&Context::new());
        let a = scheduler.schedule(TaskConfiguration::new("a")).unwrap();
        let b = scheduler.schedule(TaskConfiguration::new("b").depends_on(a)).unwrap();
        let c = scheduler
            .schedule(TaskConfiguration::new("c").depends_on(a).depends_on(b))
            .unwrap();
        scheduler.schedule(TaskConfiguration::new("d").depends_on(c)).unwrap();

        let tasks = scheduler.finalize(&registry(&["a", "b", "c", "d"])).unwrap();
        let order: Vec<(&str, u64)> = tasks.iter().map(|t| (t.name(), t.priority)).collect();
        assert_eq!(order, vec![("a", 0), ("b", 1), ("c", 2), ("d", 3)]);
    }

    #[test]
    fn ties_keep_registration_order() {
        let mut scheduler = TaskScheduler::new(&Context::new());
        let root = scheduler.schedule(TaskConfiguration::new("root")).unwrap();
        scheduler.schedule(TaskConfiguration::new("late").depends_on(root)).unwrap();
        scheduler.schedule(TaskConfiguration::new("second-root")).unwrap();
        scheduler.schedule(TaskConfiguration::new("later").depends_on(root)).unwrap();

        let tasks = scheduler
            .finalize(&registry(&["root", "late", "second-root", "later"]))
            .unwrap();
        let names: Vec<&str> = tasks.iter().map(TaskInfo::name).collect();
        assert_eq!(names, vec!["root", "second-root", "late", "later"]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut scheduler = TaskScheduler::new(&Context::new());
        let err = scheduler
            .schedule(TaskConfiguration::new("x").depends_on(TaskId::new(42)))
            .unwrap_err();
        assert!(matches!(err, TreeError::UnknownTaskDependency { id } if id.get() == 42));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn unregistered_task_keeps_the_queue() {
        let mut scheduler = TaskScheduler::new(&Context::new());
        scheduler.schedule(TaskConfiguration::new("known")).unwrap();
        scheduler.schedule(TaskConfiguration::new("missing")).unwrap();

        let err = scheduler.finalize(&registry(&["known"])).unwrap_err();
        assert!(matches!(err, TreeError::UnregisteredTask { ref name } if name == "missing"));
        assert_eq!(scheduler.len(), 2);

        let tasks = scheduler.finalize(&registry(&["known", "missing"])).unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn deep_dependency_chains_saturate_instead_of_overflowing() {
        let mut scheduler = TaskScheduler::new(&Context::new());
        let mut earlier = Vec::new();
        for _ in 0..70 {
            let config = earlier
                .iter()
                .fold(TaskConfiguration::new("step"), |config, id| config.depends_on(*id));
            earlier.push(scheduler.schedule(config).unwrap());
        }

        let tasks = scheduler.finalize(&registry(&["step"])).unwrap();
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, earlier, "dependencies still run first");
        assert_eq!(tasks.last().unwrap().priority, u64::MAX);
    }

    #[test]
    fn finalize_resets_dependencies() {
        let mut scheduler = TaskScheduler::new(&Context::new());
        let first = scheduler.schedule(TaskConfiguration::new("a")).unwrap();
        scheduler.finalize(&registry(&["a"])).unwrap();
        assert!(scheduler.schedule(TaskConfiguration::new("a").depends_on(first)).is_err());
    }
}
