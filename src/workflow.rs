//! One rule invocation end to end.
//!
//! A [`Workflow`] builds a tree over its host, hands it to a rule together
//! with a task scheduler, then:
//!
//! 1. optimizes the log (unless `[commit] optimize = false`);
//! 2. dry-runs it and refuses to continue if any action is invalid;
//! 3. finalizes the scheduled tasks, so an unregistered task is reported
//!    before anything is written;
//! 4. stops here when `[commit] dry_run = true`;
//! 5. commits to the host and runs the tasks in order.

use std::sync::Arc;

use arbor_host::Host;
use tracing::{info, instrument};

use crate::config::ArborConfig;
use crate::context::Context;
use crate::error::TreeError;
use crate::model::MergeStrategy;
use crate::sink::{CommitSummary, DryRunReport, DryRunSink, HostSink, Sink};
use crate::task::{ExecutorRegistry, TaskConfiguration, TaskExecutor, TaskId, TaskRunner, TaskScheduler};
use crate::tree::{HostTree, Tree};

/// What a rule gets to work with.
#[derive(Debug)]
pub struct RuleContext {
    /// The tree the workflow commits.
    pub tree: HostTree,
    /// Tasks to run after the commit.
    pub scheduler: TaskScheduler,
    fallback: MergeStrategy,
}

impl RuleContext {
    #[must_use]
    pub const fn context(&self) -> &Context {
        self.tree.context()
    }

    /// A branch of the workflow tree, to stage changes for a later merge.
    #[must_use]
    pub fn branch(&self) -> HostTree {
        self.tree.fork()
    }

    /// Merge `source` into the workflow tree. [`MergeStrategy::DEFAULT`]
    /// resolves to the configured strategy.
    ///
    /// # Errors
    /// Returns [`TreeError::MergeConflict`] for the first conflicting action.
    pub fn merge(&mut self, source: &dyn Tree, strategy: MergeStrategy) -> Result<(), TreeError> {
        self.tree.merge(source, strategy.resolve(self.fallback))
    }

    /// Queue a post-commit task.
    ///
    /// # Errors
    /// As [`TaskScheduler::schedule`].
    pub fn schedule(&mut self, configuration: TaskConfiguration) -> Result<TaskId, TreeError> {
        self.scheduler.schedule(configuration)
    }
}

/// The result of [`Workflow::execute`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowOutcome {
    /// The dry-run report of the committed log.
    pub report: DryRunReport,
    /// Host operations performed; `None` for a dry run.
    pub summary: Option<CommitSummary>,
    /// Number of tasks that ran.
    pub tasks_run: usize,
}

/// Runs rules against one host under one configuration.
pub struct Workflow {
    ctx: Context,
    host: Arc<dyn Host>,
    config: ArborConfig,
    registry: ExecutorRegistry,
}

impl Workflow {
    #[must_use]
    pub fn new(ctx: &Context, host: Arc<dyn Host>, config: ArborConfig) -> Self {
        Self {
            ctx: ctx.clone(),
            host,
            config,
            registry: ExecutorRegistry::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ArborConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Make `executor` available to tasks named `name`.
    pub fn register(&mut self, name: impl Into<String>, executor: impl TaskExecutor + 'static) {
        self.registry.register(name, executor);
    }

    /// Run `rule` and carry its changes through to the host.
    ///
    /// # Errors
    /// - whatever the rule returns;
    /// - [`TreeError::DryRunRejected`] if the log does not fit the host;
    /// - [`TreeError::UnregisteredTask`] before the commit;
    /// - host errors during the commit, or [`TreeError::TaskFailed`] after it.
    #[instrument(skip_all, fields(dry_run = self.config.commit.dry_run))]
    pub async fn execute<R>(&self, rule: R) -> Result<WorkflowOutcome, TreeError>
    where
        R: FnOnce(&mut RuleContext) -> Result<(), TreeError>,
    {
        let commit = self.config.commit;
        let mut rc = RuleContext {
            tree: HostTree::with_options(&self.ctx, Arc::clone(&self.host), self.config.tree.options()),
            scheduler: TaskScheduler::new(&self.ctx),
            fallback: self.config.merge.strategy,
        };
        rule(&mut rc)?;

        let mut actions = rc.tree.actions();
        if commit.optimize {
            actions = actions.optimize(&self.ctx);
        }

        let report = DryRunSink::new(Arc::clone(&self.host))
            .force(commit.force)
            .commit_actions(&actions)?;
        if report.has_errors() && !commit.dry_run {
            return Err(TreeError::DryRunRejected {
                problems: report.problems(),
            });
        }

        let tasks = rc.scheduler.finalize(&self.registry)?;
        if commit.dry_run {
            info!(events = report.events().len(), "dry run finished");
            return Ok(WorkflowOutcome {
                report,
                summary: None,
                tasks_run: 0,
            });
        }

        let summary = HostSink::new(Arc::clone(&self.host))
            .force(commit.force)
            .commit_actions(&actions)?;
        let tasks_run = TaskRunner::new(&self.registry).run(tasks).await?;
        Ok(WorkflowOutcome {
            report,
            summary: Some(summary),
            tasks_run,
        })
    }
}
