//! Real commits: realize a validated log on the host.

use std::fmt;
use std::sync::Arc;

use arbor_host::Host;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::{CommitPlan, NetChange, Sink};
use crate::error::TreeError;
use crate::model::ActionList;

/// Counts of host operations performed by a commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub renamed: usize,
}

impl CommitSummary {
    /// Total number of host operations.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.renamed
    }
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} renamed",
            self.created, self.updated, self.deleted, self.renamed
        )
    }
}

/// A sink that writes a log to its host.
///
/// The whole log is validated before the first host operation: an invalid
/// action aborts the commit with the host untouched.
#[derive(Clone)]
pub struct HostSink {
    host: Arc<dyn Host>,
    force: bool,
}

impl HostSink {
    #[must_use]
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host, force: false }
    }

    /// Let creates replace existing files.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    fn execute(&self, change: NetChange, summary: &mut CommitSummary) -> Result<(), TreeError> {
        match change {
            NetChange::Delete { path } => {
                self.host.delete(&path)?;
                debug!(%path, "deleted");
                summary.deleted += 1;
            }
            NetChange::Rename { path, to } => {
                self.host.rename(&path, &to)?;
                debug!(%path, %to, "renamed");
                summary.renamed += 1;
            }
            NetChange::Create { path, content } => {
                self.host.write(&path, &content)?;
                debug!(%path, bytes = content.len(), "created");
                summary.created += 1;
            }
            NetChange::Update { path, content } => {
                self.host.write(&path, &content)?;
                debug!(%path, bytes = content.len(), "updated");
                summary.updated += 1;
            }
        }
        Ok(())
    }
}

impl Sink for HostSink {
    type Output = CommitSummary;

    /// # Errors
    /// Returns the first validation error (nothing is written), or a host
    /// error from the operation that failed (earlier operations stay).
    #[instrument(skip_all, fields(actions = actions.len(), force = self.force))]
    fn commit_actions(&mut self, actions: &ActionList) -> Result<CommitSummary, TreeError> {
        let mut plan = CommitPlan::new(self.host.as_ref(), self.force);
        for action in actions {
            plan.add(action)?;
        }
        let mut summary = CommitSummary::default();
        for change in plan.finish()? {
            self.execute(change, &mut summary)?;
        }
        info!(%summary, "commit finished");
        Ok(summary)
    }
}
