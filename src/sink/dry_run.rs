//! Dry-run commits: describe what a commit would do without touching the host.

use std::sync::Arc;

use arbor_host::{Host, TreePath};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{CommitPlan, NetChange, Sink};
use crate::error::TreeError;
use crate::model::ActionList;
use crate::model::encoding;

/// One line of a dry-run report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DryRunEvent {
    /// A file would be created.
    Create {
        path: TreePath,
        #[serde(with = "encoding::bytes")]
        content: Vec<u8>,
    },
    /// An existing file would be replaced.
    Update {
        path: TreePath,
        #[serde(with = "encoding::bytes")]
        content: Vec<u8>,
    },
    /// A file would be removed.
    Delete { path: TreePath },
    /// A file would be moved.
    Rename { path: TreePath, to: TreePath },
    /// An action could not be committed.
    Error { path: TreePath, description: String },
}

impl DryRunEvent {
    /// The path the event is about.
    #[must_use]
    pub const fn path(&self) -> &TreePath {
        match self {
            Self::Create { path, .. }
            | Self::Update { path, .. }
            | Self::Delete { path }
            | Self::Rename { path, .. }
            | Self::Error { path, .. } => path,
        }
    }

    /// Returns `true` for [`DryRunEvent::Error`].
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<NetChange> for DryRunEvent {
    fn from(change: NetChange) -> Self {
        match change {
            NetChange::Delete { path } => Self::Delete { path },
            NetChange::Rename { path, to } => Self::Rename { path, to },
            NetChange::Create { path, content } => Self::Create {
                path,
                content: content.to_vec(),
            },
            NetChange::Update { path, content } => Self::Update {
                path,
                content: content.to_vec(),
            },
        }
    }
}

/// Everything a dry run found: errors first, then the planned changes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DryRunReport {
    events: Vec<DryRunEvent>,
}

impl DryRunReport {
    #[must_use]
    pub fn events(&self) -> &[DryRunEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<DryRunEvent> {
        self.events
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.events.iter().any(DryRunEvent::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DryRunEvent> {
        self.events.iter().filter(|event| event.is_error())
    }

    /// Error descriptions as `path: description` lines.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                DryRunEvent::Error { path, description } => Some(format!("{path}: {description}")),
                _ => None,
            })
            .collect()
    }

    /// One JSON object per line.
    ///
    /// # Errors
    /// Returns [`TreeError::Serialization`] if an event fails to encode.
    pub fn to_json_lines(&self) -> Result<String, TreeError> {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// A sink that validates a log against a host and reports the outcome.
#[derive(Clone)]
pub struct DryRunSink {
    host: Arc<dyn Host>,
    force: bool,
}

impl DryRunSink {
    #[must_use]
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host, force: false }
    }

    /// Plan creates over existing files as updates instead of errors.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl Sink for DryRunSink {
    type Output = DryRunReport;

    /// Never fails on invalid actions; they become [`DryRunEvent::Error`]
    /// events and the rest of the log is still planned.
    ///
    /// # Errors
    /// Only host I/O failures while planning are returned.
    #[instrument(skip_all, fields(actions = actions.len(), force = self.force))]
    fn commit_actions(&mut self, actions: &ActionList) -> Result<DryRunReport, TreeError> {
        let mut plan = CommitPlan::new(self.host.as_ref(), self.force);
        let mut events = Vec::new();
        for action in actions {
            match plan.add(action) {
                Ok(()) => {}
                Err(err @ TreeError::Host(_)) => return Err(err),
                Err(err) => {
                    debug!(action = %action.id, %err, "dry run rejected action");
                    events.push(DryRunEvent::Error {
                        path: err.path().unwrap_or(action.kind.path()).clone(),
                        description: err.to_string(),
                    });
                }
            }
        }
        events.extend(plan.finish()?.into_iter().map(DryRunEvent::from));
        Ok(DryRunReport { events })
    }
}
