//! Workflow configuration (`arbor.toml`).
//!
//! Selects the update buffer, the fallback merge strategy and the commit
//! behaviour of a [`Workflow`](crate::workflow::Workflow).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::MergeStrategy;
use crate::tree::TreeOptions;
use crate::update::BufferKind;

/// Default file name looked up in the target directory.
pub const CONFIG_FILE: &str = "arbor.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArborConfig {
    /// Tree construction settings.
    #[serde(default)]
    pub tree: TreeConfig,

    /// Merge settings.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Commit settings.
    #[serde(default)]
    pub commit: CommitConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeConfig {
    /// `"chunked"` (default) or `"anchored"`.
    #[serde(default)]
    pub update_buffer: BufferKind,
}

impl TreeConfig {
    #[must_use]
    pub const fn options(&self) -> TreeOptions {
        TreeOptions {
            buffer: self.update_buffer,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Used whenever a rule merges with [`MergeStrategy::DEFAULT`].
    #[serde(default)]
    pub strategy: MergeStrategy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitConfig {
    /// Compact the log before committing (default: `true`).
    #[serde(default = "default_optimize")]
    pub optimize: bool,

    /// Let creates replace existing files.
    #[serde(default)]
    pub force: bool,

    /// Stop after the dry run.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            optimize: default_optimize(),
            force: false,
            dry_run: false,
        }
    }
}

const fn default_optimize() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl ArborConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields or unknown
    /// enum values.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
