//! Normalized tree paths.
//!
//! Every path that crosses an arbor API is a [`TreePath`]: absolute,
//! `/`-separated, without `.` or empty segments, and never climbing above
//! the root. Normalization happens once at construction so that two
//! spellings of the same file always compare equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

// ---------------------------------------------------------------------------
// TreePath
// ---------------------------------------------------------------------------

/// A validated, normalized absolute path inside a tree (e.g. `/src/main.rs`).
///
/// The root is `/`. A `TreePath` never ends with `/` (except the root) and
/// never contains `.`, `..`, or empty segments.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath(String);

impl TreePath {
    /// Normalize a path string.
    ///
    /// Relative inputs are interpreted from the root, so `a/b` and `/a/b` are
    /// the same path. Backslashes are treated as separators.
    ///
    /// # Errors
    /// Returns [`HostError::InvalidPath`] if `..` would climb above the root or
    /// a segment contains a NUL byte.
    pub fn new(raw: &str) -> Result<Self, HostError> {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(HostError::InvalidPath {
                            value: raw.to_owned(),
                            reason: "path escapes the tree root".to_owned(),
                        });
                    }
                }
                s if s.contains('\0') => {
                    return Err(HostError::InvalidPath {
                        value: raw.to_owned(),
                        reason: "segment contains a NUL byte".to_owned(),
                    });
                }
                s => segments.push(s),
            }
        }
        let mut normalized = String::with_capacity(raw.len() + 1);
        for segment in &segments {
            normalized.push('/');
            normalized.push_str(segment);
        }
        if normalized.is_empty() {
            normalized.push('/');
        }
        Ok(Self(normalized))
    }

    /// The tree root, `/`.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_owned())
    }

    /// Return the normalized string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for `/`.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The path without its leading `/` (empty for the root).
    ///
    /// Suitable for joining onto an on-disk directory.
    #[must_use]
    pub fn to_relative(&self) -> &str {
        &self.0[1..]
    }

    /// Iterate over the path's segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The last segment, or `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// The containing directory, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_owned())),
        }
    }

    /// Append a relative fragment (which may itself contain `/` or `..`).
    ///
    /// # Errors
    /// Returns [`HostError::InvalidPath`] if the result would escape the root.
    pub fn join(&self, fragment: &str) -> Result<Self, HostError> {
        Self::new(&format!("{}/{fragment}", self.0))
    }

    /// Returns `true` if `self` is `prefix` or lies underneath it.
    ///
    /// Comparison is segment-wise: `/ab` does not start with `/a`.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }

    /// Re-root `self` relative to `prefix`: `/a/b/c` stripped of `/a` is `/b/c`.
    ///
    /// Returns `None` if `self` is not under `prefix`.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        if prefix.is_root() {
            return Some(self.clone());
        }
        let rest = &self.0[prefix.0.len()..];
        if rest.is_empty() {
            Some(Self::root())
        } else {
            Some(Self(rest.to_owned()))
        }
    }

    /// Place `self` underneath `base`: `/b/c` under `/a` is `/a/b/c`.
    #[must_use]
    pub fn under(&self, base: &Self) -> Self {
        if base.is_root() {
            return self.clone();
        }
        if self.is_root() {
            return base.clone();
        }
        Self(format!("{}{}", base.0, self.0))
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreePath({})", self.0)
    }
}

impl FromStr for TreePath {
    type Err = HostError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TreePath {
    type Error = HostError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl TryFrom<&str> for TreePath {
    type Error = HostError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.0
    }
}

impl AsRef<str> for TreePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> TreePath {
        TreePath::new(s).unwrap()
    }

    #[test]
    fn normalizes_separators_and_dots() {
        assert_eq!(p("a/b").as_str(), "/a/b");
        assert_eq!(p("/a//b/").as_str(), "/a/b");
        assert_eq!(p("./a/./b").as_str(), "/a/b");
        assert_eq!(p("/a/x/../b").as_str(), "/a/b");
        assert_eq!(p("a\\b").as_str(), "/a/b");
        assert_eq!(p("").as_str(), "/");
        assert!(p("/").is_root());
    }

    #[test]
    fn rejects_escaping_the_root() {
        let err = TreePath::new("/a/../..").unwrap_err();
        assert!(matches!(err, HostError::InvalidPath { .. }));
        assert!(TreePath::new("..").is_err());
    }

    #[test]
    fn parent_and_file_name() {
        let path = p("/src/lib.rs");
        assert_eq!(path.file_name(), Some("lib.rs"));
        assert_eq!(path.parent(), Some(p("/src")));
        assert_eq!(p("/top").parent(), Some(TreePath::root()));
        assert_eq!(TreePath::root().parent(), None);
        assert_eq!(TreePath::root().file_name(), None);
    }

    #[test]
    fn starts_with_is_segment_wise() {
        assert!(p("/a/b").starts_with(&p("/a")));
        assert!(p("/a").starts_with(&p("/a")));
        assert!(!p("/ab").starts_with(&p("/a")));
        assert!(p("/anything").starts_with(&TreePath::root()));
    }

    #[test]
    fn strip_prefix_and_under_are_inverse() {
        let base = p("/pkg");
        let inner = p("/pkg/src/main.rs");
        let rel = inner.strip_prefix(&base).unwrap();
        assert_eq!(rel, p("/src/main.rs"));
        assert_eq!(rel.under(&base), inner);
        assert_eq!(p("/pkg").strip_prefix(&base), Some(TreePath::root()));
        assert_eq!(p("/other").strip_prefix(&base), None);
    }

    #[test]
    fn join_normalizes() {
        assert_eq!(p("/a").join("b/../c").unwrap(), p("/a/c"));
        assert!(TreePath::root().join("..").is_err());
    }

    #[test]
    fn serde_round_trips_as_string() {
        let json = serde_json::to_string(&p("/a/b")).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: TreePath = serde_json::from_str("\"a/./b\"").unwrap();
        assert_eq!(back, p("/a/b"));
        assert!(serde_json::from_str::<TreePath>("\"../x\"").is_err());
    }
}
