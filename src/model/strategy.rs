//! Merge tolerance policy.
//!
//! A [`MergeStrategy`] is a small bit set. Each `ALLOW_*` flag relaxes one
//! conflict class during a merge or single-action apply:
//!
//! | Flag                        | Bit | Relaxes                                    |
//! |-----------------------------|-----|--------------------------------------------|
//! | `ALLOW_OVERWRITE_CONFLICT`  | 2   | overwrite of a deleted file, rename onto an existing file |
//! | `ALLOW_CREATION_CONFLICT`   | 4   | create over a file with different content  |
//! | `ALLOW_DELETE_CONFLICT`     | 8   | delete of a file that does not exist       |
//!
//! `ERROR` (bit 1) allows nothing. It differs from `DEFAULT` only in that
//! [`MergeStrategy::resolve`] never replaces it with a configured fallback.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bit flags controlling which merge conflicts are tolerated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MergeStrategy(u8);

impl MergeStrategy {
    /// No conflicts tolerated; may be replaced by a configured fallback.
    pub const DEFAULT: Self = Self(0);
    /// No conflicts tolerated, explicitly.
    pub const ERROR: Self = Self(1);
    /// Overwrite a deleted file, or rename onto an existing one.
    pub const ALLOW_OVERWRITE_CONFLICT: Self = Self(2);
    /// Turn a conflicting create into an overwrite.
    pub const ALLOW_CREATION_CONFLICT: Self = Self(4);
    /// Ignore deletes of missing files.
    pub const ALLOW_DELETE_CONFLICT: Self = Self(8);
    /// Only content-level conflicts are tolerated.
    pub const CONTENT_ONLY: Self = Self::ALLOW_OVERWRITE_CONFLICT;
    /// Every conflict class is tolerated.
    pub const OVERWRITE: Self = Self(2 | 4 | 8);

    /// Build from raw bits. Unknown bits are dropped.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1111)
    }

    /// The raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every flag in `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if overwrite conflicts are tolerated.
    #[must_use]
    pub const fn allows_overwrite(self) -> bool {
        self.contains(Self::ALLOW_OVERWRITE_CONFLICT)
    }

    /// Returns `true` if creation conflicts are tolerated.
    #[must_use]
    pub const fn allows_creation(self) -> bool {
        self.contains(Self::ALLOW_CREATION_CONFLICT)
    }

    /// Returns `true` if delete conflicts are tolerated.
    #[must_use]
    pub const fn allows_delete(self) -> bool {
        self.contains(Self::ALLOW_DELETE_CONFLICT)
    }

    /// `DEFAULT` defers to `fallback`; everything else, `ERROR` included,
    /// stands as chosen.
    #[must_use]
    pub const fn resolve(self, fallback: Self) -> Self {
        if self.0 == Self::DEFAULT.0 {
            fallback
        } else {
            self
        }
    }

    const NAMES: [(&'static str, Self); 6] = [
        ("default", Self::DEFAULT),
        ("error", Self::ERROR),
        ("content-only", Self::CONTENT_ONLY),
        ("overwrite", Self::OVERWRITE),
        ("allow-creation-conflict", Self::ALLOW_CREATION_CONFLICT),
        ("allow-delete-conflict", Self::ALLOW_DELETE_CONFLICT),
    ];
}

impl BitOr for MergeStrategy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MergeStrategy {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::NAMES.iter().find(|(_, s)| s == self) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "flags({:#06b})", self.0),
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, strategy)| *strategy)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::NAMES.iter().map(|(name, _)| *name).collect();
                format!(
                    "unknown merge strategy `{s}` (expected one of: {})",
                    known.join(", ")
                )
            })
    }
}

impl TryFrom<String> for MergeStrategy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MergeStrategy> for String {
    fn from(strategy: MergeStrategy) -> Self {
        strategy.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_unions_of_flags() {
        assert_eq!(MergeStrategy::CONTENT_ONLY.bits(), 2);
        assert_eq!(
            MergeStrategy::OVERWRITE,
            MergeStrategy::ALLOW_OVERWRITE_CONFLICT
                | MergeStrategy::ALLOW_CREATION_CONFLICT
                | MergeStrategy::ALLOW_DELETE_CONFLICT
        );
        assert!(MergeStrategy::OVERWRITE.allows_delete());
        assert!(!MergeStrategy::ERROR.allows_overwrite());
        assert!(!MergeStrategy::DEFAULT.allows_creation());
    }

    #[test]
    fn resolve_only_replaces_default() {
        let fallback = MergeStrategy::OVERWRITE;
        assert_eq!(MergeStrategy::DEFAULT.resolve(fallback), fallback);
        assert_eq!(MergeStrategy::ERROR.resolve(fallback), MergeStrategy::ERROR);
        assert_eq!(
            MergeStrategy::CONTENT_ONLY.resolve(fallback),
            MergeStrategy::CONTENT_ONLY
        );
    }

    #[test]
    fn names_parse_and_display() {
        let parsed: MergeStrategy = "content-only".parse().unwrap();
        assert_eq!(parsed, MergeStrategy::CONTENT_ONLY);
        assert_eq!(MergeStrategy::OVERWRITE.to_string(), "overwrite");
        assert_eq!(
            (MergeStrategy::ALLOW_CREATION_CONFLICT | MergeStrategy::ALLOW_DELETE_CONFLICT)
                .to_string(),
            "flags(0b1100)"
        );
        let err = "lenient".parse::<MergeStrategy>().unwrap_err();
        assert!(err.contains("content-only"));
    }

    #[test]
    fn from_bits_masks_unknown_bits() {
        assert_eq!(MergeStrategy::from_bits(0xff).bits(), 0b1111);
    }
}
