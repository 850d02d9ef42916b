//! Offset-anchored edits of one file's content.
//!
//! An [`UpdateBuffer`] holds a file's original bytes and accumulates
//! insertions and removals expressed in *original* offsets, so edits made
//! later never shift the coordinates of edits made earlier.
//!
//! At each offset `o` there are two insertion zones: the zone that ends at
//! `o` (filled by [`UpdateBuffer::insert_left`], appended in call order) and
//! the zone that begins at `o` (filled by [`UpdateBuffer::insert_right`],
//! prepended so the most recent call comes first). Generation emits, for
//! each offset, the left zone, then the right zone, then the original byte.
//!
//! Two implementations share the contract:
//!
//! - [`ChunkBuffer`]: an arena of chunk records split on demand (default).
//! - [`AnchorBuffer`]: one anchor slot per offset plus a removed bitmap.

use std::fmt;
use std::sync::Arc;

use arbor_host::TreePath;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::tree::TreeId;

pub mod anchored;
pub mod chunked;

pub use anchored::AnchorBuffer;
pub use chunked::ChunkBuffer;

/// UTF-8 byte order mark.
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ---------------------------------------------------------------------------
// UpdateBuffer
// ---------------------------------------------------------------------------

/// An edit buffer over immutable original content.
///
/// All offsets are positions in the original content, `0..=len()`.
pub trait UpdateBuffer: fmt::Debug + Send + Sync {
    /// The unmodified content.
    fn original(&self) -> &[u8];

    /// Length of the original content.
    fn len(&self) -> usize {
        self.original().len()
    }

    /// Returns `true` if the original content is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `bytes` to the zone that ends at `offset`.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfBound`] if `offset > len()`.
    fn insert_left(&mut self, offset: usize, bytes: &[u8], essential: bool)
    -> Result<(), TreeError>;

    /// Prepend `bytes` to the zone that begins at `offset`.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfBound`] if `offset > len()`.
    fn insert_right(
        &mut self,
        offset: usize,
        bytes: &[u8],
        essential: bool,
    ) -> Result<(), TreeError>;

    /// Remove original bytes `[offset, offset + len)` together with every
    /// insertion anchored strictly inside that range.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfBound`] if the range leaves the
    /// content, or [`TreeError::ContentCannotBeRemoved`] (changing nothing)
    /// if an essential insertion would be discarded.
    fn remove(&mut self, offset: usize, len: usize) -> Result<(), TreeError>;

    /// Produce the edited content.
    fn generate(&self) -> Vec<u8>;
}

pub(crate) fn check_offset(index: usize, max: usize) -> Result<(), TreeError> {
    if index > max {
        return Err(TreeError::IndexOutOfBound {
            index,
            min: 0,
            max,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// BufferKind
// ---------------------------------------------------------------------------

/// Which [`UpdateBuffer`] implementation a tree hands out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    /// [`ChunkBuffer`].
    #[default]
    Chunked,
    /// [`AnchorBuffer`].
    Anchored,
}

impl BufferKind {
    /// Build an empty buffer of this kind over `original`.
    #[must_use]
    pub fn create(self, original: Arc<[u8]>) -> Box<dyn UpdateBuffer> {
        match self {
            Self::Chunked => Box::new(ChunkBuffer::new(original)),
            Self::Anchored => Box::new(AnchorBuffer::new(original)),
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunked => f.write_str("chunked"),
            Self::Anchored => f.write_str("anchored"),
        }
    }
}

// ---------------------------------------------------------------------------
// UpdateRecorder
// ---------------------------------------------------------------------------

/// A pending edit of one file, opened by
/// [`Tree::begin_update`](crate::tree::Tree::begin_update).
///
/// The recorder snapshots the file's content and remembers which tree opened
/// it. A leading UTF-8 BOM is kept in the output but hidden from offsets:
/// offset `0` is the first byte after the BOM.
///
/// Mutating methods return `&mut Self` so edits chain with `?`:
///
/// ```ignore
/// recorder.insert_left(0, "// generated\n")?.remove(10, 4)?;
/// ```
#[derive(Debug)]
pub struct UpdateRecorder {
    tree: TreeId,
    path: TreePath,
    bom: usize,
    buffer: Box<dyn UpdateBuffer>,
}

impl UpdateRecorder {
    /// Open a recorder over `original`.
    #[must_use]
    pub fn new(tree: TreeId, path: TreePath, original: Arc<[u8]>, kind: BufferKind) -> Self {
        let bom = if original.starts_with(UTF8_BOM) {
            UTF8_BOM.len()
        } else {
            0
        };
        Self {
            tree,
            path,
            bom,
            buffer: kind.create(original),
        }
    }

    /// The file being edited.
    #[must_use]
    pub const fn path(&self) -> &TreePath {
        &self.path
    }

    /// The same recorder addressed by another path (views translate
    /// coordinates on the way in and out).
    #[must_use]
    pub(crate) fn relocated(mut self, path: TreePath) -> Self {
        self.path = path;
        self
    }

    /// The tree that opened this recorder.
    #[must_use]
    pub const fn tree_id(&self) -> TreeId {
        self.tree
    }

    /// The content snapshot, BOM included.
    #[must_use]
    pub fn original(&self) -> &[u8] {
        self.buffer.original()
    }

    /// Returns `true` if the snapshot starts with a UTF-8 BOM.
    #[must_use]
    pub const fn has_bom(&self) -> bool {
        self.bom > 0
    }

    /// Length of the editable content (after any BOM).
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len() - self.bom
    }

    /// Returns `true` if there is no editable content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shift(&self, offset: usize) -> Result<usize, TreeError> {
        check_offset(offset, self.len())?;
        Ok(offset + self.bom)
    }

    /// Insert to the left of `offset`.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfBound`] for offsets past the end.
    pub fn insert_left(&mut self, offset: usize, bytes: impl AsRef<[u8]>) -> Result<&mut Self, TreeError> {
        let at = self.shift(offset)?;
        self.buffer.insert_left(at, bytes.as_ref(), false)?;
        Ok(self)
    }

    /// Insert to the right of `offset`.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfBound`] for offsets past the end.
    pub fn insert_right(&mut self, offset: usize, bytes: impl AsRef<[u8]>) -> Result<&mut Self, TreeError> {
        let at = self.shift(offset)?;
        self.buffer.insert_right(at, bytes.as_ref(), false)?;
        Ok(self)
    }

    /// Like [`insert_left`](Self::insert_left), but later removals may not
    /// discard the insertion.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfBound`] for offsets past the end.
    pub fn insert_left_essential(
        &mut self,
        offset: usize,
        bytes: impl AsRef<[u8]>,
    ) -> Result<&mut Self, TreeError> {
        let at = self.shift(offset)?;
        self.buffer.insert_left(at, bytes.as_ref(), true)?;
        Ok(self)
    }

    /// Like [`insert_right`](Self::insert_right), but later removals may not
    /// discard the insertion.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfBound`] for offsets past the end.
    pub fn insert_right_essential(
        &mut self,
        offset: usize,
        bytes: impl AsRef<[u8]>,
    ) -> Result<&mut Self, TreeError> {
        let at = self.shift(offset)?;
        self.buffer.insert_right(at, bytes.as_ref(), true)?;
        Ok(self)
    }

    /// Remove `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfBound`] if the range leaves the content
    /// or [`TreeError::ContentCannotBeRemoved`] if it covers an essential
    /// insertion.
    pub fn remove(&mut self, offset: usize, len: usize) -> Result<&mut Self, TreeError> {
        let at = self.shift(offset)?;
        check_offset(offset.saturating_add(len), self.len())?;
        self.buffer.remove(at, len).map_err(|err| match err {
            TreeError::ContentCannotBeRemoved { .. } => TreeError::ContentCannotBeRemoved { offset },
            other => other,
        })?;
        Ok(self)
    }

    /// The edited content, BOM included.
    #[must_use]
    pub fn generate(&self) -> Vec<u8> {
        self.buffer.generate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
