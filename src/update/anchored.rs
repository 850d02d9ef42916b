//! Per-offset anchor slots.
//!
//! Every offset `0..=len` owns one [`Anchor`] holding the insertions made
//! to its left and right. Removal of original bytes is tracked in a bitmap.
//! Memory is proportional to the content length, so this buffer suits
//! small files edited in many places.

use std::sync::Arc;

use super::{UpdateBuffer, check_offset};
use crate::error::TreeError;

#[derive(Clone, Debug, Default)]
struct Anchor {
    left: Vec<u8>,
    right: Vec<u8>,
    left_essential: bool,
    right_essential: bool,
}

impl Anchor {
    const fn is_essential(&self) -> bool {
        self.left_essential || self.right_essential
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The alternate [`UpdateBuffer`].
#[derive(Clone, Debug)]
pub struct AnchorBuffer {
    original: Arc<[u8]>,
    anchors: Vec<Anchor>,
    removed: Vec<bool>,
}

impl AnchorBuffer {
    /// A buffer with no edits over `original`.
    #[must_use]
    pub fn new(original: Arc<[u8]>) -> Self {
        let len = original.len();
        Self {
            original,
            anchors: vec![Anchor::default(); len + 1],
            removed: vec![false; len],
        }
    }
}

impl UpdateBuffer for AnchorBuffer {
    fn original(&self) -> &[u8] {
        &self.original
    }

    fn insert_left(&mut self, offset: usize, bytes: &[u8], essential: bool) -> Result<(), TreeError> {
        check_offset(offset, self.len())?;
        let anchor = &mut self.anchors[offset];
        anchor.left.extend_from_slice(bytes);
        anchor.left_essential |= essential;
        Ok(())
    }

    fn insert_right(&mut self, offset: usize, bytes: &[u8], essential: bool) -> Result<(), TreeError> {
        check_offset(offset, self.len())?;
        let anchor = &mut self.anchors[offset];
        anchor.right.splice(0..0, bytes.iter().copied());
        anchor.right_essential |= essential;
        Ok(())
    }

    fn remove(&mut self, offset: usize, len: usize) -> Result<(), TreeError> {
        check_offset(offset, self.len())?;
        let end = offset.saturating_add(len);
        check_offset(end, self.len())?;
        if len == 0 {
            return Ok(());
        }

        let inner = offset + 1..end;
        if self.anchors[inner.clone()].iter().any(Anchor::is_essential) {
            return Err(TreeError::ContentCannotBeRemoved { offset });
        }
        self.anchors[inner].iter_mut().for_each(Anchor::clear);
        self.removed[offset..end].fill(true);
        Ok(())
    }

    fn generate(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.original.len());
        for (offset, anchor) in self.anchors.iter().enumerate() {
            out.extend_from_slice(&anchor.left);
            out.extend_from_slice(&anchor.right);
            if let Some(&byte) = self.original.get(offset)
                && !self.removed[offset]
            {
                out.push(byte);
            }
        }
        out
    }
}
