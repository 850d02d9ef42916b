//! Arena-backed chunk list.
//!
//! The original content is covered by a singly linked list of chunks,
//! each owning an original range `[start, end)` plus the insertion zone
//! before it (`left`) and after it (`right`). Chunks live in a `Vec` and
//! link by index; splitting allocates a new index and never moves existing
//! chunks. Two zero-width sentinels bracket the list so that every offset,
//! `0` and `len` included, sits between two chunks.

use std::sync::Arc;

use super::{UpdateBuffer, check_offset};
use crate::error::TreeError;

#[derive(Clone, Debug, Default)]
struct Zone {
    bytes: Vec<u8>,
    essential: bool,
    removed: bool,
}

impl Zone {
    fn append(&mut self, bytes: &[u8], essential: bool) {
        self.revive();
        self.bytes.extend_from_slice(bytes);
        self.essential |= essential;
    }

    fn prepend(&mut self, bytes: &[u8], essential: bool) {
        self.revive();
        self.bytes.splice(0..0, bytes.iter().copied());
        self.essential |= essential;
    }

    fn revive(&mut self) {
        if self.removed {
            self.removed = false;
            self.bytes.clear();
        }
    }

    const fn is_essential(&self) -> bool {
        self.essential && !self.removed
    }

    fn remove(&mut self) {
        self.removed = true;
        self.essential = false;
        self.bytes.clear();
    }
}

#[derive(Clone, Debug)]
struct Chunk {
    start: usize,
    end: usize,
    left: Zone,
    right: Zone,
    content_removed: bool,
    next: Option<usize>,
}

impl Chunk {
    fn new(start: usize, end: usize, next: Option<usize>) -> Self {
        Self {
            start,
            end,
            left: Zone::default(),
            right: Zone::default(),
            content_removed: false,
            next,
        }
    }
}

/// The default [`UpdateBuffer`].
#[derive(Clone, Debug)]
pub struct ChunkBuffer {
    original: Arc<[u8]>,
    chunks: Vec<Chunk>,
}

const HEAD: usize = 0;

impl ChunkBuffer {
    /// A buffer with no edits over `original`.
    #[must_use]
    pub fn new(original: Arc<[u8]>) -> Self {
        let len = original.len();
        let chunks = if len == 0 {
            vec![Chunk::new(0, 0, Some(1)), Chunk::new(0, 0, None)]
        } else {
            vec![
                Chunk::new(0, 0, Some(1)),
                Chunk::new(0, len, Some(2)),
                Chunk::new(len, len, None),
            ]
        };
        Self { original, chunks }
    }

    /// Number of chunk records allocated so far, sentinels included.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Return the pair of chunks that meet at `offset`, splitting if needed.
    fn slice(&mut self, offset: usize) -> (usize, usize) {
        let mut idx = HEAD;
        loop {
            let chunk = &self.chunks[idx];
            let Some(next) = chunk.next else {
                // Only reachable for offset > len, which callers reject.
                return (idx, idx);
            };
            if chunk.end == offset && self.chunks[next].start == offset {
                return (idx, next);
            }
            if chunk.start < offset && offset < chunk.end {
                return (idx, self.split(idx, offset));
            }
            idx = next;
        }
    }

    fn split(&mut self, idx: usize, offset: usize) -> usize {
        let new_idx = self.chunks.len();
        let chunk = &mut self.chunks[idx];
        let mut tail = Chunk::new(offset, chunk.end, chunk.next);
        tail.right = std::mem::take(&mut chunk.right);
        tail.content_removed = chunk.content_removed;
        chunk.end = offset;
        chunk.next = Some(new_idx);
        self.chunks.push(tail);
        new_idx
    }

    /// Indexes of the chunks covering `[offset, end)` in list order.
    fn covering(&mut self, offset: usize, end: usize) -> (Vec<usize>, usize) {
        let (_, first) = self.slice(offset);
        let (_, last) = self.slice(end);
        let mut span = Vec::new();
        let mut idx = Some(first);
        while let Some(i) = idx {
            if i == last {
                break;
            }
            span.push(i);
            idx = self.chunks[i].next;
        }
        (span, last)
    }
}

impl UpdateBuffer for ChunkBuffer {
    fn original(&self) -> &[u8] {
        &self.original
    }

    fn insert_left(&mut self, offset: usize, bytes: &[u8], essential: bool) -> Result<(), TreeError> {
        check_offset(offset, self.len())?;
        let (before, _) = self.slice(offset);
        self.chunks[before].right.append(bytes, essential);
        Ok(())
    }

    fn insert_right(&mut self, offset: usize, bytes: &[u8], essential: bool) -> Result<(), TreeError> {
        check_offset(offset, self.len())?;
        let (_, after) = self.slice(offset);
        self.chunks[after].left.prepend(bytes, essential);
        Ok(())
    }

    fn remove(&mut self, offset: usize, len: usize) -> Result<(), TreeError> {
        check_offset(offset, self.len())?;
        let end = offset.saturating_add(len);
        check_offset(end, self.len())?;
        if len == 0 {
            return Ok(());
        }

        let (span, last) = self.covering(offset, end);
        let inner_left = |chunk: &Chunk| chunk.start > offset;
        let inner_right = |chunk: &Chunk| chunk.next != Some(last);

        for &i in &span {
            let chunk = &self.chunks[i];
            if (inner_left(chunk) && chunk.left.is_essential())
                || (inner_right(chunk) && chunk.right.is_essential())
            {
                return Err(TreeError::ContentCannotBeRemoved { offset });
            }
        }
        for &i in &span {
            let (left, right) = {
                let chunk = &self.chunks[i];
                (inner_left(chunk), inner_right(chunk))
            };
            let chunk = &mut self.chunks[i];
            chunk.content_removed = true;
            if left {
                chunk.left.remove();
            }
            if right {
                chunk.right.remove();
            }
        }
        Ok(())
    }

    fn generate(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.original.len());
        let mut idx = Some(HEAD);
        while let Some(i) = idx {
            let chunk = &self.chunks[i];
            if !chunk.left.removed {
                out.extend_from_slice(&chunk.left.bytes);
            }
            if !chunk.content_removed {
                out.extend_from_slice(&self.original[chunk.start..chunk.end]);
            }
            if !chunk.right.removed {
                out.extend_from_slice(&chunk.right.bytes);
            }
            idx = chunk.next;
        }
        out
    }
}
