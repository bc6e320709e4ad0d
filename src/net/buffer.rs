// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("invalid buffer size {0}")]
    InvalidSize(usize),
    #[error("resize to {requested} would drop {valid} valid bytes")]
    ResizeTooSmall { requested: usize, valid: usize },
}

/// A contiguous byte region with a read cursor and a fill cursor:
/// `0 <= pos <= end <= cap`. Capacity is fixed at creation and changes only
/// through an explicit [`Buffer::resize`].
///
/// `pos..end` holds unconsumed content, `end..cap` is free space a producer
/// fills through [`Buffer::fill_slice`].
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    pos: usize,
    end: usize,
}

impl Buffer {
    pub fn new(cap: usize) -> Result<Self, BufferError> {
        if cap == 0 {
            return Err(BufferError::InvalidSize(cap));
        }
        Ok(Self { data: vec![0u8; cap], pos: 0, end: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// High-water mark of valid bytes.
    pub fn len(&self) -> usize {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    /// Current read cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining_content_len(&self) -> usize {
        self.end - self.pos
    }

    pub fn remaining_capacity(&self) -> usize {
        self.data.len() - self.end
    }

    /// Unconsumed content, `pos..end`.
    pub fn read_slice(&self) -> &[u8] {
        &self.data[self.pos..self.end]
    }

    /// Free space a producer may fill, `end..cap`. Pair with
    /// [`Buffer::advance_end`] once bytes have landed.
    pub fn fill_slice(&mut self) -> &mut [u8] {
        let end = self.end;
        &mut self.data[end..]
    }

    /// Marks `n` freshly filled bytes as valid content.
    pub fn advance_end(&mut self, n: usize) {
        debug_assert!(self.end + n <= self.data.len());
        self.end = (self.end + n).min(self.data.len());
    }

    /// Consumes `n` bytes of content by advancing the read cursor.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.end);
        self.pos = (self.pos + n).min(self.end);
    }

    /// All-or-nothing copy of `src` into free space.
    pub fn append(&mut self, src: &[u8]) -> bool {
        if src.is_empty() {
            return true;
        }
        if src.len() > self.remaining_capacity() {
            return false;
        }
        let end = self.end;
        self.data[end..end + src.len()].copy_from_slice(src);
        self.end += src.len();
        true
    }

    pub fn clear(&mut self) {
        self.pos = 0;
        self.end = 0;
    }

    /// Returns the valid prefix (`0..end`) and clears the buffer.
    pub fn reset(&mut self) -> Bytes {
        let out = Bytes::copy_from_slice(&self.data[..self.end]);
        self.clear();
        out
    }

    /// Moves unconsumed content to the front, reclaiming the space before
    /// `pos` for the next fill.
    pub fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        self.data.copy_within(self.pos..self.end, 0);
        self.end -= self.pos;
        self.pos = 0;
    }

    /// Grows or shrinks the capacity, preserving valid bytes. Shrinking
    /// below the high-water mark is refused.
    pub fn resize(&mut self, new_cap: usize) -> Result<(), BufferError> {
        if new_cap == 0 {
            return Err(BufferError::InvalidSize(new_cap));
        }
        if new_cap < self.end {
            return Err(BufferError::ResizeTooSmall { requested: new_cap, valid: self.end });
        }
        self.data.resize(new_cap, 0);
        Ok(())
    }

    /// Copy of an arbitrary `start..end` range of the backing region.
    /// Empty or out-of-bounds ranges yield `None` rather than an error.
    pub fn tostring(&self, start: usize, end: usize) -> Option<Bytes> {
        if start >= end || end > self.data.len() {
            return None;
        }
        Some(Bytes::copy_from_slice(&self.data[start..end]))
    }
}
