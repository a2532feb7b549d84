//! Source position utilities
//!
//! Offsets are absolute within the coordinate space of the file fragment the
//! node was parsed from.

use serde::{Deserialize, Serialize};

/// Absolute source span for mapping back to source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        TextRange { start, end }
    }

    pub fn empty(offset: usize) -> Self {
        TextRange { start: offset, end: offset }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the range shifted right by `offset`.
    pub fn shift_right(&self, offset: usize) -> Self {
        TextRange { start: self.start + offset, end: self.end + offset }
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn text_of<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}
