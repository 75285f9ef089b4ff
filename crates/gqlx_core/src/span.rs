//! Source spans and line/column lookup.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A span in source code, represented as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Creates an empty span at a position.
    #[must_use]
    #[inline]
    pub const fn empty(pos: u32) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Returns the length of this span in bytes.
    #[must_use]
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns a span that covers both spans.
    #[must_use]
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<std::ops::Range<u32>> for Span {
    fn from(range: std::ops::Range<u32>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start as usize..span.end as usize
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::new(
            miette::SourceOffset::from(span.start as usize),
            (span.end - span.start) as usize,
        )
    }
}

/// A 1-based line and column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineColumn {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets of one source text to line/column positions.
///
/// Columns count characters, not bytes, so multi-byte text before a node
/// does not skew the reported column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset at which each line starts.
    line_starts: Vec<u32>,
    /// Start offsets of multi-byte characters, paired with their width.
    wide_chars: Vec<(u32, u32)>,
}

impl LineIndex {
    /// Builds the index for a source text.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        let mut wide_chars = Vec::new();

        for (offset, c) in source.char_indices() {
            let offset = offset as u32;
            if c == '\n' {
                line_starts.push(offset + 1);
            }
            let width = c.len_utf8() as u32;
            if width > 1 {
                wide_chars.push((offset, width));
            }
        }

        Self {
            line_starts,
            wide_chars,
        }
    }

    /// Returns true if the index was built from no source at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_starts.is_empty()
    }

    /// Converts a byte offset into a line/column position.
    #[must_use]
    pub fn line_column(&self, offset: u32) -> Option<LineColumn> {
        if self.line_starts.is_empty() {
            return None;
        }

        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];

        // Every multi-byte character between the line start and the offset
        // occupies more than one byte but only one column.
        let extra: u32 = self
            .wide_chars
            .iter()
            .filter(|(pos, _)| *pos >= line_start && *pos < offset)
            .map(|(_, width)| width - 1)
            .sum();

        Some(LineColumn {
            line: line as u32 + 1,
            column: offset - line_start - extra + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_new() {
        let span = Span::new(10, 20);
        assert_eq!(span.start, 10);
        assert_eq!(span.end, 20);
        assert_eq!(span.len(), 10);
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(10, 20);
        let b = Span::new(15, 30);
        let merged = a.merge(b);
        assert_eq!(merged.start, 10);
        assert_eq!(merged.end, 30);
    }

    #[test]
    fn test_line_column() {
        let index = LineIndex::new("{\n  name\n}");

        assert_eq!(
            index.line_column(0),
            Some(LineColumn { line: 1, column: 1 })
        );
        assert_eq!(
            index.line_column(4),
            Some(LineColumn { line: 2, column: 3 })
        );
        assert_eq!(
            index.line_column(9),
            Some(LineColumn { line: 3, column: 1 })
        );
    }

    #[test]
    fn test_line_column_multibyte() {
        // "é" is two bytes wide
        let index = LineIndex::new("\"é\" name");
        assert_eq!(
            index.line_column(5),
            Some(LineColumn { line: 1, column: 5 })
        );
    }

    #[test]
    fn test_default_index_has_no_positions() {
        let index = LineIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.line_column(3), None);
    }
}
