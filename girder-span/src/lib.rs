use miette::{SourceOffset, SourceSpan};
use std::cmp::{max, min};
use std::fmt;
use std::ops::Range;

/// Compact index of a character in the input that produced an object.
pub type SourcePosition = u32;

/// A span represents a range of characters in an input string.
///
/// It has the same semantics as Rust's x..y range syntax.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Span {
    pub low: SourcePosition,
    pub high: SourcePosition,
}

impl From<Span> for SourceSpan {
    fn from(val: Span) -> Self {
        SourceSpan::new(
            SourceOffset::from(val.low as usize),
            val.high as usize - val.low as usize,
        )
    }
}

impl Span {
    /// Create a new span from the low and high positions.
    pub fn new(range: Range<SourcePosition>) -> Self {
        Self {
            low: range.start,
            high: range.end,
        }
    }

    /// Create a new span from a single position.
    pub fn pos(low: SourcePosition) -> Self {
        Self { low, high: low + 1 }
    }

    pub fn empty() -> Self {
        Self { low: 0, high: 0 }
    }

    /// Get the union of two spans.
    ///
    /// This is equivalent to `min(self.low, other.low)..max(self.high, other.high)`.
    pub fn merge(&self, other: &Self) -> Self {
        let low = min(self.low, other.low);
        let high = max(self.high, other.high);
        Self { low, high }
    }
}

impl From<Range<SourcePosition>> for Span {
    fn from(range: Range<SourcePosition>) -> Self {
        Self::new(range)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.low == 0 && self.high == 0 {
            true => write!(f, "-"),
            false => write!(f, "{}..{}", self.low, self.high),
        }
    }
}
