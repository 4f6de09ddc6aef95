//! Half-open byte ranges and sets of them.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::state::StateError;

/// A half-open interval `[start, end)` of byte offsets within one stream.
///
/// A range is never empty: `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "[usize; 2]", try_from = "[usize; 2]")]
pub struct ByteRange {
    start: usize,
    end: usize,
}

impl ByteRange {
    /// Create a range, if `start < end`.
    pub const fn new(start: usize, end: usize) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Offset of the first byte in the range.
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Offset one past the last byte in the range.
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Number of bytes in the range.
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Whether `other` lies entirely within this range.
    pub const fn covers(&self, other: &ByteRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two ranges share at least one byte.
    pub const fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The part of this range shared with `other`, if any.
    pub fn intersect(&self, other: &ByteRange) -> Option<Self> {
        Self::new(self.start.max(other.start), self.end.min(other.end))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<ByteRange> for [usize; 2] {
    fn from(r: ByteRange) -> Self {
        [r.start, r.end]
    }
}

impl TryFrom<[usize; 2]> for ByteRange {
    type Error = StateError;

    fn try_from([start, end]: [usize; 2]) -> Result<Self, Self::Error> {
        Self::new(start, end).ok_or(StateError::EmptyRange { start, end })
    }
}

/// A sorted set of disjoint byte ranges.
///
/// Ranges in the set never overlap or touch: inserting a range adjacent to
/// an existing one merges the two. Every operation preserves this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<ByteRange>", try_from = "Vec<ByteRange>")]
pub struct RangeSet(Vec<ByteRange>);

impl RangeSet {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a set from ranges that already satisfy the ordering invariant.
    ///
    /// Ranges must be ascending and separated by at least one byte. Nothing
    /// is merged or reordered; a violation is reported instead.
    pub fn from_sorted(ranges: Vec<ByteRange>) -> Result<Self, StateError> {
        for w in ranges.windows(2) {
            if w[0].end >= w[1].start {
                Err(StateError::UnorderedUnprocessed {
                    first: w[0],
                    second: w[1],
                })?;
            }
        }

        Ok(Self(ranges))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ByteRange> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ByteRange] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of disjoint ranges in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether every byte of `range` is in the set.
    pub fn covers(&self, range: &ByteRange) -> bool {
        self.0.iter().any(|r| r.covers(range))
    }

    /// Whether any byte of `range` is in the set.
    pub fn overlaps(&self, range: &ByteRange) -> bool {
        self.0.iter().any(|r| r.overlaps(range))
    }

    /// Add every byte of `range` to the set.
    ///
    /// Returns whether the set changed.
    pub fn insert(&mut self, range: ByteRange) -> bool {
        if self.covers(&range) {
            return false;
        }

        let mut merged = range;
        let mut placed = false;
        let mut out = Vec::with_capacity(self.0.len() + 1);

        for r in core::mem::take(&mut self.0) {
            if placed || r.end < merged.start {
                out.push(r);
            } else if merged.end < r.start {
                out.push(merged);
                out.push(r);
                placed = true;
            } else {
                merged = ByteRange {
                    start: merged.start.min(r.start),
                    end: merged.end.max(r.end),
                };
            }
        }

        if !placed {
            out.push(merged);
        }

        self.0 = out;
        true
    }

    /// Remove every byte of `range` from the set, splitting a containing
    /// range in two if `range` lies in its interior.
    ///
    /// Returns whether the set changed.
    pub fn remove(&mut self, range: ByteRange) -> bool {
        if !self.overlaps(&range) {
            return false;
        }

        let mut out = Vec::with_capacity(self.0.len() + 1);

        for r in core::mem::take(&mut self.0) {
            if !r.overlaps(&range) {
                out.push(r);
                continue;
            }

            out.extend(ByteRange::new(r.start, range.start));
            out.extend(ByteRange::new(range.end, r.end));
        }

        self.0 = out;
        true
    }

    /// The ranges of the set lying within `window`, clipped to it.
    pub fn within(&self, window: ByteRange) -> impl Iterator<Item = ByteRange> + '_ {
        self.0.iter().filter_map(move |r| r.intersect(&window))
    }
}

impl From<RangeSet> for Vec<ByteRange> {
    fn from(set: RangeSet) -> Self {
        set.0
    }
}

impl TryFrom<Vec<ByteRange>> for RangeSet {
    type Error = StateError;

    fn try_from(ranges: Vec<ByteRange>) -> Result<Self, Self::Error> {
        Self::from_sorted(ranges)
    }
}

impl<'a> IntoIterator for &'a RangeSet {
    type Item = &'a ByteRange;
    type IntoIter = core::slice::Iter<'a, ByteRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
