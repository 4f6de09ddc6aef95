//! Resumable parsing state.
//!
//! A [`ParserState`] is the only value that must survive between parsing
//! sessions. Given the same stream content, it fully determines which
//! records remain to be emitted. Its serialized form is
//!
//! ```json
//! { "unprocessed": [[start, end], ...],
//!   "in_process":  [[start, end, total, emitted], ...] }
//! ```
//!
//! with both lists ascending. Persisting it is up to the application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::range::{ByteRange, RangeSet};

/// An error loading or replacing a parser state.
#[derive(Debug, Error)]
pub enum StateError {
    /// A range whose end does not lie after its start.
    #[error("Range [{start}, {end}) is empty.")]
    EmptyRange { start: usize, end: usize },
    /// Unprocessed ranges out of order, overlapping or touching.
    #[error("Unprocessed ranges {first} and {second} are not ascending and disjoint.")]
    UnorderedUnprocessed { first: ByteRange, second: ByteRange },
    /// In-process frames out of order or overlapping.
    #[error("In-process frames {first} and {second} are not ascending and disjoint.")]
    UnorderedInProcess { first: ByteRange, second: ByteRange },
    /// An in-process frame also tracked as unprocessed.
    #[error("In-process frame {0} overlaps an unprocessed range.")]
    DoubleCounted(ByteRange),
    /// An in-process frame with no records left to emit.
    #[error("In-process frame {range} has emitted {emitted} of {total} records.")]
    Exhausted {
        range: ByteRange,
        total: usize,
        emitted: usize,
    },
    /// A malformed serialized state.
    #[error("Malformed state: {0}.")]
    Json(#[from] serde_json::Error),
}

/// A located, verified frame with records still to be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "[usize; 4]", try_from = "[usize; 4]")]
pub struct InProcessFrame {
    range: ByteRange,
    total: usize,
    emitted: usize,
}

impl InProcessFrame {
    /// Create a frame with records still to be emitted.
    ///
    /// Returns `None` unless `emitted < total`.
    pub const fn new(range: ByteRange, total: usize, emitted: usize) -> Option<Self> {
        if emitted < total {
            Some(Self {
                range,
                total,
                emitted,
            })
        } else {
            None
        }
    }

    /// Bytes of the whole frame, from marker to trailer.
    pub const fn range(&self) -> ByteRange {
        self.range
    }

    /// Number of sub-records in the frame.
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Number of sub-records already decoded.
    pub const fn emitted(&self) -> usize {
        self.emitted
    }

    /// Count one more sub-record as decoded.
    ///
    /// Returns the successor frame, or `None` once every sub-record has been
    /// decoded and the frame should be forgotten.
    pub const fn advance(self) -> Option<Self> {
        Self::new(self.range, self.total, self.emitted + 1)
    }
}

impl From<InProcessFrame> for [usize; 4] {
    fn from(f: InProcessFrame) -> Self {
        [f.range.start(), f.range.end(), f.total, f.emitted]
    }
}

impl TryFrom<[usize; 4]> for InProcessFrame {
    type Error = StateError;

    fn try_from([start, end, total, emitted]: [usize; 4]) -> Result<Self, Self::Error> {
        let range = ByteRange::try_from([start, end])?;
        Self::new(range, total, emitted).ok_or(StateError::Exhausted {
            range,
            total,
            emitted,
        })
    }
}

/// Unprocessed ranges and in-process frames of a stream.
///
/// No byte is ever both unprocessed and in-process. Bytes in neither set
/// are resolved: they belonged to a fully extracted frame or a skipped
/// corrupt header, and will never be examined again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StateRepr")]
pub struct ParserState {
    unprocessed: RangeSet,
    in_process: Vec<InProcessFrame>,
}

#[derive(Deserialize)]
struct StateRepr {
    unprocessed: RangeSet,
    in_process: Vec<InProcessFrame>,
}

impl TryFrom<StateRepr> for ParserState {
    type Error = StateError;

    fn try_from(repr: StateRepr) -> Result<Self, Self::Error> {
        Self::new(repr.unprocessed, repr.in_process)
    }
}

impl ParserState {
    /// State for a stream of `len` bytes that has never been parsed.
    pub fn fresh(len: usize) -> Self {
        let mut unprocessed = RangeSet::new();
        if let Some(r) = ByteRange::new(0, len) {
            unprocessed.insert(r);
        }

        Self {
            unprocessed,
            in_process: Vec::new(),
        }
    }

    /// Assemble a state, rejecting any violation of its invariants.
    ///
    /// Overlapping in-process frames are refused rather than repaired, as
    /// there is no way to know which of them (if either) is correct.
    pub fn new(unprocessed: RangeSet, in_process: Vec<InProcessFrame>) -> Result<Self, StateError> {
        for w in in_process.windows(2) {
            if w[0].range.end() > w[1].range.start() {
                Err(StateError::UnorderedInProcess {
                    first: w[0].range,
                    second: w[1].range,
                })?;
            }
        }

        if let Some(f) = in_process.iter().find(|f| unprocessed.overlaps(&f.range)) {
            Err(StateError::DoubleCounted(f.range))?;
        }

        Ok(Self {
            unprocessed,
            in_process,
        })
    }

    pub fn from_json(s: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn unprocessed(&self) -> &RangeSet {
        &self.unprocessed
    }

    /// Located frames, ascending by start offset.
    pub fn in_process(&self) -> &[InProcessFrame] {
        &self.in_process
    }

    /// Whether nothing remains to be scanned or extracted.
    pub fn is_settled(&self) -> bool {
        self.unprocessed.is_empty() && self.in_process.is_empty()
    }

    /// Remove a range from the unprocessed set.
    ///
    /// Returns whether the state changed.
    pub fn mark_resolved(&mut self, range: ByteRange) -> bool {
        self.unprocessed.remove(range)
    }

    /// Return a range to the unprocessed set.
    ///
    /// Bytes belonging to an in-process frame are left alone, so they are
    /// never counted twice. Returns whether the state changed.
    pub fn mark_unprocessed(&mut self, range: ByteRange) -> bool {
        let mut changed = false;
        let mut rest = Some(range);

        for f in &self.in_process {
            let Some(r) = rest else { break };

            if f.range.end() <= r.start() {
                continue;
            }

            if let Some(below) = ByteRange::new(r.start(), f.range.start().min(r.end())) {
                changed |= self.unprocessed.insert(below);
            }
            rest = ByteRange::new(f.range.end().max(r.start()), r.end());
        }

        if let Some(r) = rest {
            changed |= self.unprocessed.insert(r);
        }

        changed
    }

    /// Record that the stream grew from `old_end` to `new_end` bytes.
    ///
    /// The new bytes join (or extend) the trailing unprocessed range. The
    /// previous length is not part of the persisted state, so the caller
    /// supplies it. Returns whether the state changed.
    pub fn extend(&mut self, old_end: usize, new_end: usize) -> bool {
        match ByteRange::new(old_end, new_end) {
            Some(r) => self.mark_unprocessed(r),
            None => false,
        }
    }

    /// Move a verified frame out of the unprocessed set and into the
    /// in-process list.
    ///
    /// A frame with no sub-records is resolved outright.
    pub fn locate(&mut self, range: ByteRange, total: usize) {
        self.unprocessed.remove(range);

        if let Some(frame) = InProcessFrame::new(range, total, 0) {
            let i = self
                .in_process
                .partition_point(|f| f.range.start() < range.start());
            self.in_process.insert(i, frame);
        }
    }

    /// The in-process frame with the lowest start offset.
    pub fn earliest(&self) -> Option<&InProcessFrame> {
        self.in_process.first()
    }

    /// Replace the earliest in-process frame with its successor, forgetting
    /// it if there is none.
    pub fn settle_earliest(&mut self, successor: Option<InProcessFrame>) {
        match successor {
            Some(frame) => {
                if let Some(first) = self.in_process.first_mut() {
                    *first = frame;
                }
            }
            None => {
                if !self.in_process.is_empty() {
                    self.in_process.remove(0);
                }
            }
        }
    }
}
