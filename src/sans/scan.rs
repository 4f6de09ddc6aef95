//! Locating and classifying frames.
//!
//! A [`FrameScanner`] walks an unprocessed range from left to right, looking
//! for the start marker of any configured frame type. Each match is
//! classified:
//!
//! - **Incomplete**: the frame runs past the bytes available so far. The
//!   rest of the range is left for a later scan, once more bytes arrive.
//!
//! - **Corrupt**: the length field, trailer or checksum is bad. Only the
//!   header span is resolved, so scanning continues immediately after it.
//!
//! - **Placeholder**: the frame failed to verify, and a block of whole
//!   sub-records at the start or end of its payload is nothing but fill
//!   bytes. It is left unresolved, so a later scan of a completed copy of the
//!   stream can still find a valid frame at the same offset.
//!
//! - **Valid**: the frame verified and is ready for extraction.

use core::ops::Range;

use thiserror::Error;
use zerocopy::{
    FromBytes,
    byteorder::{BigEndian, LittleEndian, U16, U32, U64},
};

use super::{
    range::ByteRange,
    schema::{ChecksumScope, Endian, FrameSchema, LengthEncoding, LengthUnit, ParserConfig},
};

/// A non-fatal error in one frame.
///
/// Frame errors never stop parsing: each is reported once, and parsing
/// continues past the offending bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Calculated and found checksum values do not match.
    #[error(
        "Frame `{frame_type}` at {offset}: calculated ({calculated:#06x}) and found ({found:#06x}) checksums do not match."
    )]
    Checksum {
        offset: usize,
        frame_type: String,
        found: u16,
        calculated: u16,
    },
    /// The bytes closing the frame are not its trailer.
    #[error("Frame `{frame_type}` at {offset}: malformed trailer.")]
    Trailer { offset: usize, frame_type: String },
    /// The length field cannot describe a frame of this type.
    #[error("Frame `{frame_type}` at {offset}: malformed length ({reason}).")]
    Length {
        offset: usize,
        frame_type: String,
        reason: &'static str,
    },
    /// A previously located frame no longer verifies.
    #[error("Frame at {offset} no longer matches its recorded layout.")]
    Stale { offset: usize },
}

impl FrameError {
    /// Offset of the start of the frame in error.
    pub fn offset(&self) -> usize {
        match self {
            Self::Checksum { offset, .. }
            | Self::Trailer { offset, .. }
            | Self::Length { offset, .. }
            | Self::Stale { offset } => *offset,
        }
    }
}

/// The outcome of examining part of an unprocessed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A valid frame of `total` sub-records.
    Located {
        range: ByteRange,
        schema: usize,
        total: usize,
    },
    /// A corrupt frame; `span` (its header) should be resolved.
    Corrupt { span: ByteRange, error: FrameError },
    /// A frame holding fill bytes, left unresolved.
    Placeholder { range: ByteRange, schema: usize },
    /// A frame running past the available bytes, at `offset`.
    Incomplete { offset: usize, schema: usize },
}

/// A verified frame within a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Index of the frame's schema in the configuration.
    pub schema: usize,
    /// Bytes of the whole frame, relative to the buffer.
    pub bytes: Range<usize>,
    /// Bytes of the payload, relative to the buffer.
    pub payload: Range<usize>,
    /// Number of sub-records in the payload.
    pub total: usize,
}

/// Classification of one marker match.
enum Candidate {
    Incomplete,
    Corrupt(usize, FrameError),
    Placeholder(usize),
    Valid(Frame),
}

/// Finds frames of the configured types.
#[derive(Debug, Clone)]
pub struct FrameScanner {
    schemas: Vec<FrameSchema>,
}

impl FrameScanner {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            schemas: config.frame_types.clone(),
        }
    }

    pub fn schemas(&self) -> &[FrameSchema] {
        &self.schemas
    }

    /// Scan the bytes of one unprocessed range.
    ///
    /// `r` holds the bytes of `range` that are currently available, and
    /// `open` indicates whether the range reaches the end of the available
    /// bytes (so that frames running past it may yet be completed).
    pub fn scan_range(&self, r: &[u8], range: ByteRange, open: bool) -> Vec<ScanEvent> {
        let base = range.start();
        let mut events = Vec::new();
        let mut i = 0;

        while let Some((p, schema)) = self.find_marker(r, i) {
            let absolute = |a: usize, b: usize| ByteRange::new(base + a, base + b);

            match self.classify(r, p, schema, base) {
                // Bounded by tracked bytes, the match cannot be a frame.
                Candidate::Incomplete if !open => i = p + 1,
                Candidate::Incomplete => {
                    events.push(ScanEvent::Incomplete {
                        offset: base + p,
                        schema,
                    });
                    break;
                }
                Candidate::Corrupt(span_end, error) => {
                    if let Some(span) = absolute(p, span_end) {
                        events.push(ScanEvent::Corrupt { span, error });
                    }
                    i = span_end;
                }
                Candidate::Placeholder(end) => {
                    if let Some(range) = absolute(p, end) {
                        events.push(ScanEvent::Placeholder { range, schema });
                    }
                    i = end;
                }
                Candidate::Valid(frame) => {
                    if let Some(range) = absolute(frame.bytes.start, frame.bytes.end) {
                        events.push(ScanEvent::Located {
                            range,
                            schema,
                            total: frame.total,
                        });
                    }
                    i = frame.bytes.end;
                }
            }
        }

        events
    }

    /// Verify the frame occupying all of `r`, which starts at `offset` in
    /// the stream.
    pub fn frame_at(&self, r: &[u8], offset: usize) -> Result<Frame, FrameError> {
        let stale = FrameError::Stale { offset };

        let schema = self
            .schemas
            .iter()
            .enumerate()
            .filter(|(_, s)| r.starts_with(&s.marker))
            .max_by_key(|(i, s)| (s.marker.len(), core::cmp::Reverse(*i)))
            .map(|(i, _)| i)
            .ok_or(stale.clone())?;

        match self.classify(r, 0, schema, offset) {
            Candidate::Valid(frame) if frame.bytes.end == r.len() => Ok(frame),
            Candidate::Corrupt(_, error) => Err(error),
            _ => Err(stale),
        }
    }

    /// Find the earliest marker at or after `from`.
    ///
    /// When several markers match at one offset, the longest wins, then the
    /// first declared.
    fn find_marker(&self, r: &[u8], from: usize) -> Option<(usize, usize)> {
        (from..r.len()).find_map(|p| {
            let mut best: Option<(usize, usize)> = None;

            for (i, s) in self.schemas.iter().enumerate() {
                if r[p..].starts_with(&s.marker)
                    && best.is_none_or(|(_, len)| s.marker.len() > len)
                {
                    best = Some((i, s.marker.len()));
                }
            }

            best.map(|(i, _)| (p, i))
        })
    }

    /// Classify a marker match of schema `k` at `p`.
    fn classify(&self, r: &[u8], p: usize, k: usize, base: usize) -> Candidate {
        let s = &self.schemas[k];
        let offset = base + p;
        let header_end = p + s.header_len;

        let corrupt = |error| Candidate::Corrupt(header_end.min(r.len()), error);
        let length_error = |reason| {
            corrupt(FrameError::Length {
                offset,
                frame_type: s.name.clone(),
                reason,
            })
        };

        if header_end > r.len() {
            return Candidate::Incomplete;
        }

        let field = &r[p + s.length.offset..p + s.length.offset + s.length.encoding.width()];
        let Some(value) = read_length(field, s.length.encoding) else {
            return length_error("unreadable");
        };

        let width = s.record.width;
        let (payload_len, total) = match s.length.unit {
            LengthUnit::Payload => (value, value / width),
            LengthUnit::Frame => match value.checked_sub(s.overhead()) {
                Some(len) => (len, len / width),
                None => return length_error("shorter than its header"),
            },
            LengthUnit::Records => match value.checked_mul(width) {
                Some(len) => (len, value),
                None => return length_error("too many records"),
            },
        };

        if payload_len % width != 0 {
            return length_error("not a whole number of records");
        }

        let frame_len = match payload_len.checked_add(s.overhead()) {
            Some(len) if s.max_len.is_none_or(|max| len <= max) => len,
            _ => return length_error("too long"),
        };

        // Keep absolute offsets representable.
        if base.checked_add(p).and_then(|o| o.checked_add(frame_len)).is_none() {
            return length_error("too long");
        }

        if frame_len > r.len() - p {
            return Candidate::Incomplete;
        }
        let end = p + frame_len;

        let payload = header_end..header_end + payload_len;
        let checksum = payload.end..payload.end + s.checksum_width();
        let trailer = checksum.end..end;

        let mut error = None;

        if let Some(c) = &s.checksum {
            let covered = match c.scope {
                ChecksumScope::Payload => &r[payload.clone()],
                ChecksumScope::Frame => &r[p..payload.end],
            };

            let calculated = c.algorithm.compute(covered);
            let found = read_checksum(&r[checksum], c.endian);

            if found != calculated {
                error = Some(FrameError::Checksum {
                    offset,
                    frame_type: s.name.clone(),
                    found,
                    calculated,
                });
            }
        }

        if error.is_none() && r[trailer] != s.trailer[..] {
            error = Some(FrameError::Trailer {
                offset,
                frame_type: s.name.clone(),
            });
        }

        let filled = s
            .fill
            .is_some_and(|f| is_filled(&r[payload.clone()], width, f.byte, f.min_run));

        match error {
            None if s.checksum.is_none() && filled => Candidate::Placeholder(end),
            None => Candidate::Valid(Frame {
                schema: k,
                bytes: p..end,
                payload,
                total,
            }),
            Some(_) if filled => Candidate::Placeholder(end),
            Some(error) => corrupt(error),
        }
    }
}

/// Read a length field.
fn read_length(r: &[u8], encoding: LengthEncoding) -> Option<usize> {
    let value = match encoding {
        LengthEncoding::Binary { endian, .. } => read_unsigned(r, endian)?,
        LengthEncoding::HexAscii { .. } => read_hex(r)?,
    };

    usize::try_from(value).ok()
}

/// Read an unsigned binary integer of 1, 2, 4 or 8 bytes.
fn read_unsigned(r: &[u8], endian: Endian) -> Option<u64> {
    let value = match (r.len(), endian) {
        (1, _) => r[0].into(),
        (2, Endian::Big) => U16::<BigEndian>::read_from_bytes(r).ok()?.get().into(),
        (2, Endian::Little) => U16::<LittleEndian>::read_from_bytes(r).ok()?.get().into(),
        (4, Endian::Big) => U32::<BigEndian>::read_from_bytes(r).ok()?.get().into(),
        (4, Endian::Little) => U32::<LittleEndian>::read_from_bytes(r).ok()?.get().into(),
        (8, Endian::Big) => U64::<BigEndian>::read_from_bytes(r).ok()?.get(),
        (8, Endian::Little) => U64::<LittleEndian>::read_from_bytes(r).ok()?.get(),
        _ => return None,
    };

    Some(value)
}

/// Read an unsigned integer written as ASCII hexadecimal digits.
pub(crate) fn read_hex(r: &[u8]) -> Option<u64> {
    if r.is_empty() || r.len() > 16 {
        return None;
    }

    r.iter().try_fold(0u64, |acc, b| {
        let digit = (*b as char).to_digit(16)?;
        Some((acc << 4) | u64::from(digit))
    })
}

fn read_checksum(r: &[u8], endian: Endian) -> u16 {
    // Checksums are one or two bytes wide.
    read_unsigned(r, endian).map_or(0, |v| v as u16)
}

/// Whether `payload` ends or begins with a block of sub-records made only
/// of `byte`, at least `min` bytes long, and has no other such sub-record.
fn is_filled(payload: &[u8], width: usize, byte: u8, min: usize) -> bool {
    let filled = |c: &&[u8]| c.iter().all(|b| *b == byte);
    let slots = || payload.chunks_exact(width);

    let leading = slots().take_while(filled).count();
    let trailing = slots().rev().take_while(filled).count();
    let block = leading.max(trailing);

    block > 0 && block * width >= min && slots().filter(filled).count() == block
}
