//! The resumable frame parser.

use either::Either::{Left, Right};
use thiserror::Error;

use crate::sans::{
    extract::RecordExtractor,
    range::ByteRange,
    record::Record,
    scan::{Frame, FrameError, FrameScanner, ScanEvent},
    schema::{ConfigError, ParserConfig},
    state::{InProcessFrame, ParserState, StateError},
};

use super::{sink::ParserSink, source::ByteSource};

/// Fatal errors raised by a parser.
///
/// Errors in individual frames are not fatal, and are reported through
/// [`ParserSink::exception`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration is inconsistent or incomplete.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A supplied state violates its invariants.
    #[error("Invalid state: {0}")]
    State(#[from] StateError),
    /// An error from the byte source.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A frame verified during the current call, kept while its sub-records are
/// extracted.
struct Verified {
    bytes: Vec<u8>,
    frame: Frame,
    start: usize,
}

/// The outcome of one extraction step.
enum Step {
    Emitted(Record),
    /// A sub-record was decoded but filtered out, or a stale frame dropped.
    Consumed,
    /// The frame's bytes are not available.
    Blocked,
}

/// Decodes records from a stream, resuming where a previous parser stopped.
///
/// A parser owns its [`ParserState`], and reports every change to it through
/// the sink's state channel. Records are emitted in order of the offset of
/// their originating frame, then of their position within it, and never
/// twice for the same state lineage.
///
/// A parser is not reentrant; callers serialize access to it.
pub struct Parser<S, K> {
    scanner: FrameScanner,
    extractor: RecordExtractor,
    state: ParserState,
    /// Stream length the state is known to describe.
    known_end: usize,
    source: S,
    sink: K,
}

impl<S: ByteSource, K: ParserSink> Parser<S, K> {
    /// Create a parser.
    ///
    /// Without a `state`, parsing starts afresh, covering every byte the
    /// source currently holds. A supplied state is taken to describe the
    /// source as it currently is; see [`Parser::refresh`] for streams that
    /// have since grown.
    pub fn new(
        config: &ParserConfig,
        state: Option<ParserState>,
        mut source: S,
        sink: K,
    ) -> Result<Self, Error> {
        config.validate()?;

        let scanner = FrameScanner::new(config);
        let extractor = RecordExtractor::new(config)?;

        let known_end = source.available()?;
        let state = state.unwrap_or_else(|| ParserState::fresh(known_end));

        Ok(Self {
            scanner,
            extractor,
            state,
            known_end,
            source,
            sink,
        })
    }

    /// Decode up to `n` new records, in order.
    ///
    /// Fewer records are returned once the available bytes are exhausted.
    /// This is not an error: calling again after the stream has grown (see
    /// [`Parser::refresh`]) picks up where this call stopped.
    ///
    /// Each record is also published to the sink as it is decoded, so if an
    /// I/O error interrupts the call, records decoded before it were still
    /// published.
    pub fn get_records(&mut self, n: usize) -> Result<Vec<Record>, Error> {
        let mut records = Vec::new();

        if n == 0 {
            return Ok(records);
        }

        // Unprocessed bytes below this offset were scanned during this call.
        let mut scanned = 0;
        let mut current = None;

        while records.len() < n {
            let horizon = self
                .state
                .earliest()
                .map_or(usize::MAX, |f| f.range().start());

            if scanned < horizon {
                self.scan(scanned, horizon)?;
                scanned = horizon;
                continue;
            }

            let Some(&frame) = self.state.earliest() else {
                break;
            };

            match self.extract(frame, &mut current)? {
                Step::Emitted(record) => records.push(record),
                Step::Consumed => {}
                Step::Blocked => break,
            }
        }

        log::debug!("Decoded {} of {} requested records", records.len(), n);

        Ok(records)
    }

    /// Replace the parser state.
    ///
    /// Subsequent calls operate against the new state, which is taken to
    /// describe the source as it currently is.
    pub fn set_state(&mut self, state: ParserState) -> Result<(), Error> {
        let known_end = self.source.available()?;

        log::debug!(
            "Replacing state: {} unprocessed ranges, {} in-process frames",
            state.unprocessed().len(),
            state.in_process().len()
        );

        self.state = state;
        self.known_end = known_end;
        self.sink.state_changed(&self.state);

        Ok(())
    }

    /// Record that the stream has grown to `new_end` bytes.
    ///
    /// Bytes beyond the length the state describes join the trailing
    /// unprocessed range. Returns whether the state changed.
    pub fn extend(&mut self, new_end: usize) -> bool {
        let changed = self.state.extend(self.known_end, new_end);
        self.known_end = self.known_end.max(new_end);

        if changed {
            log::debug!("Stream grew to {new_end} bytes");
            self.sink.state_changed(&self.state);
        }

        changed
    }

    /// Check the source for new bytes, and [`extend`](Parser::extend) the
    /// state to cover them.
    pub fn refresh(&mut self) -> Result<bool, Error> {
        let available = self.source.available()?;
        Ok(self.extend(available))
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Dismantle the parser, returning its state, source and sink.
    pub fn into_parts(self) -> (ParserState, S, K) {
        (self.state, self.source, self.sink)
    }

    /// Scan the unprocessed ranges lying between `from` and `to`, in
    /// ascending order.
    fn scan(&mut self, from: usize, to: usize) -> Result<(), Error> {
        let Some(window) = ByteRange::new(from, to) else {
            return Ok(());
        };

        let ranges: Vec<_> = self.state.unprocessed().within(window).collect();

        for range in ranges {
            let events = {
                let r = self.source.read(range)?;

                // Frames may run on past `known_end` once the state is
                // extended, or into bytes the source has yet to supply.
                let open = range.end() >= self.known_end || r.len() < range.len();
                self.scanner.scan_range(&r, range, open)
            };

            for event in events {
                self.apply(event);
            }
        }

        Ok(())
    }

    /// Apply the outcome of a scan to the state.
    fn apply(&mut self, event: ScanEvent) {
        let name = |k: usize| self.scanner.schemas()[k].name.clone();

        match event {
            ScanEvent::Located {
                range,
                schema,
                total,
            } => {
                log::debug!("Located `{}` frame {range} of {total} records", name(schema));
                self.state.locate(range, total);
                self.sink.state_changed(&self.state);
            }
            ScanEvent::Corrupt { span, error } => {
                log::warn!("{error} Skipping header {span}.");
                self.state.mark_resolved(span);
                self.sink.state_changed(&self.state);
                self.sink.exception(&error);
            }
            ScanEvent::Placeholder { range, schema } => {
                log::debug!("`{}` frame {range} holds placeholder bytes", name(schema));
                if self.state.mark_unprocessed(range) {
                    self.sink.state_changed(&self.state);
                }
            }
            ScanEvent::Incomplete { offset, schema } => {
                log::debug!("`{}` frame at {offset} is incomplete", name(schema));
            }
        }
    }

    /// Decode the next sub-record of the earliest in-process frame.
    fn extract(
        &mut self,
        frame: InProcessFrame,
        current: &mut Option<Verified>,
    ) -> Result<Step, Error> {
        let range = frame.range();

        if current.as_ref().is_none_or(|v| v.start != range.start()) {
            let bytes = self.source.read(range)?.into_owned();

            if bytes.len() < range.len() {
                return Ok(Step::Blocked);
            }

            match self.scanner.frame_at(&bytes, range.start()) {
                Ok(verified) if verified.total == frame.total() => {
                    *current = Some(Verified {
                        bytes,
                        frame: verified,
                        start: range.start(),
                    });
                }
                _ => {
                    let error = FrameError::Stale {
                        offset: range.start(),
                    };
                    log::warn!("{error} Forgetting {range}.");

                    *current = None;
                    self.state.settle_earliest(None);
                    self.sink.state_changed(&self.state);
                    self.sink.exception(&error);

                    return Ok(Step::Consumed);
                }
            }
        }

        let Some(verified) = current.as_ref() else {
            return Ok(Step::Blocked);
        };

        let (record, successor) = self
            .extractor
            .advance(frame, &verified.bytes, &verified.frame);

        match successor {
            Left(next) => self.state.settle_earliest(Some(next)),
            Right(resolved) => {
                log::debug!("Frame {resolved} fully extracted");
                *current = None;
                self.state.settle_earliest(None);
            }
        }

        self.sink.state_changed(&self.state);

        Ok(match record {
            Some(record) => {
                self.sink.publish(&record);
                Step::Emitted(record)
            }
            None => Step::Consumed,
        })
    }
}
