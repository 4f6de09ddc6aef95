//! Pure machinery underlying the parser.
//!
//! Nothing in this module reads from a byte source, invokes a callback or
//! keeps hidden state: every operation is a deterministic function of its
//! arguments. This makes the pieces suitable for applications that drive
//! their own I/O, and for exhaustive testing.
//!
//! # Architecture
//!
//! Parsing progress is described by a [`ParserState`](state::ParserState):
//! the set of byte ranges not yet resolved into frames, plus the frames that
//! have been located but not fully extracted. Bytes move through it as
//! follows:
//!
//! - A [`scan`] of an unprocessed range classifies each marker match as
//!   incomplete, corrupt, placeholder or valid, producing
//!   [`ScanEvent`](scan::ScanEvent)s. Valid frames move out of the
//!   unprocessed set and into the in-process list; corrupt headers are
//!   resolved (skipped); everything else stays unprocessed.
//!
//! - The [`extract`] step decodes one sub-record at a time from an
//!   in-process frame. Once every sub-record has been decoded, the frame is
//!   forgotten: its bytes are no longer tracked anywhere.
//!
//! Some areas are deliberately left to the caller:
//!
//! - Reading the bytes of a range from the underlying stream.
//!
//! - Reporting state changes, records and non-fatal frame errors.
//!
//! - Deciding when the stream has grown, and by how much.
//!
//! See [`crate::avec::parser`] for an implementation of all three.

pub mod check;
pub mod extract;
pub mod range;
pub mod record;
pub mod scan;
pub mod schema;
pub mod state;
