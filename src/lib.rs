//! A resumable decoder for multiplexed, append-only instrument telemetry
//! files.
//!
//! Telemux locates self-delimited frames of several configured types within
//! a byte stream, validates them, and decodes their payloads into structured
//! records. All progress is captured in a small, persistable
//! [`ParserState`](sans::state::ParserState), so parsing can stop at any
//! point and resume later (even in another process, and even after regions
//! that once held placeholder bytes have been filled with real data) without
//! emitting any record twice.
//!
//! Most users should begin with the [`Parser`](avec::parser::Parser) in the
//! [`avec`] module. The interval algebra, frame scanner and record extractor
//! it drives are exposed in the [`sans`] module for applications needing
//! finer control.
//!
//! ## Cargo Features
//!
//! The following crate feature flags are available:
//!
//! - `derive`: enable derive macros for typed records (default).

pub mod avec;
pub mod sans;

pub use avec::parser::{Error, Parser};
pub use sans::{record::Record, schema::ParserConfig, state::ParserState};
