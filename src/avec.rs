//! The parser, and convenience interfaces for consuming its records.
//!
//! The [`Parser`](parser::Parser) reads frames from a
//! [`ByteSource`](source::ByteSource) and reports its progress to a
//! [`ParserSink`](sink::ParserSink). Decoded [`Record`]s are dynamically
//! typed; to receive them as Rust types, publish them to the
//! [`FromRecords`] and [`FromRecord`] traits.
//!
//! In many cases (when records are of a known shape), these traits can be
//! derived. See the [`FromRecords`](macro@FromRecords) and
//! [`FromRecord`](macro@FromRecord) macros for details.

pub mod parser;
pub mod sink;
pub mod source;

use crate::sans::record::Record;

/// Derive [`FromRecords`] for a struct holding a collection of records.
///
/// _Requires Cargo feature `derive`._
///
/// # Example
///
/// To collect a single record, add the `record("T")` attribute to an
/// `Option<R>` struct field, where `T` is the name of a frame type and `R` is
/// a type implementing [`FromRecord`] and [`Default`]. Additional records of
/// the same frame type will overwrite earlier ones. To collect every
/// occurrence, apply the attribute to a `Vec<R>` instead.
///
/// ```
/// #[derive(Debug, Default, FromRecords)]
/// struct Deployment {
///     #[record("ct")]
///     samples: Vec<Sample>,
///     #[record("co")]
///     clock_offset: Option<ClockOffset>,
/// }
/// ```
#[cfg(feature = "derive")]
pub use telemux_derive::FromRecords;

/// Produce record receivers for a stream.
///
/// See the [`FromRecords`](macro@FromRecords) derive macro for an automatic
/// implementation of this trait.
pub trait FromRecords {
    /// Retrieve a receiver for a record of a frame type, if one exists.
    fn add_record(&mut self, frame_type: &str) -> Option<&mut dyn FromRecord>;
}

/// Derive [`FromRecord`] for a struct representing a single record.
///
/// _Requires Cargo feature `derive`._
///
/// # Examples
///
/// To receive a field value, add the `field("name")` attribute to an
/// `Option<T>` struct field, where `name` is the field's name in the frame
/// layout and `T` is the corresponding Rust primitive (`Vec<u8>` for `bytes`
/// fields, `u64` for `hex_ascii` fields).
///
/// To receive the offset of the originating frame, or the position of the
/// record within it, supply `offset` or `index` in place of a name.
///
/// ```
/// #[derive(Debug, Default, FromRecord)]
/// struct Sample {
///     #[field(offset)]
///     frame_offset: Option<usize>,
///     #[field("temperature")]
///     temperature: Option<u16>,
///     #[field("pressure")]
///     pressure: Option<i32>,
/// }
/// ```
///
/// To receive a value into an arbitrary type, supply an accumulator closure.
/// Since the value type cannot be inferred, the second argument must be
/// typed.
///
/// ```
/// #[derive(Debug, Default, FromRecord)]
/// struct Sample {
///     #[field("temperature", |t, raw: u16| *t = f32::from(raw) / 100.0)]
///     temperature_c: f32,
/// }
/// ```
#[cfg(feature = "derive")]
pub use telemux_derive::FromRecord;

/// Receive field values for a record.
///
/// Fields that could not be decoded are skipped.
///
/// The default implementation of each method ignores received values.
///
/// See the [`FromRecord`](macro@FromRecord) derive macro for an automatic
/// implementation of this trait.
#[allow(unused_variables)]
pub trait FromRecord {
    /// Add the offset of the originating frame to the record.
    fn add_offset(&mut self, _: usize) {}
    /// Add the position of the record within its frame.
    fn add_index(&mut self, _: usize) {}

    /// Add a `u8` for a field to the record.
    fn add_u8(&mut self, field: &str, _: u8) {}
    /// Add a `u16` for a field to the record.
    fn add_u16(&mut self, field: &str, _: u16) {}
    /// Add a `u32` for a field to the record.
    fn add_u32(&mut self, field: &str, _: u32) {}
    /// Add a `u64` for a field to the record.
    ///
    /// This method also receives `hex_ascii` fields.
    fn add_u64(&mut self, field: &str, _: u64) {}

    /// Add a `i8` for a field to the record.
    fn add_i8(&mut self, field: &str, _: i8) {}
    /// Add a `i16` for a field to the record.
    fn add_i16(&mut self, field: &str, _: i16) {}
    /// Add a `i32` for a field to the record.
    fn add_i32(&mut self, field: &str, _: i32) {}
    /// Add a `i64` for a field to the record.
    fn add_i64(&mut self, field: &str, _: i64) {}

    /// Add a `f32` for a field to the record.
    fn add_f32(&mut self, field: &str, _: f32) {}
    /// Add a `f64` for a field to the record.
    fn add_f64(&mut self, field: &str, _: f64) {}

    /// Add raw bytes for a field to the record.
    fn add_bytes(&mut self, field: &str, _: &[u8]) {}
}

/// Publish records to a receiver, in order.
pub fn collect<'a>(records: impl IntoIterator<Item = &'a Record>, o: &mut impl FromRecords) {
    for record in records {
        if let Some(receiver) = o.add_record(&record.frame_type) {
            record.publish(receiver);
        }
    }
}
