//! Decoding sub-records from located frames.

use either::Either::{self, Left, Right};

use super::{
    range::ByteRange,
    record::{Record, Value},
    scan::{Frame, read_hex},
    schema::{BaseType, ConfigError, Endian, FieldSpec, FrameSchema, ParserConfig},
    state::InProcessFrame,
};

/// Filter deciding whether a decoded sub-record is emitted.
///
/// A record passes when its identifier field holds the expected value.
/// Records failing the predicate are still counted as decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: String,
    pub expected: u64,
}

impl Predicate {
    pub fn accepts(&self, record: &Record) -> bool {
        record
            .get(&self.field)
            .and_then(Value::as_u64)
            .is_some_and(|v| v == self.expected)
    }
}

/// Decodes sub-records from located frames, one at a time.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    schemas: Vec<FrameSchema>,
    predicates: Vec<Option<Predicate>>,
}

impl RecordExtractor {
    pub fn new(config: &ParserConfig) -> Result<Self, ConfigError> {
        let predicates = config
            .frame_types
            .iter()
            .map(|s| {
                let Some(field) = &s.record.identifier else {
                    return Ok(None);
                };
                let expected = config
                    .identifier
                    .ok_or_else(|| ConfigError::MissingIdentifier(s.name.clone()))?;

                Ok(Some(Predicate {
                    field: field.clone(),
                    expected,
                }))
            })
            .collect::<Result<_, ConfigError>>()?;

        Ok(Self {
            schemas: config.frame_types.clone(),
            predicates,
        })
    }

    /// Decode the next sub-record of an in-process frame.
    ///
    /// `r` holds the bytes located as `frame`. Returns the record if it
    /// passed the validity predicate, and either the successor in-process
    /// frame or, once every sub-record has been decoded, the range of the
    /// frame to forget.
    pub fn advance(
        &self,
        state: InProcessFrame,
        r: &[u8],
        frame: &Frame,
    ) -> (Option<Record>, Either<InProcessFrame, ByteRange>) {
        let record = self.decode(r, frame, state.range().start(), state.emitted());

        let record = match &self.predicates[frame.schema] {
            Some(predicate) if !predicate.accepts(&record) => {
                log::trace!(
                    "Record {} of frame at {} rejected by identifier filter",
                    state.emitted(),
                    state.range().start()
                );
                None
            }
            _ => Some(record),
        };

        let successor = match state.advance() {
            Some(state) => Left(state),
            None => Right(state.range()),
        };

        (record, successor)
    }

    /// Decode sub-record `index` of a frame starting at `offset`.
    pub fn decode(&self, r: &[u8], frame: &Frame, offset: usize, index: usize) -> Record {
        let schema = &self.schemas[frame.schema];

        let header = &r[frame.bytes.start..frame.payload.start];
        let start = frame.payload.start + index * schema.record.width;
        let sub_record = r.get(start..start + schema.record.width).unwrap_or_default();

        let fields = schema
            .header_fields
            .iter()
            .map(|f| (f, header))
            .chain(schema.record.fields.iter().map(|f| (f, sub_record)))
            .filter_map(|(f, r)| Some((f.name.clone(), decode_field(r, f)?)))
            .collect();

        log::trace!("Decoded record {index} of `{}` frame at {offset}", schema.name);

        Record {
            frame_type: schema.name.clone(),
            frame_offset: offset,
            index,
            fields,
        }
    }
}

/// Decode one field from the bytes of its layout.
///
/// Returns `None` if the field lies outside `r`, or holds malformed hex
/// digits.
fn decode_field(r: &[u8], f: &FieldSpec) -> Option<Value> {
    let r = r.get(f.offset..f.offset + f.kind.width())?;

    macro_rules! number {
        ($t:ident, $variant:ident) => {{
            let b: [u8; size_of::<$t>()] = r.try_into().ok()?;
            Value::$variant(match f.endian {
                Endian::Little => $t::from_le_bytes(b),
                Endian::Big => $t::from_be_bytes(b),
            })
        }};
    }

    let value = match f.kind {
        BaseType::U8 => number!(u8, U8),
        BaseType::U16 => number!(u16, U16),
        BaseType::U32 => number!(u32, U32),
        BaseType::U64 => number!(u64, U64),
        BaseType::I8 => number!(i8, I8),
        BaseType::I16 => number!(i16, I16),
        BaseType::I32 => number!(i32, I32),
        BaseType::I64 => number!(i64, I64),
        BaseType::F32 => number!(f32, F32),
        BaseType::F64 => number!(f64, F64),
        BaseType::Bytes { .. } => Value::Bytes(r.to_vec()),
        BaseType::HexAscii { .. } => Value::U64(read_hex(r)?),
    };

    Some(value)
}
