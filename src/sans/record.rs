//! Decoded records.

use serde::{Deserialize, Serialize};

use crate::avec::FromRecord;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
}

impl Value {
    /// The value as an unsigned integer, if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U8(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::U32(v) => Some(v.into()),
            Self::U64(v) => Some(v),
            Self::I8(v) => v.try_into().ok(),
            Self::I16(v) => v.try_into().ok(),
            Self::I32(v) => v.try_into().ok(),
            Self::I64(v) => v.try_into().ok(),
            Self::F32(_) | Self::F64(_) | Self::Bytes(_) => None,
        }
    }

    /// Publish the value for a field to a receiver.
    fn publish<O: FromRecord + ?Sized>(&self, field: &str, o: &mut O) {
        match self {
            Self::U8(v) => o.add_u8(field, *v),
            Self::U16(v) => o.add_u16(field, *v),
            Self::U32(v) => o.add_u32(field, *v),
            Self::U64(v) => o.add_u64(field, *v),
            Self::I8(v) => o.add_i8(field, *v),
            Self::I16(v) => o.add_i16(field, *v),
            Self::I32(v) => o.add_i32(field, *v),
            Self::I64(v) => o.add_i64(field, *v),
            Self::F32(v) => o.add_f32(field, *v),
            Self::F64(v) => o.add_f64(field, *v),
            Self::Bytes(v) => o.add_bytes(field, v),
        }
    }
}

/// One sub-record decoded from a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Name of the frame type the record was decoded from.
    pub frame_type: String,
    /// Offset of the start of the originating frame.
    pub frame_offset: usize,
    /// Position of the sub-record within its frame.
    pub index: usize,
    /// Header fields, then sub-record fields, in layout order.
    ///
    /// Fields that could not be decoded are omitted.
    pub fields: Vec<(String, Value)>,
}

impl Record {
    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Publish the record to a receiver, field by field.
    pub fn publish<O: FromRecord + ?Sized>(&self, o: &mut O) {
        o.add_offset(self.frame_offset);
        o.add_index(self.index);

        for (name, value) in &self.fields {
            value.publish(name, o);
        }
    }
}
