//! Frame-type schemas and parser configuration.
//!
//! Every stream is described by a [`ParserConfig`]: the frame types that may
//! appear in it, and the parameters of the validity predicate applied to
//! decoded sub-records. Configurations are usually loaded from JSON:
//!
//! ```json
//! {
//!   "identifier": 55,
//!   "frame_types": [{
//!     "name": "ct",
//!     "marker": [1, 67, 84],
//!     "header_len": 5,
//!     "length": { "offset": 3, "type": "binary", "width": 2, "unit": "payload" },
//!     "checksum": { "algorithm": "crc16", "endian": "little" },
//!     "trailer": [3],
//!     "fill": { "byte": 0, "min_run": 16 },
//!     "record": {
//!       "width": 8,
//!       "identifier": "id",
//!       "fields": [
//!         { "name": "id", "offset": 0, "type": "u8" },
//!         { "name": "temperature", "offset": 1, "type": "u16" }
//!       ]
//!     }
//!   }]
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::check::Algorithm;

/// An error in a parser configuration.
///
/// Configuration errors are fatal: they are raised before any parsing
/// begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No frame types were configured.
    #[error("No frame types are configured.")]
    NoFrameTypes,
    /// A frame type without a name.
    #[error("Frame type {0} has an empty name.")]
    EmptyName(usize),
    /// Two frame types share a name.
    #[error("Frame type name `{0}` is used more than once.")]
    DuplicateName(String),
    /// A frame type without a start marker.
    #[error("Frame type `{0}` has an empty marker.")]
    EmptyMarker(String),
    /// A header that cannot hold its marker and length field.
    #[error("Frame type `{frame_type}` has an invalid header: {reason}.")]
    Header {
        frame_type: String,
        reason: &'static str,
    },
    /// A length field of unsupported width.
    #[error("Frame type `{frame_type}` has an unsupported length width ({width}).")]
    LengthWidth { frame_type: String, width: usize },
    /// A record layout of zero width.
    #[error("Frame type `{0}` has a zero-width record.")]
    ZeroWidth(String),
    /// A field that does not fit in its record or header.
    #[error("Field `{field}` of frame type `{frame_type}` does not fit its layout.")]
    FieldBounds { frame_type: String, field: String },
    /// Two fields of a frame type share a name.
    #[error("Field name `{field}` is used more than once in frame type `{frame_type}`.")]
    DuplicateField { frame_type: String, field: String },
    /// A hex-encoded field of unsupported width.
    #[error("Field `{field}` of frame type `{frame_type}` has an unsupported width ({len}).")]
    FieldWidth {
        frame_type: String,
        field: String,
        len: usize,
    },
    /// An identifier naming a field the record does not have.
    #[error("Frame type `{frame_type}` names an unknown identifier field `{field}`.")]
    UnknownIdentifier { frame_type: String, field: String },
    /// A frame type filters on an identifier, but none was configured.
    #[error("Frame type `{0}` filters records by identifier, but no identifier is configured.")]
    MissingIdentifier(String),
    /// A placeholder fill with a zero-length run.
    #[error("Frame type `{0}` has a fill run length of zero.")]
    ZeroFillRun(String),
    /// Malformed configuration.
    #[error("Malformed configuration: {0}.")]
    Json(#[from] serde_json::Error),
}

/// Byte order of a multi-byte value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endian {
    Little,
    #[default]
    Big,
}

/// Configuration of a parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Frame types that may appear in the stream, in order of precedence.
    pub frame_types: Vec<FrameSchema>,
    /// Value that a record's identifier field must hold for the record to be
    /// emitted.
    #[serde(default)]
    pub identifier: Option<u64>,
}

impl ParserConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_types.is_empty() {
            Err(ConfigError::NoFrameTypes)?;
        }

        let mut names = HashSet::new();

        for (i, schema) in self.frame_types.iter().enumerate() {
            if schema.name.is_empty() {
                Err(ConfigError::EmptyName(i))?;
            }
            if !names.insert(schema.name.as_str()) {
                Err(ConfigError::DuplicateName(schema.name.clone()))?;
            }

            schema.validate()?;

            if schema.record.identifier.is_some() && self.identifier.is_none() {
                Err(ConfigError::MissingIdentifier(schema.name.clone()))?;
            }
        }

        Ok(())
    }
}

/// Layout of one frame type.
///
/// A frame is laid out as `[marker][..header..][payload][checksum][trailer]`,
/// where the header holds the marker, the length field, and any header
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSchema {
    /// Symbolic name, carried by every record decoded from this frame type.
    pub name: String,
    /// Bytes opening every frame of this type.
    pub marker: Vec<u8>,
    /// Bytes from the start of the frame to the start of the payload.
    pub header_len: usize,
    pub length: LengthField,
    #[serde(default)]
    pub checksum: Option<Checksum>,
    /// Bytes closing every frame of this type.
    #[serde(default)]
    pub trailer: Vec<u8>,
    /// Sentinel standing in for bytes not yet received.
    #[serde(default)]
    pub fill: Option<Fill>,
    /// Largest plausible frame, in bytes.
    #[serde(default)]
    pub max_len: Option<usize>,
    /// Fields decoded from the header and attached to every record.
    #[serde(default)]
    pub header_fields: Vec<FieldSpec>,
    pub record: RecordLayout,
}

impl FrameSchema {
    fn validate(&self) -> Result<(), ConfigError> {
        let header = |reason| ConfigError::Header {
            frame_type: self.name.clone(),
            reason,
        };

        if self.marker.is_empty() {
            Err(ConfigError::EmptyMarker(self.name.clone()))?;
        }
        if self.header_len < self.marker.len() {
            Err(header("shorter than its marker"))?;
        }
        if self.length.offset < self.marker.len() {
            Err(header("length field overlaps the marker"))?;
        }
        if self.length.offset + self.length.encoding.width() > self.header_len {
            Err(header("length field extends past the header"))?;
        }

        let width = self.length.encoding.width();
        let supported = match self.length.encoding {
            LengthEncoding::Binary { .. } => matches!(width, 1 | 2 | 4 | 8),
            LengthEncoding::HexAscii { .. } => (1..=16).contains(&width),
        };
        if !supported {
            Err(ConfigError::LengthWidth {
                frame_type: self.name.clone(),
                width,
            })?;
        }

        if self.record.width == 0 {
            Err(ConfigError::ZeroWidth(self.name.clone()))?;
        }

        if matches!(self.fill, Some(Fill { min_run: 0, .. })) {
            Err(ConfigError::ZeroFillRun(self.name.clone()))?;
        }

        let mut names = HashSet::new();
        let layouts = [
            (&self.header_fields, self.header_len),
            (&self.record.fields, self.record.width),
        ];

        for (fields, limit) in layouts {
            for field in fields {
                if !names.insert(field.name.as_str()) {
                    Err(ConfigError::DuplicateField {
                        frame_type: self.name.clone(),
                        field: field.name.clone(),
                    })?;
                }
                if let BaseType::HexAscii { len } = field.kind {
                    if !(1..=16).contains(&len) {
                        Err(ConfigError::FieldWidth {
                            frame_type: self.name.clone(),
                            field: field.name.clone(),
                            len,
                        })?;
                    }
                }
                if field.offset + field.kind.width() > limit {
                    Err(ConfigError::FieldBounds {
                        frame_type: self.name.clone(),
                        field: field.name.clone(),
                    })?;
                }
            }
        }

        if let Some(identifier) = &self.record.identifier {
            if !self.record.fields.iter().any(|f| &f.name == identifier) {
                Err(ConfigError::UnknownIdentifier {
                    frame_type: self.name.clone(),
                    field: identifier.clone(),
                })?;
            }
        }

        Ok(())
    }

    /// Bytes occupied by the checksum.
    pub fn checksum_width(&self) -> usize {
        self.checksum.as_ref().map_or(0, |c| c.algorithm.width())
    }

    /// Bytes surrounding the payload: header, checksum and trailer.
    pub fn overhead(&self) -> usize {
        self.header_len + self.checksum_width() + self.trailer.len()
    }
}

/// Location and meaning of a frame's length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthField {
    /// Offset from the start of the frame.
    pub offset: usize,
    #[serde(flatten)]
    pub encoding: LengthEncoding,
    #[serde(default)]
    pub unit: LengthUnit,
}

/// Encoding of a length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LengthEncoding {
    /// An unsigned binary integer.
    Binary {
        width: usize,
        #[serde(default)]
        endian: Endian,
    },
    /// An unsigned integer written as ASCII hexadecimal digits.
    HexAscii { width: usize },
}

impl LengthEncoding {
    pub fn width(&self) -> usize {
        match self {
            Self::Binary { width, .. } | Self::HexAscii { width } => *width,
        }
    }
}

/// Quantity counted by a length field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    /// Bytes of payload.
    #[default]
    Payload,
    /// Bytes of the whole frame, from marker to trailer.
    Frame,
    /// Sub-records in the payload.
    Records,
}

/// A frame checksum, stored immediately after the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: Algorithm,
    #[serde(default)]
    pub endian: Endian,
    #[serde(default)]
    pub scope: ChecksumScope,
}

/// Bytes covered by a checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumScope {
    #[default]
    Payload,
    /// The header and the payload.
    Frame,
}

/// A placeholder pattern: whole sub-records of sentinel bytes, at the start
/// or end of a payload, standing in for data not yet received.
///
/// `min_run` is the least number of such bytes that marks a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub byte: u8,
    #[serde(default = "Fill::default_min_run")]
    pub min_run: usize,
}

impl Fill {
    const fn default_min_run() -> usize {
        4
    }
}

/// Layout of the fixed-width sub-records making up a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordLayout {
    pub width: usize,
    pub fields: Vec<FieldSpec>,
    /// Field that must hold the configured identifier for a record to be
    /// emitted.
    #[serde(default)]
    pub identifier: Option<String>,
}

/// A named field at a fixed offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub offset: usize,
    #[serde(flatten)]
    pub kind: BaseType,
    #[serde(default)]
    pub endian: Endian,
}

/// Encoding of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BaseType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Raw bytes.
    Bytes { len: usize },
    /// An unsigned integer written as ASCII hexadecimal digits.
    HexAscii { len: usize },
}

impl BaseType {
    /// Bytes occupied by a value of this type.
    pub const fn width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
            Self::Bytes { len } | Self::HexAscii { len } => *len,
        }
    }
}
