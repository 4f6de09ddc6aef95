#![allow(dead_code)]

use telemux::sans::{check::Algorithm, schema::ParserConfig};

/// Two multiplexed frame types:
///
/// - `ct`: `01 'C' 'T' [len u16be]` header, sub-records of
///   `[id u8][temperature u16be][flags u8]`, CRC-16 (little-endian) over
///   the payload, `03` trailer, zero-fill placeholders.
///
/// - `co`: `01 'C' 'O' [count, 2 hex digits][clock u16be]` header,
///   sub-records of `[offset i16be]`, sum-8 checksum, no trailer.
pub const CONFIG: &str = r#"{
  "frame_types": [
    {
      "name": "ct",
      "marker": [1, 67, 84],
      "header_len": 5,
      "length": { "offset": 3, "type": "binary", "width": 2, "endian": "big" },
      "checksum": { "algorithm": "crc16", "endian": "little" },
      "trailer": [3],
      "fill": { "byte": 0, "min_run": 8 },
      "max_len": 1024,
      "record": {
        "width": 4,
        "fields": [
          { "name": "id", "offset": 0, "type": "u8" },
          { "name": "temperature", "offset": 1, "type": "u16" },
          { "name": "flags", "offset": 3, "type": "u8" }
        ]
      }
    },
    {
      "name": "co",
      "marker": [1, 67, 79],
      "header_len": 7,
      "length": { "offset": 3, "type": "hex_ascii", "width": 2, "unit": "records" },
      "checksum": { "algorithm": "sum8" },
      "header_fields": [
        { "name": "clock", "offset": 5, "type": "u16" }
      ],
      "record": {
        "width": 2,
        "fields": [
          { "name": "offset", "offset": 0, "type": "i16" }
        ]
      }
    }
  ]
}"#;

pub fn config() -> ParserConfig {
    ParserConfig::from_json(CONFIG).unwrap()
}

/// The `ct` frame type filtering sub-records on their `id` field.
pub fn filtered_config(identifier: Option<u64>) -> ParserConfig {
    let mut config: ParserConfig = serde_json::from_str(CONFIG).unwrap();
    config.frame_types[0].record.identifier = Some("id".to_string());
    config.identifier = identifier;
    config
}

/// A `ct` sub-record: `(id, temperature, flags)`.
pub type Sample = (u8, u16, u8);

pub fn ct_payload(samples: &[Sample]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (id, temperature, flags) in samples {
        payload.push(*id);
        payload.extend(temperature.to_be_bytes());
        payload.push(*flags);
    }
    payload
}

/// Assemble a `ct` frame around an arbitrary payload, with a correct
/// checksum.
pub fn ct_frame_with(payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x01, b'C', b'T'];
    frame.extend((payload.len() as u16).to_be_bytes());
    frame.extend(payload);
    frame.extend(Algorithm::Crc16.compute(payload).to_le_bytes());
    frame.push(0x03);
    frame
}

pub fn ct_frame(samples: &[Sample]) -> Vec<u8> {
    ct_frame_with(&ct_payload(samples))
}

pub fn co_frame(clock: u16, offsets: &[i16]) -> Vec<u8> {
    let payload: Vec<u8> = offsets.iter().flat_map(|o| o.to_be_bytes()).collect();

    let mut frame = vec![0x01, b'C', b'O'];
    frame.extend(format!("{:02X}", offsets.len()).bytes());
    frame.extend(clock.to_be_bytes());
    frame.extend(&payload);
    frame.push(Algorithm::Sum8.compute(&payload) as u8);
    frame
}

/// A stream under construction, remembering where each frame starts.
#[derive(Debug, Default, Clone)]
pub struct Stream {
    pub bytes: Vec<u8>,
    pub frames: Vec<usize>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(mut self, frame: Vec<u8>) -> Self {
        self.frames.push(self.bytes.len());
        self.bytes.extend(frame);
        self
    }

    /// Bytes that never contain a marker.
    pub fn noise(mut self, n: usize) -> Self {
        self.bytes.extend((0..n).map(|i| 0x80 | (i as u8 & 0x3F)));
        self
    }
}

/// Frame offsets and sub-record indices of a sequence of records.
pub fn positions(records: &[telemux::Record]) -> Vec<(usize, usize)> {
    records.iter().map(|r| (r.frame_offset, r.index)).collect()
}
