//! Helpers for computing frame checksums.

use serde::{Deserialize, Serialize};

/// A checksum algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// CRC-16/ARC (reflected polynomial `0xA001`, initial value zero).
    Crc16,
    /// CRC-16/CCITT-FALSE (polynomial `0x1021`, initial value `0xFFFF`).
    Crc16Ccitt,
    /// Sum of all bytes, modulo 256.
    Sum8,
    /// Sum of all bytes, modulo 65536.
    Sum16,
    /// Exclusive-or of all bytes.
    Xor8,
}

impl Algorithm {
    /// Bytes occupied by a checksum of this kind.
    pub const fn width(&self) -> usize {
        match self {
            Self::Crc16 | Self::Crc16Ccitt | Self::Sum16 => 2,
            Self::Sum8 | Self::Xor8 => 1,
        }
    }

    /// Compute the checksum of a slice of bytes.
    pub fn compute(&self, r: &[u8]) -> u16 {
        match self {
            Self::Crc16 => compute_crc(0, r),
            Self::Crc16Ccitt => compute_crc_ccitt(0xFFFF, r),
            Self::Sum8 => r.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)).into(),
            Self::Sum16 => r.iter().fold(0u16, |acc, b| acc.wrapping_add((*b).into())),
            Self::Xor8 => r.iter().fold(0u8, |acc, b| acc ^ b).into(),
        }
    }
}

/// Accumulate a slice of bytes into a CRC-16/ARC value.
pub fn compute_crc(init: u16, r: &[u8]) -> u16 {
    r.iter().fold(init, |acc, b| crc_byte(acc, *b))
}

/// Accumulate a single byte into a CRC-16/ARC value, a nibble at a time.
fn crc_byte(mut crc: u16, b: u8) -> u16 {
    const CRC_TABLE: [u16; 16] = [
        0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
        0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
    ];

    for nibble in [b & 0xF, b >> 4] {
        let tmp = CRC_TABLE[(crc & 0xF) as usize];
        crc = (crc >> 4) & 0x0FFF;
        crc = crc ^ tmp ^ CRC_TABLE[nibble as usize];
    }

    crc
}

/// Accumulate a slice of bytes into a CRC-16/CCITT value.
pub fn compute_crc_ccitt(init: u16, r: &[u8]) -> u16 {
    r.iter().fold(init, |mut crc, b| {
        crc ^= u16::from(*b) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
        crc
    })
}
