//! Advertisement frame validation and decoding.
//!
//! Every sensor broadcast carries a 9-byte manufacturer payload, all
//! integers little-endian:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | Temperature, two's complement, 0.01 °C |
//! | 2 | 2 | Relative humidity, unsigned, 0.01 % |
//! | 4 | 1 | Probe type (0 built-in, 1 external) |
//! | 5 | 2 | Checksum of bytes 0-4 |
//! | 7 | 1 | Battery percent |
//! | 8 | 1 | Reserved |
//!
//! A [`Frame`] can only be obtained through [`Frame::parse`], which checks the
//! length and checksum, so decoding never sees unvalidated bytes.

use bytes::Buf;

use crate::checksum::checksum;
use crate::error::{ParseError, ParseResult};
use crate::types::{ProbeType, SensorData};

/// Length of a sensor advertisement payload.
pub const FRAME_LEN: usize = 9;

/// Number of leading bytes covered by the checksum.
pub const CHECKSUM_SPAN: usize = 5;

/// A length- and checksum-validated advertisement payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Validate a raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidLength`] unless `data` is exactly
    /// [`FRAME_LEN`] bytes, and [`ParseError::ChecksumMismatch`] if the
    /// embedded checksum does not match the measurement bytes.
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        let bytes: [u8; FRAME_LEN] = data.try_into().map_err(|_| ParseError::InvalidLength {
            expected: FRAME_LEN,
            actual: data.len(),
        })?;

        let expected = checksum(&bytes[..CHECKSUM_SPAN]);
        let actual = u16::from_le_bytes([bytes[5], bytes[6]]);
        if expected != actual {
            return Err(ParseError::ChecksumMismatch { expected, actual });
        }

        Ok(Self(bytes))
    }

    /// Decode the measurement values.
    #[must_use]
    pub fn decode(&self) -> SensorData {
        decode(&self.0)
    }

    /// The raw payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

/// Decode a 9-byte payload without validating it.
///
/// Callers are expected to have checked the checksum first; prefer
/// [`Frame::parse`] followed by [`Frame::decode`].
#[must_use]
pub fn decode(data: &[u8; FRAME_LEN]) -> SensorData {
    let mut buf = &data[..];
    let temperature_raw = buf.get_i16_le();
    let humidity_raw = buf.get_u16_le();
    let probe = ProbeType::from(buf.get_u8());
    let _checksum = buf.get_u16_le();
    let battery = buf.get_u8();

    SensorData {
        temperature: f32::from(temperature_raw) / 100.0,
        humidity: f32::from(humidity_raw) / 100.0,
        probe,
        battery,
    }
}

/// Build a valid payload from raw field values.
///
/// Used by simulators and tests; the checksum is filled in.
#[must_use]
pub fn encode(temperature_raw: i16, humidity_raw: u16, probe: u8, battery: u8) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    out[0..2].copy_from_slice(&temperature_raw.to_le_bytes());
    out[2..4].copy_from_slice(&humidity_raw.to_le_bytes());
    out[4] = probe;
    let crc = checksum(&out[..CHECKSUM_SPAN]);
    out[5..7].copy_from_slice(&crc.to_le_bytes());
    out[7] = battery;
    out
}
