//! Error types for frame parsing in ibsth-types.

use thiserror::Error;

/// Errors that can occur when validating an advertisement frame.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in ibsth-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload is not exactly one frame long.
    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required frame length.
        expected: usize,
        /// Length of the payload that was received.
        actual: usize,
    },

    /// The checksum carried in the frame does not match its contents.
    #[error("Checksum mismatch: computed 0x{expected:04X}, frame carries 0x{actual:04X}")]
    ChecksumMismatch {
        /// Checksum computed over the measurement bytes.
        expected: u16,
        /// Checksum found in the frame.
        actual: u16,
    },
}

/// Result type alias using ibsth-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
