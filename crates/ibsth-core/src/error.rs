//! Error types for ibsth-core.
//!
//! Most failures in this crate never reach an application callback:
//! filtering rejections are expected traffic on a shared scanning channel,
//! and failed address resolutions are retried on the next advertisement.
//! The errors below surface from session lifecycle calls, from the cache's
//! persistence layer, and from the resolution handshake's join handle.
//!
//! | Error | Typical source | Recovery |
//! |-------|----------------|----------|
//! | [`Error::Bluetooth`] | start/stop scan, connect | Retried on next discovery |
//! | [`Error::AdapterUnavailable`] | subscribe | Fix host Bluetooth |
//! | [`Error::Timeout`] | connect | Retried on next discovery |
//! | [`Error::NoAddress`] | connect | Platform hides addresses (macOS) |
//! | [`Error::Persistence`] | cache save | Resolution rolled back |
//! | [`Error::InvalidTransition`] | cache misuse | Programming error |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cache::IdentityState;

/// Errors that can occur while monitoring IBS-TH sensors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Advertisement payload failed validation.
    #[error(transparent)]
    Parse(#[from] ibsth_types::ParseError),

    /// No Bluetooth adapter is available on this host.
    #[error("No Bluetooth adapter available")]
    AdapterUnavailable,

    /// The radio has no record of the given scan identifier.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Connecting succeeded but the radio did not reveal a hardware address.
    #[error("No hardware address obtained for {0}")]
    NoAddress(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// An identity cache transition was requested from the wrong state.
    #[error("Invalid identity transition for {scan_id}: entry is {state}")]
    InvalidTransition {
        /// The scan identifier concerned.
        scan_id: String,
        /// The state the entry was in.
        state: IdentityState,
    },

    /// Writing or reading the identity snapshot failed.
    #[error("Failed to persist {}: {source}", .path.display())]
    Persistence {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Snapshot could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an invalid-transition error.
    pub fn invalid_transition(scan_id: impl Into<String>, state: IdentityState) -> Self {
        Self::InvalidTransition {
            scan_id: scan_id.into(),
            state,
        }
    }

    /// Create a persistence error for a file path.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using ibsth-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
