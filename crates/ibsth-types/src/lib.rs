//! Platform-agnostic types for IBS-TH temperature/humidity sensors.
//!
//! This crate holds everything that can be done with an advertisement
//! payload without a Bluetooth stack: checksum validation, frame decoding and
//! the reading types delivered to applications. The BLE side lives in
//! `ibsth-core`.
//!
//! # Example
//!
//! ```
//! use ibsth_types::{Frame, ProbeType};
//!
//! let payload = [0x66, 0x08, 0x9C, 0x15, 0x00, 0xE0, 0xD6, 87, 0x00];
//! let data = Frame::parse(&payload)?.decode();
//!
//! assert_eq!(data.temperature, 21.5);
//! assert_eq!(data.humidity, 55.32);
//! assert_eq!(data.probe, ProbeType::BuiltIn);
//! assert_eq!(data.battery, 87);
//! # Ok::<(), ibsth_types::ParseError>(())
//! ```

pub mod checksum;
pub mod error;
pub mod frame;
pub mod types;
pub mod uuid;

pub use checksum::checksum;
pub use error::{ParseError, ParseResult};
pub use frame::{FRAME_LEN, Frame};
pub use types::{ProbeType, Reading, SensorData};
pub use uuid::{DEVICE_NAME, SERVICE_SHORT_ID, SERVICE_UUID};
