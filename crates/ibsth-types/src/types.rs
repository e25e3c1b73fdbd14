//! Core types for IBS-TH sensor data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Which sensor produced a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProbeType {
    /// The probe byte held a value the decoder does not know.
    #[default]
    Unknown,
    /// The sensor built into the device body.
    BuiltIn,
    /// An external wired probe.
    External,
}

impl From<u8> for ProbeType {
    fn from(value: u8) -> Self {
        match value {
            0 => ProbeType::BuiltIn,
            1 => ProbeType::External,
            _ => ProbeType::Unknown,
        }
    }
}

impl fmt::Display for ProbeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeType::Unknown => write!(f, "unknown"),
            ProbeType::BuiltIn => write!(f, "built-in"),
            ProbeType::External => write!(f, "external"),
        }
    }
}

/// Measurement values carried by a single advertisement frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorData {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
    /// Which probe produced the measurement.
    pub probe: ProbeType,
    /// Battery level in percent (0-100 expected, not enforced).
    pub battery: u8,
}

/// A decoded measurement attributed to a resolved device.
///
/// Readings are created fresh for every valid frame and never mutated.
///
/// Use [`address`](Self::address) to identify the device. The
/// [`scan_id`](Self::scan_id) field is kept for diagnostics only: it is
/// assigned by the local radio stack and changes when the sensor
/// power-cycles, so it should not be used as a device key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Durable hardware address of the device.
    pub address: Option<String>,
    /// When the advertisement was received.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub captured_at: OffsetDateTime,
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
    /// Which probe produced the measurement.
    pub probe: ProbeType,
    /// Battery level in percent.
    pub battery: u8,
    /// Radio-assigned scan identifier. Diagnostic only, prefer `address`.
    pub scan_id: String,
    /// Signal strength of the advertisement in dBm, if reported.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub rssi: Option<i16>,
}

impl Reading {
    /// Assemble a reading from decoded sensor data.
    #[must_use]
    pub fn new(
        data: SensorData,
        address: Option<String>,
        scan_id: impl Into<String>,
        captured_at: OffsetDateTime,
    ) -> Self {
        Self {
            address,
            captured_at,
            temperature: data.temperature,
            humidity: data.humidity,
            probe: data.probe,
            battery: data.battery,
            scan_id: scan_id.into(),
            rssi: None,
        }
    }

    /// Attach the advertisement's signal strength.
    #[must_use]
    pub fn with_rssi(mut self, rssi: Option<i16>) -> Self {
        self.rssi = rssi;
        self
    }

    /// The measurement values without identity or timestamp.
    #[must_use]
    pub fn data(&self) -> SensorData {
        SensorData {
            temperature: self.temperature,
            humidity: self.humidity,
            probe: self.probe,
            battery: self.battery,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2}°C {:.2}% probe={} battery={}%",
            self.address.as_deref().unwrap_or("<unresolved>"),
            self.temperature,
            self.humidity,
            self.probe,
            self.battery
        )
    }
}
