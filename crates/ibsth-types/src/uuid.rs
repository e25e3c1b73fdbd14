//! Bluetooth identifiers for IBS-TH sensors.
//!
//! The sensor is recognised purely from its advertisement: a fixed local
//! name and a fixed 16-bit service identifier. No GATT characteristics are
//! used.

use uuid::{Uuid, uuid};

/// Local name advertised by every IBS-TH sensor.
pub const DEVICE_NAME: &str = "sps";

/// 16-bit service identifier advertised by the sensor.
pub const SERVICE_SHORT_ID: u16 = 0xFFF0;

/// Full 128-bit form of [`SERVICE_SHORT_ID`], used as the scan filter.
pub const SERVICE_UUID: Uuid = uuid!("0000fff0-0000-1000-8000-00805f9b34fb");

const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Expand a 16-bit SIG short identifier into a full UUID.
#[must_use]
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_uuid_matches_short_id() {
        assert_eq!(from_short(SERVICE_SHORT_ID), SERVICE_UUID);
    }

    #[test]
    fn test_from_short_standard_service() {
        assert_eq!(
            from_short(0x180A),
            uuid!("0000180a-0000-1000-8000-00805f9b34fb")
        );
    }
}
