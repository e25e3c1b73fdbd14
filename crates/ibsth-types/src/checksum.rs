//! Frame checksum.
//!
//! The sensor firmware protects the measurement bytes with a table-less
//! 16-bit CRC: reflected polynomial `0xA001`, initial value `0xFFFF`, no
//! final XOR (the parameters commonly known as CRC-16/MODBUS).

/// Reflected polynomial used by the firmware.
pub const POLYNOMIAL: u16 = 0xA001;

/// Initial accumulator value.
pub const INITIAL: u16 = 0xFFFF;

/// Compute the checksum over `data`.
///
/// Total over any input; the checksum of an empty slice is [`INITIAL`].
///
/// # Examples
///
/// ```
/// use ibsth_types::checksum::checksum;
///
/// assert_eq!(checksum(b"123456789"), 0x4B37);
/// assert_eq!(checksum(&[]), 0xFFFF);
/// ```
#[must_use]
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(INITIAL, |mut crc, &byte| {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
        }
        crc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_zero_frame_golden() {
        assert_eq!(checksum(&[0x00, 0x00, 0x00, 0x00, 0x00]), 0x0024);
    }

    #[test]
    fn test_checksum_check_value() {
        assert_eq!(checksum(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_checksum_empty() {
        assert_eq!(checksum(&[]), INITIAL);
    }

    #[test]
    fn test_checksum_measurement_bytes() {
        // 21.50 °C, 55.32 %RH, built-in probe
        assert_eq!(checksum(&[0x66, 0x08, 0x9C, 0x15, 0x00]), 0xD6E0);
    }

    #[test]
    fn test_checksum_sensitive_to_each_byte() {
        let base = [0x66, 0x08, 0x9C, 0x15, 0x00];
        let reference = checksum(&base);
        for i in 0..base.len() {
            let mut flipped = base;
            flipped[i] ^= 0x01;
            assert_ne!(checksum(&flipped), reference, "byte {} not covered", i);
        }
    }
}
