//! Utility functions for ibsth-core.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use btleplug::api::BDAddr;
use btleplug::platform::PeripheralId;

/// Format a peripheral ID as a scan identifier.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they wrap the
/// Bluetooth address. Either way the result is stable only for as long as
/// the radio keeps the peripheral bound.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// The hardware address as a string, or `None` when the platform hides it.
///
/// CoreBluetooth reports every peripheral as `00:00:00:00:00:00`.
pub fn hardware_address(address: BDAddr) -> Option<String> {
    if address == BDAddr::default() {
        None
    } else {
        Some(address.to_string())
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
