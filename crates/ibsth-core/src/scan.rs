//! btleplug-backed radio.
//!
//! [`BtleRadio`] adapts the first local Bluetooth adapter to the [`Radio`]
//! trait. Manufacturer data is re-assembled into the raw advertisement
//! payload: btleplug splits off the first two bytes as a company identifier,
//! which for this sensor are simply the start of the frame.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, Manager as _, Peripheral as _,
    ScanFilter as BtleScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::traits::{Advertisement, Radio, RadioEvent, RadioState, ScanFilter};
use crate::util::{format_peripheral_id, hardware_address, lock};

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters.into_iter().next().ok_or(Error::AdapterUnavailable)
}

/// Rebuild the raw payload from btleplug's split manufacturer data.
pub fn raw_payload(company_id: u16, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(data.len() + 2);
    payload.extend_from_slice(&company_id.to_le_bytes());
    payload.extend_from_slice(data);
    payload
}

impl From<CentralState> for RadioState {
    fn from(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOn => RadioState::PoweredOn,
            CentralState::PoweredOff => RadioState::PoweredOff,
            _ => RadioState::Unknown,
        }
    }
}

#[derive(Debug, Default)]
struct DuplicateFilter {
    allow: AtomicBool,
    seen: Mutex<HashSet<String>>,
}

impl DuplicateFilter {
    fn reset(&self, allow_duplicates: bool) {
        self.allow.store(allow_duplicates, Ordering::Relaxed);
        lock(&self.seen).clear();
    }

    /// Whether an advertisement from `scan_id` should be reported.
    fn admit(&self, scan_id: &str) -> bool {
        if self.allow.load(Ordering::Relaxed) {
            return true;
        }
        lock(&self.seen).insert(scan_id.to_string())
    }
}

/// A [`Radio`] backed by a btleplug adapter.
#[derive(Debug, Clone)]
pub struct BtleRadio {
    adapter: Adapter,
    duplicates: Arc<DuplicateFilter>,
}

impl BtleRadio {
    /// Open the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AdapterUnavailable`] if the host has no adapter.
    pub async fn new() -> Result<Self> {
        Ok(Self::with_adapter(get_adapter().await?))
    }

    /// Wrap an existing adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        let duplicates = DuplicateFilter::default();
        duplicates.reset(true);
        Self {
            adapter,
            duplicates: Arc::new(duplicates),
        }
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Search through known peripherals for one with this scan identifier.
    async fn find_peripheral(&self, scan_id: &str) -> Result<Peripheral> {
        let peripherals = self.adapter.peripherals().await?;
        peripherals
            .into_iter()
            .find(|p| format_peripheral_id(&p.id()) == scan_id)
            .ok_or_else(|| Error::DeviceNotFound(scan_id.to_string()))
    }
}

async fn translate(
    adapter: &Adapter,
    duplicates: &DuplicateFilter,
    event: CentralEvent,
) -> Option<RadioEvent> {
    match event {
        CentralEvent::StateUpdate(state) => Some(RadioEvent::StateChanged(state.into())),
        CentralEvent::ManufacturerDataAdvertisement {
            id,
            manufacturer_data,
        } => {
            let (company_id, data) = manufacturer_data.into_iter().next()?;
            let scan_id = format_peripheral_id(&id);
            if !duplicates.admit(&scan_id) {
                return None;
            }

            let properties = match adapter.peripheral(&id).await {
                Ok(peripheral) => peripheral.properties().await.ok().flatten(),
                Err(e) => {
                    trace!(scan_id = %scan_id, "Peripheral vanished before lookup: {}", e);
                    None
                }
            };

            let (name, rssi) = properties
                .map(|p| (p.local_name, p.rssi))
                .unwrap_or_default();

            Some(RadioEvent::Discovered(Advertisement {
                scan_id,
                name,
                manufacturer_data: raw_payload(company_id, &data),
                rssi,
            }))
        }
        _ => None,
    }
}

#[async_trait]
impl Radio for BtleRadio {
    async fn state(&self) -> RadioState {
        match self.adapter.adapter_state().await {
            Ok(state) => state.into(),
            Err(e) => {
                warn!("Could not query adapter state: {}", e);
                RadioState::Unknown
            }
        }
    }

    async fn events(&self) -> Result<BoxStream<'static, RadioEvent>> {
        let events = self.adapter.events().await?;
        let adapter = self.adapter.clone();
        let duplicates = Arc::clone(&self.duplicates);

        Ok(events
            .filter_map(move |event| {
                let adapter = adapter.clone();
                let duplicates = Arc::clone(&duplicates);
                async move { translate(&adapter, &duplicates, event).await }
            })
            .boxed())
    }

    async fn start_scanning(&self, filter: &ScanFilter, allow_duplicates: bool) -> Result<()> {
        self.duplicates.reset(allow_duplicates);
        self.adapter
            .start_scan(BtleScanFilter {
                services: filter.services.clone(),
            })
            .await?;
        info!("Started BLE scan");
        Ok(())
    }

    async fn stop_scanning(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        info!("Stopped BLE scan");
        Ok(())
    }

    async fn connect(&self, scan_id: &str) -> Result<Option<String>> {
        let peripheral = self.find_peripheral(scan_id).await?;
        peripheral.connect().await?;
        debug!(scan_id, "Connected");
        Ok(hardware_address(peripheral.address()))
    }

    async fn disconnect(&self, scan_id: &str) -> Result<()> {
        let peripheral = self.find_peripheral(scan_id).await?;
        peripheral.disconnect().await?;
        debug!(scan_id, "Disconnected");
        Ok(())
    }
}
