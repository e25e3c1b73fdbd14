//! Radio capability abstraction.
//!
//! The [`Radio`] trait is everything the scan session needs from a Bluetooth
//! stack: a powered-state query, an event stream, scan control and a
//! connect/disconnect primitive. [`BtleRadio`](crate::scan::BtleRadio) is
//! the btleplug-backed implementation; [`MockRadio`](crate::mock::MockRadio)
//! emits scripted events for tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;

/// Powered state of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioState {
    /// State not yet reported.
    #[default]
    Unknown,
    /// Adapter is powered and can scan.
    PoweredOn,
    /// Adapter is off or unavailable.
    PoweredOff,
}

impl RadioState {
    /// Whether scanning can start in this state.
    pub fn is_powered(&self) -> bool {
        matches!(self, RadioState::PoweredOn)
    }
}

/// A single advertisement seen by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Radio-assigned identifier of the advertising peripheral.
    pub scan_id: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Raw manufacturer-specific payload.
    pub manufacturer_data: Vec<u8>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

impl Advertisement {
    /// Create an advertisement without signal strength.
    pub fn new(
        scan_id: impl Into<String>,
        name: Option<&str>,
        manufacturer_data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            scan_id: scan_id.into(),
            name: name.map(str::to_string),
            manufacturer_data: manufacturer_data.into(),
            rssi: None,
        }
    }
}

/// Events emitted by a [`Radio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// The adapter's powered state changed.
    StateChanged(RadioState),
    /// An advertisement was received while scanning.
    Discovered(Advertisement),
}

/// Restricts a scan to peripherals advertising particular services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    /// Service UUIDs of interest. Empty means every peripheral.
    pub services: Vec<Uuid>,
}

/// Capability interface over a Bluetooth stack.
#[async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Current powered state of the adapter.
    async fn state(&self) -> RadioState;

    /// Subscribe to radio events.
    ///
    /// Each call returns an independent stream; dropping it detaches the
    /// listener.
    async fn events(&self) -> Result<BoxStream<'static, RadioEvent>>;

    /// Start scanning for advertisements.
    ///
    /// With `allow_duplicates` every advertisement is reported; otherwise only
    /// the first one per peripheral.
    async fn start_scanning(&self, filter: &ScanFilter, allow_duplicates: bool) -> Result<()>;

    /// Stop scanning.
    async fn stop_scanning(&self) -> Result<()>;

    /// Connect to a discovered peripheral.
    ///
    /// Returns the peripheral's durable hardware address when the stack
    /// reveals one.
    async fn connect(&self, scan_id: &str) -> Result<Option<String>>;

    /// Disconnect from a peripheral.
    async fn disconnect(&self, scan_id: &str) -> Result<()>;
}
