//! Mock radio and store implementations for testing.
//!
//! These allow exercising the scan session, resolver and cache without
//! Bluetooth hardware or a writable filesystem.
//!
//! # Features
//!
//! - **Scripted events**: push discovery and power-state events into every
//!   open event stream
//! - **Failure injection**: fail connects, disconnects, loads or saves
//! - **Latency simulation**: delay connects to keep handshakes in flight
//! - **Call recording**: inspect connect/disconnect/scan calls afterwards

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{BoxStream, StreamExt};

use ibsth_types::DEVICE_NAME;

use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use crate::traits::{Advertisement, Radio, RadioEvent, RadioState, ScanFilter};
use crate::util::lock;

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    maps: Mutex<HashMap<String, BTreeMap<String, String>>>,
    save_count: AtomicU32,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one mapping.
    pub fn with_entries(
        name: &str,
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let store = Self::new();
        lock(&store.maps).insert(name.to_string(), entries.into_iter().collect());
        store
    }

    /// Current contents of a mapping, if it was ever saved.
    pub fn snapshot(&self, name: &str) -> Option<BTreeMap<String, String>> {
        lock(&self.maps).get(name).cloned()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::Relaxed)
    }

    /// Make subsequent saves fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent loads fail, as with a corrupt file.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::Relaxed);
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, name: &str) -> Result<BTreeMap<String, String>> {
        if self.fail_loads.load(Ordering::Relaxed) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "mock load failure",
            )));
        }
        Ok(self.snapshot(name).unwrap_or_default())
    }

    fn save(&self, name: &str, entries: &BTreeMap<String, String>) -> Result<()> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(Error::persistence(
                format!("memory://{name}"),
                std::io::Error::other("mock save failure"),
            ));
        }
        lock(&self.maps).insert(name.to_string(), entries.clone());
        self.save_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A scripted [`Radio`].
///
/// # Example
///
/// ```
/// use ibsth_core::mock::{MockRadio, sensor_advertisement};
/// use ibsth_core::{Radio, RadioState};
///
/// #[tokio::main]
/// async fn main() {
///     let radio = MockRadio::new();
///     radio.set_address("A1", "AA:BB:CC:DD:EE:FF");
///
///     assert_eq!(radio.state().await, RadioState::PoweredOn);
///     assert_eq!(
///         radio.connect("A1").await.unwrap().as_deref(),
///         Some("AA:BB:CC:DD:EE:FF")
///     );
///     radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
/// }
/// ```
#[derive(Debug)]
pub struct MockRadio {
    state: Mutex<RadioState>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<RadioEvent>>>,
    scanning: AtomicBool,
    start_count: AtomicU32,
    stop_count: AtomicU32,
    last_scan: Mutex<Option<(ScanFilter, bool)>>,
    addresses: Mutex<HashMap<String, String>>,
    failing_connects: Mutex<HashSet<String>>,
    failing_disconnects: Mutex<HashSet<String>>,
    connected: Mutex<HashSet<String>>,
    connect_calls: Mutex<Vec<String>>,
    disconnect_calls: Mutex<Vec<String>>,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::with_state(RadioState::PoweredOn)
    }
}

impl MockRadio {
    /// Create a powered-on mock radio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock radio in the given state.
    pub fn with_state(state: RadioState) -> Self {
        Self {
            state: Mutex::new(state),
            listeners: Mutex::new(Vec::new()),
            scanning: AtomicBool::new(false),
            start_count: AtomicU32::new(0),
            stop_count: AtomicU32::new(0),
            last_scan: Mutex::new(None),
            addresses: Mutex::new(HashMap::new()),
            failing_connects: Mutex::new(HashSet::new()),
            failing_disconnects: Mutex::new(HashSet::new()),
            connected: Mutex::new(HashSet::new()),
            connect_calls: Mutex::new(Vec::new()),
            disconnect_calls: Mutex::new(Vec::new()),
            connect_latency_ms: AtomicU64::new(0),
        }
    }

    /// Deliver an event to every open event stream.
    pub fn emit(&self, event: RadioEvent) {
        if let RadioEvent::StateChanged(state) = &event {
            *lock(&self.state) = *state;
        }
        let mut listeners = lock(&self.listeners);
        listeners.retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    /// Deliver a discovery event.
    pub fn emit_discovery(&self, advertisement: Advertisement) {
        self.emit(RadioEvent::Discovered(advertisement));
    }

    /// Change the powered state and notify listeners.
    pub fn set_state(&self, state: RadioState) {
        self.emit(RadioEvent::StateChanged(state));
    }

    /// Close every open event stream.
    pub fn close_events(&self) {
        lock(&self.listeners).clear();
    }

    /// Number of event streams still being listened to.
    pub fn listener_count(&self) -> usize {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }

    /// Address revealed when connecting to `scan_id`.
    pub fn set_address(&self, scan_id: &str, address: &str) {
        lock(&self.addresses).insert(scan_id.to_string(), address.to_string());
    }

    /// Make connects to `scan_id` fail.
    pub fn fail_connect(&self, scan_id: &str, fail: bool) {
        let mut failing = lock(&self.failing_connects);
        if fail {
            failing.insert(scan_id.to_string());
        } else {
            failing.remove(scan_id);
        }
    }

    /// Make disconnects from `scan_id` fail.
    pub fn fail_disconnect(&self, scan_id: &str, fail: bool) {
        let mut failing = lock(&self.failing_disconnects);
        if fail {
            failing.insert(scan_id.to_string());
        } else {
            failing.remove(scan_id);
        }
    }

    /// Set simulated connect latency.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Number of `start_scanning` calls that succeeded.
    pub fn start_count(&self) -> u32 {
        self.start_count.load(Ordering::Relaxed)
    }

    /// Number of `stop_scanning` calls.
    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::Relaxed)
    }

    /// Filter and duplicate policy of the most recent scan.
    pub fn last_scan(&self) -> Option<(ScanFilter, bool)> {
        lock(&self.last_scan).clone()
    }

    /// Scan identifiers passed to `connect`, in call order.
    pub fn connect_calls(&self) -> Vec<String> {
        lock(&self.connect_calls).clone()
    }

    /// Scan identifiers passed to `disconnect`, in call order.
    pub fn disconnect_calls(&self) -> Vec<String> {
        lock(&self.disconnect_calls).clone()
    }

    /// Whether a connection to `scan_id` is open.
    pub fn is_connected(&self, scan_id: &str) -> bool {
        lock(&self.connected).contains(scan_id)
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn state(&self) -> RadioState {
        *lock(&self.state)
    }

    async fn events(&self) -> Result<BoxStream<'static, RadioEvent>> {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.listeners).push(tx);
        Ok(rx.boxed())
    }

    async fn start_scanning(&self, filter: &ScanFilter, allow_duplicates: bool) -> Result<()> {
        if !lock(&self.state).is_powered() {
            return Err(Error::AdapterUnavailable);
        }
        *lock(&self.last_scan) = Some((filter.clone(), allow_duplicates));
        self.scanning.store(true, Ordering::Relaxed);
        self.start_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_scanning(&self) -> Result<()> {
        self.scanning.store(false, Ordering::Relaxed);
        self.stop_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn connect(&self, scan_id: &str) -> Result<Option<String>> {
        lock(&self.connect_calls).push(scan_id.to_string());

        let latency = self.connect_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if lock(&self.failing_connects).contains(scan_id) {
            return Err(Error::DeviceNotFound(scan_id.to_string()));
        }

        lock(&self.connected).insert(scan_id.to_string());
        Ok(lock(&self.addresses).get(scan_id).cloned())
    }

    async fn disconnect(&self, scan_id: &str) -> Result<()> {
        lock(&self.disconnect_calls).push(scan_id.to_string());
        if lock(&self.failing_disconnects).contains(scan_id) {
            return Err(Error::DeviceNotFound(scan_id.to_string()));
        }
        lock(&self.connected).remove(scan_id);
        Ok(())
    }
}

/// Build an advertisement carrying a valid sensor frame.
pub fn sensor_advertisement(
    scan_id: &str,
    temperature_raw: i16,
    humidity_raw: u16,
    probe: u8,
    battery: u8,
) -> Advertisement {
    Advertisement::new(
        scan_id,
        Some(DEVICE_NAME),
        ibsth_types::frame::encode(temperature_raw, humidity_raw, probe, battery),
    )
}
