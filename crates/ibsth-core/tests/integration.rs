//! End-to-end tests for ibsth-core against the scripted radio.
//!
//! These exercise the full pipeline (scan session, checksum gate, identity
//! resolution and persistence) without Bluetooth hardware.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ibsth_core::mock::{MemoryStore, MockRadio, sensor_advertisement};
use ibsth_core::store::ADDRESS_CACHE_NAME;
use ibsth_core::{
    Advertisement, IdentityCache, IdentityState, JsonFileStore, ProbeType, RadioState, Reading,
    ScanSession, SessionState,
};
use tokio::time::{sleep, timeout};

const ADDR: &str = "AA:BB:CC:DD:EE:FF";

type Collected = Arc<Mutex<Vec<Reading>>>;

fn collector() -> (Collected, impl Fn(Reading) + Send + Sync + 'static) {
    let readings: Collected = Arc::new(Mutex::new(Vec::new()));
    let sink = readings.clone();
    (readings, move |reading| sink.lock().unwrap().push(reading))
}

fn count(readings: &Collected) -> usize {
    readings.lock().unwrap().len()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn state_of(session: &ScanSession<MockRadio>, scan_id: &str) -> IdentityState {
    session.cache().lock().await.lookup(scan_id)
}

async fn wait_for_state(session: &ScanSession<MockRadio>, scan_id: &str, want: IdentityState) {
    timeout(Duration::from_secs(2), async {
        while state_of(session, scan_id).await != want {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("identity state not reached in time");
}

#[tokio::test]
async fn test_first_sighting_resolves_then_delivers() {
    let radio = Arc::new(MockRadio::new());
    radio.set_address("A1", ADDR);
    radio.set_connect_latency(Duration::from_millis(50));
    let store = Arc::new(MemoryStore::new());
    let cache = IdentityCache::open_shared(store.clone(), ADDRESS_CACHE_NAME).unwrap();
    let session = ScanSession::new(radio.clone(), cache);

    let (readings, callback) = collector();
    session.subscribe(callback).await.unwrap();

    // Unknown identifier: one connect, entry pending, nothing delivered.
    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    wait_for_state(&session, "A1", IdentityState::Pending).await;
    assert_eq!(count(&readings), 0);

    // Further sightings while the handshake runs are dropped without a new connect.
    radio.emit_discovery(sensor_advertisement("A1", 2151, 5530, 0, 87));
    wait_for_state(&session, "A1", IdentityState::Resolved(ADDR.to_string())).await;
    assert_eq!(radio.connect_calls(), vec!["A1"]);
    assert_eq!(radio.disconnect_calls(), vec!["A1"]);
    assert_eq!(count(&readings), 0);

    let persisted = store.snapshot(ADDRESS_CACHE_NAME).unwrap();
    assert_eq!(persisted.get("A1").map(String::as_str), Some(ADDR));

    // Resolved: the next sighting is delivered with the hardware address.
    radio.emit_discovery(sensor_advertisement("A1", -1000, 8200, 1, 42));
    wait_until(|| count(&readings) == 1).await;

    let reading = readings.lock().unwrap()[0].clone();
    assert_eq!(reading.address.as_deref(), Some(ADDR));
    assert_eq!(reading.scan_id, "A1");
    assert_eq!(reading.temperature, -10.0);
    assert_eq!(reading.humidity, 82.0);
    assert_eq!(reading.probe, ProbeType::External);
    assert_eq!(reading.battery, 42);
    assert_eq!(radio.connect_calls().len(), 1);

    session.unsubscribe().await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_corrupt_frames_never_reach_callback() {
    let radio = Arc::new(MockRadio::new());
    let store = Arc::new(MemoryStore::with_entries(
        ADDRESS_CACHE_NAME,
        [("A1".to_string(), ADDR.to_string())],
    ));
    let cache = IdentityCache::open_shared(store, ADDRESS_CACHE_NAME).unwrap();
    let session = ScanSession::new(radio.clone(), cache);

    let (readings, callback) = collector();
    session.subscribe(callback).await.unwrap();

    let mut corrupt = sensor_advertisement("A1", 2150, 5532, 0, 87);
    corrupt.manufacturer_data[0] ^= 0x01;
    radio.emit_discovery(corrupt);

    let mut unknown_corrupt = sensor_advertisement("B2", 2150, 5532, 0, 87);
    unknown_corrupt.manufacturer_data[5] ^= 0xFF;
    radio.emit_discovery(unknown_corrupt);

    radio.emit_discovery(Advertisement::new("B2", Some("sps"), vec![0u8; 10]));

    // A valid frame afterwards proves the earlier events were processed.
    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    wait_until(|| count(&readings) == 1).await;

    assert!(radio.connect_calls().is_empty());
    assert_eq!(state_of(&session, "B2").await, IdentityState::Absent);

    session.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_failed_handshake_retries_on_next_sighting() {
    let radio = Arc::new(MockRadio::new());
    radio.fail_connect("A1", true);
    let cache =
        IdentityCache::open_shared(Arc::new(MemoryStore::new()), ADDRESS_CACHE_NAME).unwrap();
    let session = ScanSession::new(radio.clone(), cache);

    let (readings, callback) = collector();
    session.subscribe(callback).await.unwrap();

    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    wait_until(|| radio.connect_calls().len() == 1).await;
    wait_for_state(&session, "A1", IdentityState::Absent).await;

    radio.fail_connect("A1", false);
    radio.set_address("A1", ADDR);
    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    wait_for_state(&session, "A1", IdentityState::Resolved(ADDR.to_string())).await;
    assert_eq!(radio.connect_calls().len(), 2);

    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    wait_until(|| count(&readings) == 1).await;

    session.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_lets_handshake_finish() {
    let radio = Arc::new(MockRadio::new());
    radio.set_address("A1", ADDR);
    radio.set_connect_latency(Duration::from_millis(50));
    let store = Arc::new(MemoryStore::new());
    let cache = IdentityCache::open_shared(store.clone(), ADDRESS_CACHE_NAME).unwrap();
    let session = ScanSession::new(radio.clone(), cache);

    let (readings, callback) = collector();
    session.subscribe(callback).await.unwrap();

    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    wait_for_state(&session, "A1", IdentityState::Pending).await;

    session.unsubscribe().await.unwrap();
    assert!(!radio.is_scanning());

    wait_for_state(&session, "A1", IdentityState::Resolved(ADDR.to_string())).await;
    let persisted = store.snapshot(ADDRESS_CACHE_NAME).unwrap();
    assert_eq!(persisted.get("A1").map(String::as_str), Some(ADDR));

    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    sleep(Duration::from_millis(20)).await;
    assert_eq!(count(&readings), 0);
}

#[tokio::test]
async fn test_waits_for_radio_before_scanning() {
    let radio = Arc::new(MockRadio::with_state(RadioState::PoweredOff));
    let cache =
        IdentityCache::open_shared(Arc::new(MemoryStore::new()), ADDRESS_CACHE_NAME).unwrap();
    let session = ScanSession::new(radio.clone(), cache);

    let (_readings, callback) = collector();
    session.subscribe(callback).await.unwrap();
    assert_eq!(session.state(), SessionState::AwaitingRadio);
    assert!(!radio.is_scanning());

    radio.set_state(RadioState::PoweredOn);
    wait_until(|| radio.is_scanning()).await;
    assert_eq!(session.state(), SessionState::Scanning);

    session.unsubscribe().await.unwrap();
    assert!(!radio.is_scanning());
}

#[tokio::test]
async fn test_resolved_addresses_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let radio = Arc::new(MockRadio::new());
        radio.set_address("A1", ADDR);
        let store = Arc::new(JsonFileStore::new(dir.path()));
        let cache = IdentityCache::open_shared(store, ADDRESS_CACHE_NAME).unwrap();
        let session = ScanSession::new(radio.clone(), cache);

        let (_readings, callback) = collector();
        session.subscribe(callback).await.unwrap();
        radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
        wait_for_state(&session, "A1", IdentityState::Resolved(ADDR.to_string())).await;
        session.unsubscribe().await.unwrap();
    }

    let radio = Arc::new(MockRadio::new());
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let cache = IdentityCache::open_shared(store, ADDRESS_CACHE_NAME).unwrap();
    let session = ScanSession::new(radio.clone(), cache);

    let (readings, callback) = collector();
    session.subscribe(callback).await.unwrap();
    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    wait_until(|| count(&readings) == 1).await;

    assert!(radio.connect_calls().is_empty());
    assert_eq!(readings.lock().unwrap()[0].address.as_deref(), Some(ADDR));

    session.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_two_sensors_resolved_independently() {
    let radio = Arc::new(MockRadio::new());
    radio.set_address("A1", ADDR);
    radio.set_address("B2", "11:22:33:44:55:66");
    let cache =
        IdentityCache::open_shared(Arc::new(MemoryStore::new()), ADDRESS_CACHE_NAME).unwrap();
    let session = ScanSession::new(radio.clone(), cache);

    let (readings, callback) = collector();
    session.subscribe(callback).await.unwrap();

    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    radio.emit_discovery(sensor_advertisement("B2", 1800, 4000, 0, 60));
    wait_for_state(&session, "A1", IdentityState::Resolved(ADDR.to_string())).await;
    wait_for_state(
        &session,
        "B2",
        IdentityState::Resolved("11:22:33:44:55:66".to_string()),
    )
    .await;

    radio.emit_discovery(sensor_advertisement("A1", 2150, 5532, 0, 87));
    radio.emit_discovery(sensor_advertisement("B2", 1800, 4000, 0, 60));
    wait_until(|| count(&readings) == 2).await;

    let mut addresses: Vec<_> = readings
        .lock()
        .unwrap()
        .iter()
        .filter_map(|r| r.address.clone())
        .collect();
    addresses.sort();
    assert_eq!(addresses, vec!["11:22:33:44:55:66", ADDR]);

    session.unsubscribe().await.unwrap();
}
