//! BLE monitoring library for IBS-TH temperature/humidity sensors.
//!
//! The sensor broadcasts its measurements in a 9-byte manufacturer-data
//! frame and never needs a connection to be read. This crate scans for those
//! advertisements, validates and decodes them, and labels each reading with
//! the sensor's durable hardware address.
//!
//! # Identity
//!
//! A radio stack reports peripherals under a *scan identifier* that it
//! assigns itself. On macOS that identifier is an opaque UUID and the real
//! address is hidden until a connection is made. The first time a sensor is
//! heard, the session connects to it once, records its address in an
//! [`IdentityCache`] and disconnects. Readings from that sensor are dropped
//! until the address is known, and delivered with it afterwards. Resolved
//! addresses are persisted so later runs skip the handshake.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ibsth_core::{BtleRadio, IdentityCache, JsonFileStore, ScanSession};
//! use ibsth_core::store::ADDRESS_CACHE_NAME;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let radio = Arc::new(BtleRadio::new().await?);
//!     let store = Arc::new(JsonFileStore::open_default());
//!     let cache = IdentityCache::open_shared(store, ADDRESS_CACHE_NAME)?;
//!
//!     let session = ScanSession::new(radio, cache);
//!     session
//!         .subscribe(|reading| {
//!             println!("{}: {:.2}°C {:.2}%", reading.address.as_deref().unwrap_or("?"),
//!                 reading.temperature, reading.humidity);
//!         })
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     session.unsubscribe().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing without hardware
//!
//! [`mock::MockRadio`] implements [`Radio`] with scripted events and
//! [`mock::MemoryStore`] keeps the cache in memory.

pub mod cache;
pub mod error;
pub mod mock;
pub mod resolver;
pub mod scan;
pub mod session;
pub mod store;
pub mod traits;
pub mod util;

// Core exports
pub use cache::{IdentityCache, IdentityState, SharedCache};
pub use error::{Error, Result};
pub use resolver::{DEFAULT_CONNECT_TIMEOUT, IdentityResolver};
pub use scan::BtleRadio;
pub use session::{
    DiscoveryOutcome, IgnoreReason, ReadingCallback, ScanSession, SessionOptions, SessionState,
};
pub use store::{JsonFileStore, KeyValueStore};
pub use traits::{Advertisement, Radio, RadioEvent, RadioState, ScanFilter};
pub use util::{format_peripheral_id, hardware_address};

// Re-export from ibsth-types
pub use ibsth_types::uuid as uuids;
pub use ibsth_types::{Frame, ParseError, ProbeType, Reading, SensorData};
