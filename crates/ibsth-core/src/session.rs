//! Realtime reading subscription.
//!
//! A [`ScanSession`] owns the scanning lifecycle for one identity cache and
//! turns raw radio discoveries into [`Reading`]s for a subscriber callback.
//!
//! # Lifecycle
//!
//! ```text
//!            subscribe (radio on)
//!   Idle ─────────────────────────────▶ Scanning
//!    │                                   ▲    │
//!    │ subscribe (radio off)   PoweredOn │    │ radio off
//!    ▼                                   │    ▼
//!   AwaitingRadio ◀─────────────────────────────
//! ```
//!
//! `unsubscribe` returns to `Idle` from any state.
//!
//! # Per-discovery pipeline
//!
//! 1. Drop advertisements whose local name is not the sensor's.
//! 2. Drop payloads that are not one valid frame (length, checksum).
//! 3. Consult the identity cache: an unknown scan identifier starts a
//!    resolution handshake and is dropped, a pending one is dropped, a
//!    resolved one is decoded and delivered with its hardware address.
//!
//! Dropped advertisements are normal traffic on a shared channel and are
//! logged at trace level only.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ibsth_core::{BtleRadio, IdentityCache, JsonFileStore, ScanSession};
//! use ibsth_core::store::ADDRESS_CACHE_NAME;
//!
//! # async fn example() -> ibsth_core::Result<()> {
//! let radio = Arc::new(BtleRadio::new().await?);
//! let store = Arc::new(JsonFileStore::open_default());
//! let cache = IdentityCache::open_shared(store, ADDRESS_CACHE_NAME)?;
//! let session = ScanSession::new(radio, cache);
//!
//! session.subscribe(|reading| println!("{}", reading)).await?;
//! tokio::signal::ctrl_c().await?;
//! session.unsubscribe().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use ibsth_types::{DEVICE_NAME, Frame, ParseError, Reading, SERVICE_UUID};

use crate::cache::{IdentityState, SharedCache};
use crate::error::Result;
use crate::resolver::{DEFAULT_CONNECT_TIMEOUT, IdentityResolver};
use crate::traits::{Advertisement, Radio, RadioEvent, RadioState, ScanFilter};
use crate::util::{lock, read, write};

/// Callback receiving resolved readings.
pub type ReadingCallback = Arc<dyn Fn(Reading) + Send + Sync>;

/// Options for a scan session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Local name that identifies the sensor.
    pub device_name: String,
    /// Service UUID used as the scan filter.
    pub service: Uuid,
    /// Report every advertisement, not just the first per peripheral.
    pub allow_duplicates: bool,
    /// Timeout for the connect half of the address handshake.
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device_name: DEVICE_NAME.to_string(),
            service: SERVICE_UUID,
            allow_duplicates: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SessionOptions {
    /// Create new options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised name to match.
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Set the service UUID to filter on.
    pub fn service(mut self, service: Uuid) -> Self {
        self.service = service;
        self
    }

    /// Enable or disable duplicate advertisements.
    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }

    /// Set the connect timeout for address resolution.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn scan_filter(&self) -> ScanFilter {
        ScanFilter {
            services: vec![self.service],
        }
    }
}

/// Lifecycle state of a [`ScanSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not subscribed.
    Idle,
    /// Subscribed, waiting for the radio to power on.
    AwaitingRadio,
    /// Receiving advertisements.
    Scanning,
}

/// Why an advertisement did not produce a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Advertised name is not the sensor's.
    ForeignDevice,
    /// Payload is not exactly one frame long.
    InvalidLength,
    /// Frame checksum does not match.
    ChecksumMismatch,
    /// Scan identifier was unknown; an address handshake was started.
    ResolutionStarted,
    /// An address handshake for this scan identifier is already running.
    ResolutionInFlight,
}

/// Result of processing one advertisement.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    /// Nothing was delivered.
    Ignored(IgnoreReason),
    /// A reading was produced and handed to the subscriber, if any.
    Delivered(Reading),
}

struct Shared<R: Radio> {
    radio: Arc<R>,
    cache: SharedCache,
    resolver: IdentityResolver<R>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    callback: RwLock<Option<ReadingCallback>>,
}

struct Active {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Delivers resolved sensor readings to a subscriber.
pub struct ScanSession<R: Radio> {
    shared: Arc<Shared<R>>,
    active: tokio::sync::Mutex<Option<Active>>,
}

impl<R: Radio> std::fmt::Debug for ScanSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("state", &self.state())
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

impl<R: Radio> ScanSession<R> {
    /// Create a session with default options.
    pub fn new(radio: Arc<R>, cache: SharedCache) -> Self {
        Self::with_options(radio, cache, SessionOptions::default())
    }

    /// Create a session with custom options.
    pub fn with_options(radio: Arc<R>, cache: SharedCache, options: SessionOptions) -> Self {
        let resolver = IdentityResolver::new(Arc::clone(&radio), Arc::clone(&cache))
            .connect_timeout(options.connect_timeout);
        Self {
            shared: Arc::new(Shared {
                radio,
                cache,
                resolver,
                options,
                state: Mutex::new(SessionState::Idle),
                callback: RwLock::new(None),
            }),
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    /// The identity cache this session resolves against.
    pub fn cache(&self) -> &SharedCache {
        &self.shared.cache
    }

    /// The session's options.
    pub fn options(&self) -> &SessionOptions {
        &self.shared.options
    }

    /// Start delivering readings to `callback`.
    ///
    /// Calling this while already subscribed replaces the callback and keeps
    /// the existing scan; no second listener is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the radio's event stream cannot be opened or
    /// scanning cannot be started. The session stays idle in that case.
    pub async fn subscribe<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(Reading) + Send + Sync + 'static,
    {
        let mut active = self.active.lock().await;

        if let Some(current) = active.as_ref()
            && !current.task.is_finished()
        {
            *write(&self.shared.callback) = Some(Arc::new(callback));
            debug!("Already subscribed, callback replaced");
            return Ok(());
        }

        // The previous loop ended on its own; let it finish winding down.
        if let Some(stale) = active.take() {
            let _ = stale.task.await;
        }

        let events = self.shared.radio.events().await?;

        let initial = if self.shared.radio.state().await.is_powered() {
            self.shared.start_scanning().await?;
            SessionState::Scanning
        } else {
            info!("Bluetooth not powered, waiting for radio");
            SessionState::AwaitingRadio
        };

        *write(&self.shared.callback) = Some(Arc::new(callback));
        self.shared.set_state(initial);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(Arc::clone(&self.shared), events, cancel.clone()));
        *active = Some(Active { cancel, task });

        Ok(())
    }

    /// Stop delivering readings.
    ///
    /// Address handshakes already in flight are not aborted; they still
    /// update the cache. Safe to call when not subscribed.
    ///
    /// # Errors
    ///
    /// Returns an error if the radio fails to stop scanning. The session is
    /// idle afterwards regardless.
    pub async fn unsubscribe(&self) -> Result<()> {
        let Some(current) = self.active.lock().await.take() else {
            return Ok(());
        };

        current.cancel.cancel();
        if let Err(e) = current.task.await {
            warn!("Scan loop ended abnormally: {}", e);
        }

        *write(&self.shared.callback) = None;
        let result = self.shared.wind_down().await;
        info!("Unsubscribed from realtime readings");
        result
    }

    /// Run one advertisement through the pipeline.
    ///
    /// Readings are handed to the current subscriber, if any, and returned.
    pub async fn handle_discovery(&self, advertisement: Advertisement) -> DiscoveryOutcome {
        self.shared.handle_discovery(advertisement).await
    }
}

impl<R: Radio> Drop for ScanSession<R> {
    fn drop(&mut self) {
        if let Some(current) = self.active.get_mut().take() {
            current.cancel.cancel();
            warn!("ScanSession dropped while subscribed; call unsubscribe() to stop scanning");
        }
    }
}

async fn run<R: Radio>(
    shared: Arc<Shared<R>>,
    mut events: BoxStream<'static, RadioEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Scan loop cancelled");
                return;
            }
            event = events.next() => match event {
                Some(RadioEvent::StateChanged(state)) => shared.on_state_change(state).await,
                Some(RadioEvent::Discovered(advertisement)) => {
                    if shared.state() == SessionState::Scanning {
                        shared.handle_discovery(advertisement).await;
                    }
                }
                None => {
                    warn!("Radio event stream closed");
                    break;
                }
            }
        }
    }

    *write(&shared.callback) = None;
    if let Err(e) = shared.wind_down().await {
        error!("Failed to stop scanning: {}", e);
    }
}

impl<R: Radio> Shared<R> {
    fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *lock(&self.state), state);
        if previous != state {
            debug!(?previous, ?state, "Session state changed");
        }
    }

    async fn start_scanning(&self) -> Result<()> {
        self.radio
            .start_scanning(&self.options.scan_filter(), self.options.allow_duplicates)
            .await?;
        info!(
            service = %self.options.service,
            allow_duplicates = self.options.allow_duplicates,
            "Scanning for sensors"
        );
        Ok(())
    }

    async fn wind_down(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *lock(&self.state), SessionState::Idle);
        if previous == SessionState::Scanning {
            self.radio.stop_scanning().await?;
            debug!("Scanning stopped");
        }
        Ok(())
    }

    async fn on_state_change(&self, radio_state: RadioState) {
        match (self.state(), radio_state.is_powered()) {
            (SessionState::AwaitingRadio, true) => match self.start_scanning().await {
                Ok(()) => self.set_state(SessionState::Scanning),
                Err(e) => error!("Failed to start scanning: {}", e),
            },
            (SessionState::Scanning, false) => {
                warn!(?radio_state, "Bluetooth lost power, waiting for radio");
                self.set_state(SessionState::AwaitingRadio);
            }
            (state, _) => trace!(?state, ?radio_state, "Radio state change ignored"),
        }
    }

    async fn handle_discovery(&self, adv: Advertisement) -> DiscoveryOutcome {
        if adv.name.as_deref() != Some(self.options.device_name.as_str()) {
            trace!(scan_id = %adv.scan_id, name = ?adv.name, "Ignoring foreign device");
            return DiscoveryOutcome::Ignored(IgnoreReason::ForeignDevice);
        }

        let frame = match Frame::parse(&adv.manufacturer_data) {
            Ok(frame) => frame,
            Err(ParseError::InvalidLength { actual, .. }) => {
                trace!(scan_id = %adv.scan_id, len = actual, "Ignoring payload of wrong length");
                return DiscoveryOutcome::Ignored(IgnoreReason::InvalidLength);
            }
            Err(e) => {
                trace!(scan_id = %adv.scan_id, "Ignoring corrupt frame: {}", e);
                return DiscoveryOutcome::Ignored(IgnoreReason::ChecksumMismatch);
            }
        };

        let identity = self.cache.lock().await.lookup(&adv.scan_id);
        let address = match identity {
            IdentityState::Absent => {
                return match self.resolver.begin(&adv.scan_id).await {
                    Some(_handshake) => {
                        debug!(scan_id = %adv.scan_id, "New sensor, resolving address");
                        DiscoveryOutcome::Ignored(IgnoreReason::ResolutionStarted)
                    }
                    None => DiscoveryOutcome::Ignored(IgnoreReason::ResolutionInFlight),
                };
            }
            IdentityState::Pending => {
                trace!(scan_id = %adv.scan_id, "Address resolution in flight");
                return DiscoveryOutcome::Ignored(IgnoreReason::ResolutionInFlight);
            }
            IdentityState::Resolved(address) => address,
        };

        let reading = Reading::new(
            frame.decode(),
            Some(address),
            adv.scan_id,
            OffsetDateTime::now_utc(),
        )
        .with_rssi(adv.rssi);

        let callback = read(&self.callback).clone();
        if let Some(callback) = callback {
            debug!(
                address = reading.address.as_deref().unwrap_or_default(),
                temperature = reading.temperature,
                humidity = reading.humidity,
                "Delivering reading"
            );
            callback(reading.clone());
        }

        DiscoveryOutcome::Delivered(reading)
    }
}
