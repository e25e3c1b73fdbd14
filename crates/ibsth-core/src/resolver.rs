//! Scan identifier to hardware address resolution.
//!
//! Advertisements only carry the radio-assigned scan identifier. The durable
//! hardware address is learned by briefly connecting to the sensor: the
//! radio's connect acknowledgment reveals it, and the connection is closed
//! straight away without reading any data.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::cache::{IdentityState, SharedCache};
use crate::error::{Error, Result};
use crate::traits::Radio;

/// Default timeout for the connect half of the handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Drives connect/disconnect handshakes and records their outcome.
pub struct IdentityResolver<R: Radio> {
    radio: Arc<R>,
    cache: SharedCache,
    connect_timeout: Duration,
}

impl<R: Radio> Clone for IdentityResolver<R> {
    fn clone(&self) -> Self {
        Self {
            radio: Arc::clone(&self.radio),
            cache: Arc::clone(&self.cache),
            connect_timeout: self.connect_timeout,
        }
    }
}

impl<R: Radio> IdentityResolver<R> {
    /// Create a resolver with the default connect timeout.
    pub fn new(radio: Arc<R>, cache: SharedCache) -> Self {
        Self {
            radio,
            cache,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Start resolving `scan_id` if nothing is known about it yet.
    ///
    /// The entry is marked pending before this returns, so a second call for
    /// the same identifier returns `None` until the handshake fails. The
    /// handshake runs on its own task and is not cancelled by dropping the
    /// returned handle.
    pub async fn begin(&self, scan_id: &str) -> Option<JoinHandle<Result<String>>> {
        {
            let mut cache = self.cache.lock().await;
            if cache.lookup(scan_id) != IdentityState::Absent {
                return None;
            }
            if let Err(e) = cache.mark_pending(scan_id) {
                error!(scan_id, "Could not mark identity pending: {}", e);
                return None;
            }
        }

        let resolver = self.clone();
        let scan_id = scan_id.to_string();
        Some(tokio::spawn(async move { resolver.handshake(scan_id).await }))
    }

    async fn handshake(self, scan_id: String) -> Result<String> {
        debug!(scan_id = %scan_id, "Starting address handshake");

        match self.connect_and_release(&scan_id).await {
            Ok(address) => {
                match self.persist(&scan_id, &address).await {
                    Ok(()) => {
                        info!(scan_id = %scan_id, address = %address, "Resolved sensor address");
                        Ok(address)
                    }
                    Err(e) => {
                        error!(scan_id = %scan_id, "Failed to persist resolved address: {}", e);
                        self.cache.lock().await.forget(&scan_id);
                        Err(e)
                    }
                }
            }
            Err(e) => {
                error!(scan_id = %scan_id, "Address handshake failed: {}", e);
                self.cache.lock().await.forget(&scan_id);
                Err(e)
            }
        }
    }

    /// Marks the entry resolved on the blocking pool; the snapshot write is
    /// synchronous file I/O and runs with the cache lock held.
    async fn persist(&self, scan_id: &str, address: &str) -> Result<()> {
        let mut cache = self.cache.clone().lock_owned().await;
        let scan_id = scan_id.to_string();
        let address = address.to_string();
        tokio::task::spawn_blocking(move || cache.resolve(&scan_id, address))
            .await
            .map_err(std::io::Error::from)?
    }

    async fn connect_and_release(&self, scan_id: &str) -> Result<String> {
        let address = timeout(self.connect_timeout, self.radio.connect(scan_id))
            .await
            .map_err(|_| Error::timeout("connect", self.connect_timeout))??;

        self.radio.disconnect(scan_id).await?;

        address.ok_or_else(|| Error::NoAddress(scan_id.to_string()))
    }
}
