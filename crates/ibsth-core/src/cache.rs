//! Scan identifier to hardware address cache.
//!
//! Each scan identifier is in one of three states:
//!
//! ```text
//! Absent ──mark_pending──▶ Pending ──resolve──▶ Resolved(address)
//!    ▲                        │
//!    └─────────forget─────────┘
//! ```
//!
//! Only resolved entries are persisted. A crash while an entry is pending
//! therefore leaves nothing behind, and the entry starts out absent again on
//! the next run.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::KeyValueStore;

/// Cache shared between a scan session and its resolution handshakes.
pub type SharedCache = Arc<Mutex<IdentityCache>>;

/// Resolution state of a scan identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    /// Never seen, or a previous resolution failed.
    Absent,
    /// A connect/disconnect handshake is in flight.
    Pending,
    /// The durable hardware address is known.
    Resolved(String),
}

impl IdentityState {
    /// The resolved address, if any.
    pub fn address(&self) -> Option<&str> {
        match self {
            IdentityState::Resolved(address) => Some(address),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityState::Absent => write!(f, "absent"),
            IdentityState::Pending => write!(f, "pending"),
            IdentityState::Resolved(address) => write!(f, "resolved({})", address),
        }
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Pending,
    Resolved(String),
}

/// Persistent identity cache.
pub struct IdentityCache {
    store: Arc<dyn KeyValueStore>,
    name: String,
    entries: HashMap<String, Entry>,
}

impl fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl IdentityCache {
    /// Load the cache named `name` from `store`.
    ///
    /// An unreadable or corrupt snapshot is treated as empty. An empty cache
    /// is written back immediately so the storage location is valid for the
    /// next run.
    ///
    /// # Errors
    ///
    /// Returns an error if the self-healing write fails.
    pub fn open(store: Arc<dyn KeyValueStore>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let loaded = match store.load(&name) {
            Ok(map) => map,
            Err(e) => {
                warn!(cache = %name, "Discarding unreadable identity snapshot: {}", e);
                BTreeMap::new()
            }
        };

        let entries: HashMap<String, Entry> = loaded
            .into_iter()
            .map(|(scan_id, address)| (scan_id, Entry::Resolved(address)))
            .collect();

        let cache = Self {
            store,
            name,
            entries,
        };

        if cache.entries.is_empty() {
            cache.flush()?;
        } else {
            debug!(cache = %cache.name, entries = cache.entries.len(), "Identity cache loaded");
        }

        Ok(cache)
    }

    /// Open a cache and wrap it for sharing.
    pub fn open_shared(
        store: Arc<dyn KeyValueStore>,
        name: impl Into<String>,
    ) -> Result<SharedCache> {
        Ok(Arc::new(Mutex::new(Self::open(store, name)?)))
    }

    /// Current state of `scan_id`.
    pub fn lookup(&self, scan_id: &str) -> IdentityState {
        match self.entries.get(scan_id) {
            None => IdentityState::Absent,
            Some(Entry::Pending) => IdentityState::Pending,
            Some(Entry::Resolved(address)) => IdentityState::Resolved(address.clone()),
        }
    }

    /// Move an absent entry to pending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the entry is not absent.
    pub fn mark_pending(&mut self, scan_id: &str) -> Result<()> {
        match self.lookup(scan_id) {
            IdentityState::Absent => {
                self.entries.insert(scan_id.to_string(), Entry::Pending);
                debug!(scan_id, "Identity pending");
                Ok(())
            }
            state => Err(Error::invalid_transition(scan_id, state)),
        }
    }

    /// Move a pending entry to resolved and persist the snapshot.
    ///
    /// If the snapshot cannot be written the entry is left pending and the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the entry is not pending, or
    /// the store's error if persisting fails.
    pub fn resolve(&mut self, scan_id: &str, address: impl Into<String>) -> Result<()> {
        let state = self.lookup(scan_id);
        if state != IdentityState::Pending {
            return Err(Error::invalid_transition(scan_id, state));
        }

        let address = address.into();
        self.entries
            .insert(scan_id.to_string(), Entry::Resolved(address.clone()));

        if let Err(e) = self.flush() {
            self.entries.insert(scan_id.to_string(), Entry::Pending);
            return Err(e);
        }

        debug!(scan_id, address = %address, "Identity resolved");
        Ok(())
    }

    /// Remove any entry for `scan_id`, returning its previous state.
    ///
    /// Removing a resolved entry rewrites the snapshot; a failure to do so is
    /// logged, the in-memory removal stands.
    pub fn forget(&mut self, scan_id: &str) -> IdentityState {
        let previous = self.lookup(scan_id);
        self.entries.remove(scan_id);

        if let IdentityState::Resolved(_) = previous
            && let Err(e) = self.flush()
        {
            warn!(scan_id, "Failed to persist eviction: {}", e);
        }

        debug!(scan_id, previous = %previous, "Identity forgotten");
        previous
    }

    /// Drop every entry and persist the empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store's error if persisting fails.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.flush()
    }

    /// Snapshot of resolved entries, sorted by scan identifier.
    pub fn resolved(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(scan_id, entry)| match entry {
                Entry::Resolved(address) => Some((scan_id.clone(), address.clone())),
                Entry::Pending => None,
            })
            .collect()
    }

    /// Number of entries, pending included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name of the snapshot in the backing store.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn flush(&self) -> Result<()> {
        self.store.save(&self.name, &self.resolved())
    }
}
