//! Durable key/value snapshots.
//!
//! The identity cache persists a flat `scan identifier -> hardware address`
//! mapping through the [`KeyValueStore`] contract. [`JsonFileStore`] keeps
//! one pretty-printed JSON object per name in a directory; writes replace the
//! whole file.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Default snapshot name for resolved addresses.
pub const ADDRESS_CACHE_NAME: &str = "addresses";

/// Load/save contract over named `string -> string` mappings.
pub trait KeyValueStore: Send + Sync {
    /// Load a mapping. A mapping that was never saved loads as empty.
    fn load(&self, name: &str) -> Result<BTreeMap<String, String>>;

    /// Replace a mapping with `entries`.
    fn save(&self, name: &str, entries: &BTreeMap<String, String>) -> Result<()>;
}

/// Stores each mapping as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at [`default_cache_dir`].
    pub fn open_default() -> Self {
        Self::new(default_cache_dir())
    }

    /// Directory holding the snapshot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn ensure_dir(&self) -> Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&self.dir)
            .map_err(|e| Error::persistence(&self.dir, e))
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let path = self.path_for(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No snapshot on disk");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(Error::persistence(path, e)),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, name: &str, entries: &BTreeMap<String, String>) -> Result<()> {
        self.ensure_dir()?;
        let path = self.path_for(name);
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&path, content).map_err(|e| Error::persistence(&path, e))?;
        debug!(path = %path.display(), entries = entries.len(), "Snapshot written");
        Ok(())
    }
}

/// Default snapshot directory following platform conventions.
///
/// - Linux: `~/.local/share/ibsth`
/// - macOS: `~/Library/Application Support/ibsth`
/// - Windows: `C:\Users\<user>\AppData\Local\ibsth`
pub fn default_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ibsth")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("B2".to_string(), "11:22:33:44:55:66".to_string()),
            ("A1".to_string(), "AA:BB:CC:DD:EE:FF".to_string()),
        ])
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load(ADDRESS_CACHE_NAME).unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.save(ADDRESS_CACHE_NAME, &sample()).unwrap();
        assert_eq!(store.load(ADDRESS_CACHE_NAME).unwrap(), sample());
    }

    #[test]
    fn test_save_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let path = store.path_for(ADDRESS_CACHE_NAME);

        store.save(ADDRESS_CACHE_NAME, &sample()).unwrap();
        let first = fs::read(&path).unwrap();
        store.save(ADDRESS_CACHE_NAME, &sample()).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_save_sorts_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.save(ADDRESS_CACHE_NAME, &sample()).unwrap();

        let content = fs::read_to_string(store.path_for(ADDRESS_CACHE_NAME)).unwrap();
        let a1 = content.find("A1").unwrap();
        let b2 = content.find("B2").unwrap();
        assert!(a1 < b2);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.save(ADDRESS_CACHE_NAME, &sample()).unwrap();
        store.save(ADDRESS_CACHE_NAME, &BTreeMap::new()).unwrap();
        assert!(store.load(ADDRESS_CACHE_NAME).unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = JsonFileStore::new(&nested);
        store.save(ADDRESS_CACHE_NAME, &sample()).unwrap();
        assert!(store.path_for(ADDRESS_CACHE_NAME).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_created_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cache");
        let store = JsonFileStore::new(&nested);
        store.save(ADDRESS_CACHE_NAME, &sample()).unwrap();

        let mode = fs::metadata(&nested).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.path_for(ADDRESS_CACHE_NAME), "{not json").unwrap();
        assert!(matches!(
            store.load(ADDRESS_CACHE_NAME),
            Err(Error::Serialization(_))
        ));
    }
}
