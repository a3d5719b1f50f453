//! Durable key-value storage for timestamps, tokens and cart contents.
//!
//! The coordinator is decoupled from the physical storage mechanism through
//! the [`KeyValueStore`] trait. [`DurableStore`] layers the handful of keys
//! the coordinator actually uses on top of any backend.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cart::CartItem;
use crate::error::{Error, Result};

/// Key under which the cart's last-activity timestamp (epoch millis) lives.
pub const CART_TIMESTAMP_KEY: &str = "cartTimestamp";

/// Key under which the opaque session token lives.
pub const TOKEN_KEY: &str = "token";

/// Key under which the cart line items are persisted as JSON.
pub const CART_ITEMS_KEY: &str = "cartItems";

/// Trait for durable string key-value backends.
///
/// All operations are synchronous and local.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given key currently holds a value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// File-backed store keeping every key in one JSON object on disk.
///
/// The file is re-read on every access so that several processes sharing
/// the path observe each other's writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    /// Create a store persisting to `path`. The file is created lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Store(format!("Failed to read {}: {}", self.path.display(), e)))?;

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| Error::Store(format!("Failed to parse {}: {}", self.path.display(), e)))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Store(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| Error::Store(format!("Failed to serialize store: {}", e)))?;

        std::fs::write(&self.path, json)
            .map_err(|e| Error::Store(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.read();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.write();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.write();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

// ============================================================================
// DurableStore
// ============================================================================

/// Typed access to the keys the coordinator persists.
///
/// Write failures are logged and swallowed: a broken store degrades the
/// client to in-memory behaviour but never aborts a cart or session command.
#[derive(Debug, Clone)]
pub struct DurableStore {
    backend: Arc<dyn KeyValueStore>,
}

impl DurableStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// In-memory store, mostly useful for tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Raw cart timestamp, if any. Read failures count as absent.
    pub fn cart_timestamp_raw(&self) -> Option<String> {
        self.read(CART_TIMESTAMP_KEY)
    }

    /// Cart timestamp in epoch millis. `Some(Err)` when present but unparseable.
    pub fn cart_timestamp(&self) -> Option<std::result::Result<i64, String>> {
        self.cart_timestamp_raw()
            .map(|raw| raw.trim().parse::<i64>().map_err(|_| raw))
    }

    pub fn set_cart_timestamp(&self, millis: i64) {
        self.write(CART_TIMESTAMP_KEY, &millis.to_string());
    }

    pub fn remove_cart_timestamp(&self) {
        self.delete(CART_TIMESTAMP_KEY);
    }

    /// The persisted session token, if any.
    pub fn token(&self) -> Option<String> {
        self.read(TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) {
        self.write(TOKEN_KEY, token);
    }

    pub fn remove_token(&self) {
        self.delete(TOKEN_KEY);
    }

    /// Persisted cart line items. Corrupt JSON is logged and treated as empty.
    pub fn cart_items(&self) -> Vec<CartItem> {
        let Some(raw) = self.read(CART_ITEMS_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted cart contents");
                Vec::new()
            }
        }
    }

    /// Persist the cart line items, removing the key when there are none.
    pub fn set_cart_items(&self, items: &[CartItem]) {
        if items.is_empty() {
            self.delete(CART_ITEMS_KEY);
            return;
        }
        match serde_json::to_string(items) {
            Ok(json) => self.write(CART_ITEMS_KEY, &json),
            Err(e) => warn!(error = %e, "Failed to serialize cart contents"),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Durable store read failed");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            warn!(key, error = %e, "Durable store write failed");
        } else {
            debug!(key, "Durable store key written");
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!(key, error = %e, "Durable store remove failed");
        } else {
            debug!(key, "Durable store key removed");
        }
    }
}
