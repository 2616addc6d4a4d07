//! Persistence adapters over a string key-value backend.
//!
//! Two flavours: [`PersistedStore`] keeps one JSON value in step with an
//! observable [`Store`], and [`RecordStore`] keeps expiring cached records.
//! Storage failures are logged and swallowed; in-memory state stays
//! authoritative for the session.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::Millis;
use crate::store::{Store, Subscription};
use crate::timing::{Clock, Debounce};

pub const STORY_LIBRARY_KEY: &str = "vma-story-library-v1";
pub const STORY_PLAYER_KEY: &str = "vma-story-player-v1";
pub const LAYER_PREFS_KEY: &str = "vma-layer-prefs-v1";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("storage quota exceeded")]
    Quota,
    #[error("failed to serialize value: {0}")]
    Serialize(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// String key-value backend (browser localStorage, memory).
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-memory backend. Clones share contents. An optional byte quota and an
/// availability switch let tests exercise failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Rc<RefCell<BTreeMap<String, String>>>,
    quota: Option<usize>,
    unavailable: Rc<Cell<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(bytes: usize) -> Self {
        MemoryStorage {
            quota: Some(bytes),
            ..Default::default()
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.get() {
            Err(StorageError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        if let Some(quota) = self.quota {
            let used: usize = self
                .items
                .borrow()
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::Quota);
            }
        }
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.items.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check()?;
        Ok(self.items.borrow().keys().cloned().collect())
    }
}

/// Read `key`, shallow-merging a stored object over an object default.
/// Anything unreadable yields the default.
pub fn load_value<T>(storage: &dyn KeyValueStore, key: &str, default: &T) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return default.clone(),
        Err(e) => {
            warn!("failed to load {key}: {e}");
            return default.clone();
        }
    };
    let stored: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("corrupt JSON under {key}: {e}");
            return default.clone();
        }
    };

    let merged = match (serde_json::to_value(default), stored) {
        (Ok(Value::Object(mut base)), Value::Object(over)) => {
            base.extend(over);
            Value::Object(base)
        }
        (_, stored) => stored,
    };

    serde_json::from_value(merged).unwrap_or_else(|e| {
        warn!("stored {key} does not match its schema: {e}");
        default.clone()
    })
}

/// Write `value` as JSON under `key`. Returns whether the write landed.
pub fn save_value<T: Serialize>(storage: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    let result = serde_json::to_string(value)
        .map_err(|e| StorageError::Serialize(e.to_string()))
        .and_then(|json| storage.set_item(key, &json));
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("failed to save {key}: {e}");
            false
        }
    }
}

struct PersistInner<T> {
    key: String,
    default: T,
    storage: Rc<dyn KeyValueStore>,
    clock: Option<Rc<dyn Clock>>,
    debounce: RefCell<Debounce>,
    store: Store<T>,
}

impl<T: Serialize + DeserializeOwned + Clone + 'static> PersistInner<T> {
    fn on_change(&self, value: &T) {
        match &self.clock {
            Some(clock) => self.debounce.borrow_mut().schedule(clock.now_ms()),
            None => {
                save_value(self.storage.as_ref(), &self.key, value);
            }
        }
    }

    fn write_current(&self) -> bool {
        self.store
            .with(|value| save_value(self.storage.as_ref(), &self.key, value))
    }
}

/// An observable value mirrored to a storage key.
///
/// Every write through the underlying [`Store`] (including writes made by a
/// wrapper holding a clone of it) is persisted, either at once or after the
/// debounce window. Debounced instances only write on [`poll`] or [`flush`].
///
/// [`poll`]: PersistedStore::poll
/// [`flush`]: PersistedStore::flush
pub struct PersistedStore<T: Clone + 'static> {
    inner: Rc<PersistInner<T>>,
    _subscription: Subscription,
}

impl<T> PersistedStore<T>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    /// Load `key` and write through on every change.
    pub fn open(key: impl Into<String>, default: T, storage: Rc<dyn KeyValueStore>) -> Self {
        Self::build(key.into(), default, storage, None, 0)
    }

    /// Load `key` and write the latest value `delay_ms` after the last change.
    pub fn open_debounced(
        key: impl Into<String>,
        default: T,
        storage: Rc<dyn KeyValueStore>,
        clock: Rc<dyn Clock>,
        delay_ms: Millis,
    ) -> Self {
        Self::build(key.into(), default, storage, Some(clock), delay_ms)
    }

    fn build(
        key: String,
        default: T,
        storage: Rc<dyn KeyValueStore>,
        clock: Option<Rc<dyn Clock>>,
        delay_ms: Millis,
    ) -> Self {
        let initial = load_value(storage.as_ref(), &key, &default);
        let inner = Rc::new(PersistInner {
            key,
            default,
            storage,
            clock,
            debounce: RefCell::new(Debounce::new(delay_ms)),
            store: Store::new(initial),
        });
        let weak: Weak<PersistInner<T>> = Rc::downgrade(&inner);
        let subscription = inner.store.subscribe(move |value| {
            if let Some(inner) = weak.upgrade() {
                inner.on_change(value);
            }
        });
        PersistedStore {
            inner,
            _subscription: subscription,
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn store(&self) -> &Store<T> {
        &self.inner.store
    }

    pub fn get(&self) -> T {
        self.inner.store.get()
    }

    pub fn set(&self, value: T) {
        self.inner.store.set(value);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.store.update(f);
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.inner.store.subscribe(listener)
    }

    pub fn reset(&self) {
        self.inner.store.set(self.inner.default.clone());
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.inner.debounce.borrow().next_deadline()
    }

    /// Write if the debounce window has elapsed.
    pub fn poll(&self) -> bool {
        let Some(clock) = &self.inner.clock else {
            return false;
        };
        let due = self.inner.debounce.borrow_mut().take_due(clock.now_ms());
        due && self.inner.write_current()
    }

    /// Write a pending change now (e.g. on page hide).
    pub fn flush(&self) -> bool {
        let pending = self.inner.debounce.borrow_mut().take_pending();
        pending && self.inner.write_current()
    }
}

/// Envelope written by [`RecordStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRecord<T> {
    pub data: T,
    pub timestamp: Millis,
    pub expires_at: Millis,
}

impl<T> CachedRecord<T> {
    /// Valid up to and including `expires_at`. A zero-length record never is.
    pub fn is_valid(&self, now: Millis) -> bool {
        self.expires_at > self.timestamp && now <= self.expires_at
    }
}

/// Expiring records grouped into named stores, kept under
/// `<namespace>:<store>:<key>`. Expired records are not deleted; they read as
/// misses until overwritten.
pub struct RecordStore {
    namespace: String,
    stores: Vec<String>,
    storage: Rc<dyn KeyValueStore>,
    clock: Rc<dyn Clock>,
}

impl RecordStore {
    pub fn new(
        namespace: impl Into<String>,
        stores: &[&str],
        storage: Rc<dyn KeyValueStore>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        RecordStore {
            namespace: namespace.into(),
            stores: stores.iter().map(|s| s.to_string()).collect(),
            storage,
            clock,
        }
    }

    fn prefix(&self, store: &str) -> Option<String> {
        if self.stores.iter().any(|s| s == store) {
            Some(format!("{}:{}:", self.namespace, store))
        } else {
            warn!("unknown record store {store}");
            None
        }
    }

    pub fn set<T: Serialize>(&self, store: &str, key: &str, data: &T, ttl_ms: Millis) -> bool {
        let Some(prefix) = self.prefix(store) else {
            return false;
        };
        let now = self.clock.now_ms();
        let record = CachedRecord {
            data,
            timestamp: now,
            expires_at: now.saturating_add(ttl_ms),
        };
        save_value(self.storage.as_ref(), &format!("{prefix}{key}"), &record)
    }

    pub fn get<T: DeserializeOwned>(&self, store: &str, key: &str) -> Option<CachedRecord<T>> {
        let prefix = self.prefix(store)?;
        let full = format!("{prefix}{key}");
        let raw = match self.storage.get_item(&full) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("failed to read {full}: {e}");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| warn!("corrupt record {full}: {e}"))
            .ok()
    }

    pub fn get_if_valid<T: DeserializeOwned>(&self, store: &str, key: &str) -> Option<T> {
        let record = self.get::<T>(store, key)?;
        record
            .is_valid(self.clock.now_ms())
            .then_some(record.data)
    }

    pub fn remove(&self, store: &str, key: &str) -> bool {
        let Some(prefix) = self.prefix(store) else {
            return false;
        };
        let full = format!("{prefix}{key}");
        self.storage
            .remove_item(&full)
            .map_err(|e| warn!("failed to remove {full}: {e}"))
            .is_ok()
    }

    fn keys_in(&self, prefix: &str) -> Vec<String> {
        match self.storage.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(prefix)).collect(),
            Err(e) => {
                warn!("failed to list keys: {e}");
                Vec::new()
            }
        }
    }

    pub fn clear(&self, store: &str) -> bool {
        let Some(prefix) = self.prefix(store) else {
            return false;
        };
        let mut ok = true;
        for key in self.keys_in(&prefix) {
            if let Err(e) = self.storage.remove_item(&key) {
                warn!("failed to remove {key}: {e}");
                ok = false;
            }
        }
        ok
    }

    pub fn clear_all(&self) {
        for store in self.stores.clone() {
            self.clear(&store);
        }
    }

    pub fn count(&self, store: &str) -> usize {
        self.prefix(store)
            .map(|prefix| self.keys_in(&prefix).len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LayerPreferences, StoryLibrary};
    use crate::timing::ManualClock;

    fn mem() -> (MemoryStorage, Rc<dyn KeyValueStore>) {
        let storage = MemoryStorage::new();
        let shared: Rc<dyn KeyValueStore> = Rc::new(storage.clone());
        (storage, shared)
    }

    #[test]
    fn test_missing_key_loads_default() {
        let (_, storage) = mem();
        let prefs = PersistedStore::open(LAYER_PREFS_KEY, LayerPreferences::default(), storage);
        assert_eq!(prefs.get(), LayerPreferences::default());
    }

    #[test]
    fn test_shallow_merge_over_object_default() {
        let (raw, storage) = mem();
        raw.set_item(LAYER_PREFS_KEY, r#"{"basemap":"g-satellite","legacyField":1}"#)
            .unwrap();
        let prefs = PersistedStore::open(LAYER_PREFS_KEY, LayerPreferences::default(), storage);
        let got = prefs.get();
        assert_eq!(got.basemap, "g-satellite");
        assert_eq!(got.view.side_ratio, 0.5);
    }

    #[test]
    fn test_legacy_hunts_survive_merge_with_default() {
        let (raw, storage) = mem();
        raw.set_item(
            STORY_LIBRARY_KEY,
            r#"{"hunts":[{"id":"h1","title":"Old town","stops":[]}]}"#,
        )
        .unwrap();
        let library = PersistedStore::open(STORY_LIBRARY_KEY, StoryLibrary::default(), storage);
        let stories = library.get().stories;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].id, "h1");
        assert_eq!(stories[0].title, "Old town");
    }

    #[test]
    fn test_non_object_replaces_default() {
        let (raw, storage) = mem();
        raw.set_item("list", "[3,4]").unwrap();
        let list = PersistedStore::open("list", vec![1, 2], storage);
        assert_eq!(list.get(), vec![3, 4]);
    }

    #[test]
    fn test_corrupt_json_falls_back() {
        let (raw, storage) = mem();
        raw.set_item(LAYER_PREFS_KEY, "{not json").unwrap();
        let prefs = PersistedStore::open(LAYER_PREFS_KEY, LayerPreferences::default(), storage);
        assert_eq!(prefs.get(), LayerPreferences::default());

        raw.set_item("n", r#""text""#).unwrap();
        let n = PersistedStore::open("n", 7u32, Rc::new(raw.clone()));
        assert_eq!(n.get(), 7);
    }

    #[test]
    fn test_immediate_write_through() {
        let (raw, storage) = mem();
        let counter = PersistedStore::open("count", 0u32, storage);
        counter.set(5);
        assert_eq!(raw.get_item("count").unwrap().as_deref(), Some("5"));
        counter.update(|v| *v += 1);
        assert_eq!(raw.get_item("count").unwrap().as_deref(), Some("6"));
        counter.reset();
        assert_eq!(raw.get_item("count").unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn test_writes_through_shared_store_handle() {
        let (raw, storage) = mem();
        let counter = PersistedStore::open("count", 0u32, storage);
        let handle = counter.store().clone();
        handle.set(9);
        assert_eq!(raw.get_item("count").unwrap().as_deref(), Some("9"));
    }

    #[test]
    fn test_debounced_writes_latest_value_once() {
        let (raw, storage) = mem();
        let clock = ManualClock::new(0);
        let counter = PersistedStore::open_debounced("count", 0u32, storage, Rc::new(clock.clone()), 250);
        counter.set(1);
        clock.advance(100);
        counter.set(2);
        clock.advance(200);
        assert!(!counter.poll());
        assert_eq!(raw.get_item("count").unwrap(), None);
        clock.advance(50);
        assert!(counter.poll());
        assert_eq!(raw.get_item("count").unwrap().as_deref(), Some("2"));
        assert!(!counter.poll());
    }

    #[test]
    fn test_flush_writes_pending() {
        let (raw, storage) = mem();
        let clock = ManualClock::new(0);
        let counter = PersistedStore::open_debounced("count", 0u32, storage, Rc::new(clock), 1000);
        assert!(!counter.flush());
        counter.set(3);
        assert!(counter.flush());
        assert_eq!(raw.get_item("count").unwrap().as_deref(), Some("3"));
        assert_eq!(counter.next_deadline(), None);
    }

    #[test]
    fn test_unavailable_storage_keeps_memory_state() {
        let (raw, storage) = mem();
        raw.set_unavailable(true);
        let counter = PersistedStore::open("count", 1u32, storage);
        counter.set(2);
        assert_eq!(counter.get(), 2);
        raw.set_unavailable(false);
        assert_eq!(raw.get_item("count").unwrap(), None);
    }

    #[test]
    fn test_quota_exceeded_is_a_noop() {
        let raw = MemoryStorage::with_quota(16);
        let storage: Rc<dyn KeyValueStore> = Rc::new(raw.clone());
        assert!(save_value(storage.as_ref(), "k", &"short"));
        assert!(!save_value(storage.as_ref(), "k2", &"a value that is far too long"));
        assert_eq!(raw.get_item("k2").unwrap(), None);
        assert_eq!(
            raw.set_item("k3", "0123456789abcdef"),
            Err(StorageError::Quota)
        );
    }

    fn records() -> (RecordStore, ManualClock, MemoryStorage) {
        let (raw, storage) = mem();
        let clock = ManualClock::new(1_000);
        let store = RecordStore::new("vma-cache", &["maps", "search"], storage, Rc::new(clock.clone()));
        (store, clock, raw)
    }

    #[test]
    fn test_record_ttl_zero_is_already_expired() {
        let (records, _clock, _) = records();
        assert!(records.set("maps", "all", &vec!["a"], 0));
        assert_eq!(records.get_if_valid::<Vec<String>>("maps", "all"), None);
        assert!(records.get::<Vec<String>>("maps", "all").is_some());
    }

    #[test]
    fn test_record_valid_until_expiry() {
        let (records, clock, _) = records();
        records.set("maps", "all", &42u32, 500);
        let rec = records.get::<u32>("maps", "all").unwrap();
        assert_eq!(rec.timestamp, 1_000);
        assert_eq!(rec.expires_at, 1_500);
        clock.advance(499);
        assert_eq!(records.get_if_valid::<u32>("maps", "all"), Some(42));
        clock.advance(1);
        assert_eq!(records.get_if_valid::<u32>("maps", "all"), Some(42));
        clock.advance(1);
        assert_eq!(records.get_if_valid::<u32>("maps", "all"), None);
    }

    #[test]
    fn test_record_envelope_schema() {
        let (records, _clock, raw) = records();
        records.set("search", "hanoi", &"x", 10);
        let json: Value =
            serde_json::from_str(&raw.get_item("vma-cache:search:hanoi").unwrap().unwrap()).unwrap();
        assert_eq!(json["data"], "x");
        assert_eq!(json["timestamp"], 1_000);
        assert_eq!(json["expiresAt"], 1_010);
    }

    #[test]
    fn test_record_clear_count_and_unknown_store() {
        let (records, _clock, raw) = records();
        records.set("maps", "a", &1, 100);
        records.set("maps", "b", &2, 100);
        records.set("search", "c", &3, 100);
        assert_eq!(records.count("maps"), 2);
        assert!(records.remove("maps", "a"));
        assert_eq!(records.count("maps"), 1);
        assert!(records.clear("maps"));
        assert_eq!(records.count("maps"), 0);
        assert_eq!(records.count("search"), 1);
        records.clear_all();
        assert!(raw.is_empty());

        assert!(!records.set("nope", "k", &1, 100));
        assert_eq!(records.count("nope"), 0);
        assert_eq!(records.get_if_valid::<i32>("nope", "k"), None);
    }

    #[test]
    fn test_record_corrupt_or_unavailable_is_miss() {
        let (records, _clock, raw) = records();
        raw.set_item("vma-cache:maps:bad", "garbage").unwrap();
        assert_eq!(records.get_if_valid::<u32>("maps", "bad"), None);
        raw.set_unavailable(true);
        assert!(!records.set("maps", "x", &1, 100));
        assert_eq!(records.count("maps"), 0);
        assert!(!records.remove("maps", "x"));
    }
}
