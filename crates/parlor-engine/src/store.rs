//! Keyed persistence for session records.
//!
//! Each record family lives in its own [`Store`], guarded by its own async
//! mutex. [`Store::lock`] hands out a [`StoreGuard`] that spans the whole
//! load-mutate-save sequence; every mutation made through the guard is
//! written to the [`Backend`] before the call returns, and rolled back in
//! memory if the write fails. Two stores never block each other.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store '{store}' I/O error on {path}: {source}")]
    Io {
        /// Store name.
        store: String,
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The backing file held invalid JSON.
    #[error("store '{store}' could not be (de)serialized: {source}")]
    Json {
        /// Store name.
        store: String,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Where a store's contents are kept.
pub trait Backend<T>: Send + Sync {
    /// Read the stored value, or `None` if nothing was stored yet.
    fn load(&self, store: &str) -> StoreResult<Option<T>>;

    /// Replace the stored value.
    fn save(&self, store: &str, value: &T) -> StoreResult<()>;
}

/// Keeps nothing; contents live only in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

impl<T> Backend<T> for MemoryBackend {
    fn load(&self, _store: &str) -> StoreResult<Option<T>> {
        Ok(None)
    }

    fn save(&self, _store: &str, _value: &T) -> StoreResult<()> {
        Ok(())
    }
}

/// Writes the whole value as pretty JSON on every save.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Back a store with the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, store: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            store: store.to_string(),
            path: self.path.clone(),
            source,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Backend<T> for JsonFileBackend {
    fn load(&self, store: &str) -> StoreResult<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| self.io_err(store, e))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Json {
                store: store.to_string(),
                source,
            })
    }

    fn save(&self, store: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
            store: store.to_string(),
            source,
        })?;
        // Write beside the target and rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_err(store, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(store, e))
    }
}

struct Slot<T> {
    value: T,
    backend: Box<dyn Backend<T>>,
}

/// A named, lock-guarded store holding one value of type `T`.
pub struct Store<T> {
    name: Arc<str>,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("name", &self.name).finish()
    }
}

impl<T: Clone + Default + Send + 'static> Store<T> {
    /// Open a store, loading any previously saved value.
    pub fn open(name: &str, backend: impl Backend<T> + 'static) -> StoreResult<Self> {
        let value = backend.load(name)?.unwrap_or_default();
        debug!(store = name, "opened store");
        Ok(Self {
            name: Arc::from(name),
            slot: Arc::new(Mutex::new(Slot {
                value,
                backend: Box::new(backend),
            })),
        })
    }

    /// A store that lives only in memory.
    pub fn in_memory(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            slot: Arc::new(Mutex::new(Slot {
                value: T::default(),
                backend: Box::new(MemoryBackend),
            })),
        }
    }

    /// Store name, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enter the store's critical section.
    pub async fn lock(&self) -> StoreGuard<'_, T> {
        StoreGuard {
            name: &self.name,
            slot: self.slot.lock().await,
        }
    }
}

/// Exclusive access to a store's contents.
///
/// Reads go through `Deref`. Mutations go through [`StoreGuard::mutate`],
/// which persists before returning.
pub struct StoreGuard<'a, T> {
    name: &'a str,
    slot: MutexGuard<'a, Slot<T>>,
}

impl<T> Deref for StoreGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.value
    }
}

impl<T: Clone> StoreGuard<'_, T> {
    /// Apply `f` and persist the result. If persisting fails the in-memory
    /// value is restored and the error returned.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> StoreResult<R> {
        let snapshot = self.slot.value.clone();
        let out = f(&mut self.slot.value);
        let slot = &mut *self.slot;
        if let Err(e) = slot.backend.save(self.name, &slot.value) {
            error!(store = self.name, error = %e, "write failed, rolling back");
            slot.value = snapshot;
            return Err(e);
        }
        Ok(out)
    }
}

/// A record kept in a [`Table`].
pub trait Record: Clone + Send + Sync + 'static {
    /// Primary key type.
    type Key: Ord + Copy + fmt::Debug + Send + Sync + 'static;

    /// This record's key.
    fn key(&self) -> Self::Key;
}

/// Records indexed by key; serialized as a plain list.
#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    rows: BTreeMap<R::Key, R>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<R: Record> Table<R> {
    /// Look up a record. Absence means the record no longer exists.
    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.rows.get(key)
    }

    /// All records, in key order.
    pub fn list(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    /// First record matching `pred`.
    pub fn find(&self, pred: impl Fn(&R) -> bool) -> Option<&R> {
        self.rows.values().find(|r| pred(r))
    }

    /// Insert or replace a record.
    pub fn put(&mut self, record: R) {
        self.rows.insert(record.key(), record);
    }

    /// Remove a record.
    pub fn remove(&mut self, key: &R::Key) -> Option<R> {
        self.rows.remove(key)
    }

    /// Keep only records matching `keep`; returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&R) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, r| keep(r));
        before - self.rows.len()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R: Record + Serialize> Serialize for Table<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.values())
    }
}

impl<'de, R: Record + Deserialize<'de>> Deserialize<'de> for Table<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<R>::deserialize(deserializer)?;
        Ok(Self {
            rows: rows.into_iter().map(|r| (r.key(), r)).collect(),
        })
    }
}

impl<R: Record> StoreGuard<'_, Table<R>> {
    /// Insert or replace a record and persist.
    pub fn put(&mut self, record: R) -> StoreResult<()> {
        self.mutate(|t| t.put(record))
    }

    /// Remove a record and persist.
    pub fn delete(&mut self, key: &R::Key) -> StoreResult<Option<R>> {
        self.mutate(|t| t.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u32,
        label: String,
    }

    impl Record for Row {
        type Key = u32;

        fn key(&self) -> u32 {
            self.id
        }
    }

    fn row(id: u32, label: &str) -> Row {
        Row {
            id,
            label: label.into(),
        }
    }

    struct FlakyBackend {
        fail: Arc<AtomicBool>,
    }

    impl<T> Backend<T> for FlakyBackend {
        fn load(&self, _store: &str) -> StoreResult<Option<T>> {
            Ok(None)
        }

        fn save(&self, store: &str, _value: &T) -> StoreResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(StoreError::Io {
                    store: store.into(),
                    path: PathBuf::from("/dev/full"),
                    source: std::io::Error::other("disk full"),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store: Store<Table<Row>> = Store::in_memory("rows");
        let mut guard = store.lock().await;
        guard.put(row(1, "a")).unwrap();
        guard.put(row(2, "b")).unwrap();
        assert_eq!(guard.get(&1).map(|r| r.label.as_str()), Some("a"));
        assert_eq!(guard.find(|r| r.label == "b").map(|r| r.id), Some(2));
        assert_eq!(guard.delete(&1).unwrap().map(|r| r.id), Some(1));
        assert!(guard.get(&1).is_none());
        assert_eq!(guard.len(), 1);
    }

    #[tokio::test]
    async fn json_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        {
            let store: Store<Table<Row>> =
                Store::open("rows", JsonFileBackend::new(&path)).unwrap();
            let mut guard = store.lock().await;
            guard.put(row(3, "c")).unwrap();
            guard.put(row(4, "d")).unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_start().starts_with('['));

        let reopened: Store<Table<Row>> =
            Store::open("rows", JsonFileBackend::new(&path)).unwrap();
        let guard = reopened.lock().await;
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.get(&4), Some(&row(4, "d")));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, "{not json").unwrap();
        let res: StoreResult<Store<Table<Row>>> = Store::open("rows", JsonFileBackend::new(&path));
        assert!(matches!(res, Err(StoreError::Json { .. })));
    }

    #[tokio::test]
    async fn failed_write_rolls_back() {
        let fail = Arc::new(AtomicBool::new(false));
        let store: Store<Table<Row>> = Store::open(
            "rows",
            FlakyBackend {
                fail: Arc::clone(&fail),
            },
        )
        .unwrap();
        let mut guard = store.lock().await;
        guard.put(row(1, "kept")).unwrap();
        fail.store(true, Ordering::SeqCst);
        assert!(guard.put(row(2, "lost")).is_err());
        assert!(guard.mutate(|t| t.retain(|_| false)).is_err());
        assert_eq!(guard.len(), 1);
        assert!(guard.get(&2).is_none());
    }

    #[tokio::test]
    async fn lock_serializes_read_modify_write() {
        let store: Store<Table<Row>> = Store::in_memory("rows");
        store.lock().await.put(row(1, "")).unwrap();
        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let mut guard = store.lock().await;
                let mut r = guard.get(&1).cloned().unwrap();
                tokio::task::yield_now().await;
                r.label.push_str(&i.to_string());
                r.label.push(',');
                guard.put(r).unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        let guard = store.lock().await;
        assert_eq!(guard.get(&1).unwrap().label.matches(',').count(), 20);
    }
}
