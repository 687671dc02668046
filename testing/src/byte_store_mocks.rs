//! In-memory byte store doubles
//!
//! Provides fast, deterministic storage for persistence tests:
//! - [`InMemoryByteStore`]: HashMap-based storage that always succeeds
//! - [`ControlledByteStore`]: gets and sets block until the test releases
//!   them, for rehydration races and write coalescing
//! - [`FailingByteStore`]: gets and/or sets fail on demand

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use todo_store_core::byte_store::{ByteStore, ByteStoreError, ByteStoreFuture};
use tokio::sync::{Semaphore, watch};

/// In-memory byte store for fast, deterministic testing.
///
/// Clones share the same underlying map.
///
/// # Example
///
/// ```
/// use todo_store_testing::InMemoryByteStore;
/// use todo_store_core::byte_store::ByteStore;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryByteStore::new();
/// store.set("root", b"state".to_vec()).await.unwrap();
/// assert_eq!(store.get("root").await.unwrap(), Some(b"state".to_vec()));
/// assert_eq!(store.set_calls(), 1);
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryByteStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    set_calls: Arc<AtomicUsize>,
}

impl InMemoryByteStore {
    /// Create a new empty in-memory byte store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one entry
    #[must_use]
    pub fn with_entry(key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        store.insert(key, bytes);
        store
    }

    /// Write an entry directly, without counting it as a `set` call
    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.data
            .write()
            .unwrap()
            .insert(key.to_string(), bytes.into());
    }

    /// Read an entry directly
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data.read().unwrap().get(key).cloned()
    }

    /// Check if a key exists in the store
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    /// Get the number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    /// Number of `set` calls received through the [`ByteStore`] trait
    #[must_use]
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

impl ByteStore for InMemoryByteStore {
    fn get<'a>(&'a self, key: &'a str) -> ByteStoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move { Ok(self.raw(key)) })
    }

    fn set<'a>(&'a self, key: &'a str, bytes: Vec<u8>) -> ByteStoreFuture<'a, ()> {
        Box::pin(async move {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            self.insert(key, bytes);
            Ok(())
        })
    }
}

/// Byte store whose operations wait for the test to release them.
///
/// Every `get` and `set` is recorded when it *arrives*, then blocks until a
/// permit is released for it (or the gate is opened). This makes in-flight
/// operations observable and lets a test decide exactly when they resolve.
///
/// # Example
///
/// ```ignore
/// let bytes = Arc::new(ControlledByteStore::new());
/// let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
///
/// bytes.wait_for_gets(1).await;     // load is in flight
/// store.dispatch(action)?;          // races the load
/// bytes.release_get();              // now let it resolve
/// persistence.ready().await;
/// ```
#[derive(Debug)]
pub struct ControlledByteStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
    get_gate: Semaphore,
    set_gate: Semaphore,
    get_calls: watch::Sender<usize>,
    set_calls: watch::Sender<usize>,
    set_log: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ControlledByteStore {
    /// Create an empty store with both gates closed
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            get_gate: Semaphore::new(0),
            set_gate: Semaphore::new(0),
            get_calls: watch::channel(0).0,
            set_calls: watch::channel(0).0,
            set_log: Mutex::new(Vec::new()),
        }
    }

    /// Pre-populate an entry
    #[must_use]
    pub fn with_entry(self, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.into());
        self
    }

    /// Let one pending (or future) `get` complete
    pub fn release_get(&self) {
        self.get_gate.add_permits(1);
    }

    /// Let `n` pending (or future) `set` calls complete
    pub fn release_sets(&self, n: usize) {
        self.set_gate.add_permits(n);
    }

    /// Stop gating `get`: every current and future call completes
    pub fn open_gets(&self) {
        self.get_gate.close();
    }

    /// Stop gating `set`: every current and future call completes
    pub fn open_sets(&self) {
        self.set_gate.close();
    }

    /// Wait until at least `n` `get` calls have arrived
    pub async fn wait_for_gets(&self, n: usize) {
        let _ = self.get_calls.subscribe().wait_for(|calls| *calls >= n).await;
    }

    /// Wait until at least `n` `set` calls have arrived
    pub async fn wait_for_sets(&self, n: usize) {
        let _ = self.set_calls.subscribe().wait_for(|calls| *calls >= n).await;
    }

    /// Number of `set` calls that have arrived, completed or not
    #[must_use]
    pub fn set_calls(&self) -> usize {
        *self.set_calls.borrow()
    }

    /// Every `set` call in arrival order
    #[must_use]
    pub fn sets(&self) -> Vec<(String, Vec<u8>)> {
        self.set_log.lock().unwrap().clone()
    }

    /// Read an entry directly
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(key).cloned()
    }
}

impl Default for ControlledByteStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for one permit; a closed gate lets everything through
async fn pass(gate: &Semaphore) {
    if let Ok(permit) = gate.acquire().await {
        permit.forget();
    }
}

impl ByteStore for ControlledByteStore {
    fn get<'a>(&'a self, key: &'a str) -> ByteStoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            self.get_calls.send_modify(|calls| *calls += 1);
            pass(&self.get_gate).await;
            Ok(self.raw(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, bytes: Vec<u8>) -> ByteStoreFuture<'a, ()> {
        Box::pin(async move {
            self.set_log
                .lock()
                .unwrap()
                .push((key.to_string(), bytes.clone()));
            self.set_calls.send_modify(|calls| *calls += 1);
            pass(&self.set_gate).await;
            self.data.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        })
    }
}

/// Byte store that fails on demand.
///
/// Successful operations are served by an inner [`InMemoryByteStore`].
#[derive(Debug, Default)]
pub struct FailingByteStore {
    inner: InMemoryByteStore,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
}

impl FailingByteStore {
    /// Create a store where every `get` and `set` fails
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: InMemoryByteStore::new(),
            fail_gets: AtomicBool::new(true),
            fail_sets: AtomicBool::new(true),
        }
    }

    /// Create a store that succeeds until told otherwise
    #[must_use]
    pub fn healthy() -> Self {
        Self::default()
    }

    /// Toggle failure of `get`
    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Toggle failure of `set`
    pub fn set_fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// The backing store for successful operations
    #[must_use]
    pub const fn inner(&self) -> &InMemoryByteStore {
        &self.inner
    }
}

impl ByteStore for FailingByteStore {
    fn get<'a>(&'a self, key: &'a str) -> ByteStoreFuture<'a, Option<Vec<u8>>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err::<Option<Vec<u8>>, _>(ByteStoreError::Unavailable(
                    "injected get failure".to_string(),
                ))
            });
        }
        self.inner.get(key)
    }

    fn set<'a>(&'a self, key: &'a str, bytes: Vec<u8>) -> ByteStoreFuture<'a, ()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err::<(), _>(ByteStoreError::Io("injected set failure".to_string()))
            });
        }
        self.inner.set(key, bytes)
    }
}
