//! Persistence adapter: rehydration at startup and debounced write-back.
//!
//! [`Persistor::attach`] connects a [`Store`] to a [`ByteStore`]:
//!
//! 1. **Uninitialized → Rehydrating**: a tokio task loads the envelope
//!    stored under the configured key. The store keeps serving dispatches
//!    from its initial state meanwhile.
//! 2. **Rehydrating → Ready**: a loaded snapshot replaces the current state
//!    only if no dispatch was accepted since `attach`. Otherwise the live
//!    state wins, the loaded snapshot is discarded and the live state is
//!    written once so the byte store no longer holds the stale envelope. A
//!    missing, corrupt or wrong-version envelope counts as "no prior state".
//! 3. **Ready**: every state change is written back. At most one save is in
//!    flight; changes arriving meanwhile are coalesced and only the latest
//!    is written once the in-flight save finishes.
//!
//! Failures never reach `dispatch`. They are logged, counted and handed to
//! the optional [`PersistConfig::on_failure`] callback. Failed saves are not
//! retried; the next state change writes the latest snapshot again.

use crate::store::{Store, Subscription};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use thiserror::Error;
use todo_store_core::byte_store::{ByteStore, ByteStoreError};
use todo_store_core::reducer::Reducer;
use todo_store_core::state::Snapshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Key used when none is configured
pub const DEFAULT_KEY: &str = "root";

/// Envelope format version written by this crate
pub const CURRENT_VERSION: u32 = 1;

/// Errors reported by the persistence adapter
///
/// None of these are fatal; they are delivered through the side channel
/// described in the module docs.
#[derive(Error, Debug)]
pub enum PersistError {
    /// Reading the envelope from the byte store failed
    #[error("Failed to load persisted state: {0}")]
    Load(#[source] ByteStoreError),

    /// Writing the envelope to the byte store failed
    #[error("Failed to save state: {0}")]
    Save(#[source] ByteStoreError),

    /// The snapshot could not be encoded
    #[error("Failed to encode state envelope: {0}")]
    Encode(#[source] serde_json::Error),

    /// The stored bytes are not a valid envelope
    #[error("Failed to decode state envelope: {0}")]
    Decode(#[source] serde_json::Error),

    /// The stored envelope was written with a different format version
    #[error("Persisted state has version {found}, expected {expected}")]
    VersionMismatch {
        /// Version found in the byte store
        found: u32,
        /// Version this adapter reads and writes
        expected: u32,
    },
}

/// The record stored in the byte store
///
/// Encoded as JSON: `{"version": 1, "state": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistEnvelope<S> {
    /// Format version
    pub version: u32,
    /// The persisted snapshot
    pub state: S,
}

/// Only the version field, so a mismatch is detected even when the state
/// shape has changed
#[derive(Deserialize)]
struct EnvelopeHeader {
    version: u32,
}

impl<S> PersistEnvelope<S> {
    /// Wrap a snapshot with a format version
    #[must_use]
    pub const fn new(version: u32, state: S) -> Self {
        Self { version, state }
    }
}

impl<S: Serialize> PersistEnvelope<S> {
    /// Encode the envelope to bytes
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Encode`] if the snapshot cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>, PersistError> {
        serde_json::to_vec(self).map_err(PersistError::Encode)
    }
}

impl<S: DeserializeOwned> PersistEnvelope<S> {
    /// Decode an envelope, checking its version
    ///
    /// # Errors
    ///
    /// - [`PersistError::Decode`]: the bytes are not an envelope
    /// - [`PersistError::VersionMismatch`]: the envelope has another version
    pub fn decode(bytes: &[u8], expected_version: u32) -> Result<Self, PersistError> {
        let header: EnvelopeHeader = serde_json::from_slice(bytes).map_err(PersistError::Decode)?;
        if header.version != expected_version {
            return Err(PersistError::VersionMismatch {
                found: header.version,
                expected: expected_version,
            });
        }
        serde_json::from_slice(bytes).map_err(PersistError::Decode)
    }
}

/// Callback receiving non-fatal persistence failures
pub type FailureHandler = Arc<dyn Fn(&PersistError) + Send + Sync>;

/// Configuration for a [`Persistor`]
///
/// # Example
///
/// ```
/// use todo_store_runtime::PersistConfig;
///
/// let config = PersistConfig::default()
///     .with_key("todos")
///     .on_failure(|error| eprintln!("persistence degraded: {error}"));
/// assert_eq!(config.key(), "todos");
/// ```
#[derive(Clone)]
pub struct PersistConfig {
    key: String,
    version: u32,
    on_failure: Option<FailureHandler>,
}

impl PersistConfig {
    /// Create a configuration for the given key and format version
    #[must_use]
    pub fn new(key: impl Into<String>, version: u32) -> Self {
        Self {
            key: key.into(),
            version,
            on_failure: None,
        }
    }

    /// Set the byte store key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the envelope format version
    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Register a callback for load and save failures
    #[must_use]
    pub fn on_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PersistError) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(handler));
        self
    }

    /// The byte store key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The envelope format version
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    fn report(&self, error: &PersistError) {
        if let Some(handler) = &self.on_failure {
            handler(error);
        }
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self::new(DEFAULT_KEY, CURRENT_VERSION)
    }
}

impl std::fmt::Debug for PersistConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistConfig")
            .field("key", &self.key)
            .field("version", &self.version)
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Lifecycle of a persistence adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStatus {
    /// Created, load not started yet
    Uninitialized,
    /// Waiting for the byte store to return the persisted envelope
    Rehydrating,
    /// Rehydration resolved; state changes are being written back
    Ready,
}

/// Progress published by the persistence task
#[derive(Debug, Clone, Copy)]
struct Progress {
    status: PersistStatus,
    /// Highest change sequence that needs no further write
    synced_seq: u64,
    /// The live state is being written after rehydration left it unsaved
    catching_up: bool,
    saves_completed: u64,
    saves_failed: u64,
}

/// State changes observed through the store subscription: a sequence
/// number and the latest snapshot. Only the latest value is kept, which is
/// what coalesces intermediate states.
type Changes<S> = (u64, S);

/// Entry point for attaching persistence to a store
#[derive(Debug, Clone, Copy, Default)]
pub struct Persistor;

impl Persistor {
    /// Attach a byte store to `store`
    ///
    /// Subscribes to the store, then spawns a task that rehydrates and
    /// writes back. The task holds only a weak reference to the store and
    /// exits once the store is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn attach<S, A, E, R>(
        store: &Arc<Store<S, A, E, R>>,
        byte_store: Arc<dyn ByteStore>,
        config: PersistConfig,
    ) -> PersistHandle
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        S: Snapshot + Serialize + DeserializeOwned + Send + Sync + 'static,
        A: 'static,
        E: Send + Sync + 'static,
    {
        let (changes_tx, changes_rx) = watch::channel::<Changes<S>>((0, store.state()));
        let subscription = store.subscribe(move |state: &S| {
            changes_tx.send_modify(|(seq, latest)| {
                *seq += 1;
                *latest = state.clone();
            });
        });

        // Read after subscribing: every dispatch past the baseline reaches
        // the subscription
        let baseline = store.settled_dispatch_count().unwrap_or_else(|error| {
            tracing::warn!(error = %error, "Attaching persistence from inside a dispatch");
            store.dispatch_count()
        });

        let (progress_tx, progress_rx) = watch::channel(Progress {
            status: PersistStatus::Uninitialized,
            synced_seq: 0,
            catching_up: false,
            saves_completed: 0,
            saves_failed: 0,
        });

        tracing::debug!(key = %config.key, baseline, "Attaching persistence");

        let task = tokio::spawn(run(
            Arc::downgrade(store),
            byte_store,
            config,
            baseline,
            changes_rx.clone(),
            progress_tx,
        ));

        PersistHandle {
            progress: progress_rx,
            changes: Box::new(move || changes_rx.borrow().0),
            subscription,
            task,
        }
    }
}

/// Handle to a running persistence adapter
pub struct PersistHandle {
    progress: watch::Receiver<Progress>,
    changes: Box<dyn Fn() -> u64 + Send + Sync>,
    subscription: Subscription,
    task: JoinHandle<()>,
}

impl PersistHandle {
    /// Current lifecycle status
    #[must_use]
    pub fn status(&self) -> PersistStatus {
        self.progress.borrow().status
    }

    /// Wait until rehydration has resolved
    ///
    /// Also returns if the adapter stopped (store dropped or aborted).
    pub async fn ready(&self) {
        let mut progress = self.progress.clone();
        let _ = progress
            .wait_for(|p| p.status == PersistStatus::Ready)
            .await;
    }

    /// Wait until every state change observed so far has been written
    ///
    /// A failed save counts as written; it is not retried. Also returns if
    /// the adapter stopped.
    pub async fn flush(&self) {
        let target = (self.changes)();
        let mut progress = self.progress.clone();
        let _ = progress
            .wait_for(|p| {
                p.status == PersistStatus::Ready && !p.catching_up && p.synced_seq >= target
            })
            .await;
    }

    /// Number of saves that completed successfully
    #[must_use]
    pub fn saves_completed(&self) -> u64 {
        self.progress.borrow().saves_completed
    }

    /// Number of saves that failed
    #[must_use]
    pub fn saves_failed(&self) -> u64 {
        self.progress.borrow().saves_failed
    }

    /// Stop persisting: unsubscribe from the store and stop the task
    ///
    /// A save already handed to the byte store may still complete.
    pub fn abort(&self) {
        self.subscription.unsubscribe();
        self.task.abort();
    }
}

impl std::fmt::Debug for PersistHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistHandle")
            .field("status", &self.status())
            .field("saves_completed", &self.saves_completed())
            .finish_non_exhaustive()
    }
}

async fn load<S: DeserializeOwned>(
    byte_store: &dyn ByteStore,
    config: &PersistConfig,
) -> Result<Option<S>, PersistError> {
    let Some(bytes) = byte_store
        .get(&config.key)
        .await
        .map_err(PersistError::Load)?
    else {
        return Ok(None);
    };

    PersistEnvelope::<S>::decode(&bytes, config.version).map(|envelope| Some(envelope.state))
}

async fn save<S: Serialize>(
    byte_store: &dyn ByteStore,
    config: &PersistConfig,
    snapshot: &S,
) -> Result<(), PersistError> {
    let bytes = PersistEnvelope::new(config.version, snapshot).encode()?;
    byte_store
        .set(&config.key, bytes)
        .await
        .map_err(PersistError::Save)
}

/// Resolve rehydration
///
/// Returns the change sequence that needs no write if the loaded snapshot
/// was installed, `None` otherwise.
#[allow(clippy::cognitive_complexity)]
fn rehydrate<S, A, E, R>(
    store: &Store<S, A, E, R>,
    loaded: Result<Option<S>, PersistError>,
    baseline: u64,
    changes: &mut watch::Receiver<Changes<S>>,
    config: &PersistConfig,
) -> Option<u64>
where
    R: Reducer<State = S, Action = A, Environment = E>,
    S: Snapshot + Send + Sync + 'static,
{
    match loaded {
        Ok(Some(snapshot)) => match store.replace_if_untouched(baseline, snapshot.clone()) {
            Ok(true) => {
                tracing::info!(key = %config.key, "Rehydrated state from byte store");
                metrics::counter!("persist.load.hit").increment(1);
                // Nothing to write unless a dispatch landed right after
                // the replace
                let current = changes.borrow_and_update();
                if current.1.same_snapshot(&snapshot) {
                    Some(current.0)
                } else {
                    Some(0)
                }
            },
            Ok(false) | Err(_) => {
                tracing::info!(
                    key = %config.key,
                    "Discarding persisted state: store changed during rehydration"
                );
                metrics::counter!("persist.load.discarded").increment(1);
                None
            },
        },
        Ok(None) => {
            tracing::debug!(key = %config.key, "No persisted state found");
            metrics::counter!("persist.load.miss").increment(1);
            None
        },
        Err(error) => {
            tracing::warn!(key = %config.key, error = %error, "Ignoring persisted state");
            metrics::counter!("persist.load.failed").increment(1);
            config.report(&error);
            None
        },
    }
}

/// Write one snapshot and publish the outcome
async fn write_back<S: Serialize>(
    byte_store: &dyn ByteStore,
    config: &PersistConfig,
    seq: u64,
    snapshot: &S,
    progress: &watch::Sender<Progress>,
) {
    match save(byte_store, config, snapshot).await {
        Ok(()) => {
            tracing::trace!(key = %config.key, seq, "Saved state");
            metrics::counter!("persist.save.ok").increment(1);
            progress.send_modify(|p| p.saves_completed += 1);
        },
        Err(error) => {
            tracing::warn!(key = %config.key, error = %error, "Failed to save state");
            metrics::counter!("persist.save.failed").increment(1);
            config.report(&error);
            progress.send_modify(|p| p.saves_failed += 1);
        },
    }
}

#[allow(clippy::cognitive_complexity)]
async fn run<S, A, E, R>(
    store: Weak<Store<S, A, E, R>>,
    byte_store: Arc<dyn ByteStore>,
    config: PersistConfig,
    baseline: u64,
    mut changes: watch::Receiver<Changes<S>>,
    progress: watch::Sender<Progress>,
) where
    R: Reducer<State = S, Action = A, Environment = E>,
    S: Snapshot + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    progress.send_modify(|p| p.status = PersistStatus::Rehydrating);

    let loaded = load::<S>(byte_store.as_ref(), &config).await;

    let (mut synced_seq, catch_up) = {
        let Some(store) = store.upgrade() else {
            tracing::debug!("Store dropped during rehydration, ignoring result");
            return;
        };
        match rehydrate(&store, loaded, baseline, &mut changes, &config) {
            Some(seq) => (seq, None),
            // Dispatched since attach but not installed: write the live
            // state even if the subscription missed the change
            None if store.dispatch_count() != baseline => {
                let seq = changes.borrow_and_update().0;
                (0, Some((seq, store.state())))
            },
            None => (0, None),
        }
    };

    progress.send_modify(|p| {
        p.status = PersistStatus::Ready;
        p.synced_seq = synced_seq;
        p.catching_up = catch_up.is_some();
    });
    tracing::debug!(key = %config.key, "Persistence ready");

    if let Some((seq, snapshot)) = catch_up {
        tracing::debug!(key = %config.key, seq, "Writing live state after rehydration");
        write_back(byte_store.as_ref(), &config, seq, &snapshot, &progress).await;
        synced_seq = seq;
        progress.send_modify(|p| {
            p.synced_seq = seq;
            p.catching_up = false;
        });
    }

    loop {
        let (seq, snapshot) = {
            let latest = changes.borrow_and_update();
            (latest.0, latest.1.clone())
        };

        if seq > synced_seq {
            write_back(byte_store.as_ref(), &config, seq, &snapshot, &progress).await;
            synced_seq = seq;
            progress.send_modify(|p| p.synced_seq = seq);
            continue;
        }

        if changes.changed().await.is_err() {
            tracing::debug!("Store dropped, stopping persistence");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        done: bool,
    }

    #[test]
    fn envelope_round_trip() {
        let state = vec![
            Item {
                name: "a".to_string(),
                done: false,
            },
            Item {
                name: "b".to_string(),
                done: true,
            },
        ];

        let bytes = PersistEnvelope::new(CURRENT_VERSION, &state).encode().unwrap();
        let decoded = PersistEnvelope::<Vec<Item>>::decode(&bytes, CURRENT_VERSION).unwrap();

        assert_eq!(decoded.version, CURRENT_VERSION);
        assert_eq!(decoded.state, state);
    }

    #[test]
    fn envelope_wire_shape() {
        let bytes = PersistEnvelope::new(1, vec![1, 2]).encode().unwrap();
        assert_eq!(bytes, br#"{"version":1,"state":[1,2]}"#);
    }

    #[test]
    fn version_mismatch_detected_before_state_decoding() {
        let bytes = br#"{"version":7,"state":{"something":"else"}}"#;
        let err = PersistEnvelope::<Vec<Item>>::decode(bytes, 1).unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch {
                found: 7,
                expected: 1
            }
        ));
    }

    #[test]
    fn corrupt_bytes_are_decode_errors() {
        let err = PersistEnvelope::<Vec<Item>>::decode(b"not json", 1).unwrap_err();
        assert!(matches!(err, PersistError::Decode(_)));

        let err = PersistEnvelope::<Vec<Item>>::decode(br#"{"version":1,"state":42}"#, 1)
            .unwrap_err();
        assert!(matches!(err, PersistError::Decode(_)));
    }

    #[test]
    fn config_builder() {
        let config = PersistConfig::default();
        assert_eq!(config.key(), DEFAULT_KEY);
        assert_eq!(config.version(), CURRENT_VERSION);

        let config = config.with_key("todos").with_version(3);
        assert_eq!(config.key(), "todos");
        assert_eq!(config.version(), 3);
        assert!(format!("{config:?}").contains("on_failure: false"));
    }
}
