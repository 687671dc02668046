//! Integration tests for the persistence adapter
//!
//! Covers rehydration (hit, miss, corrupt, wrong version, failing backend),
//! the live-dispatch-wins race, write coalescing and save failures.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use todo_store_core::byte_store::ByteStore;
use todo_store_core::reducer::Reducer;
use todo_store_runtime::{
    PersistConfig, PersistEnvelope, PersistError, PersistStatus, Persistor, Store,
};
use todo_store_testing::{ControlledByteStore, FailingByteStore, InMemoryByteStore};

// ============================================================================
// Test Fixtures
// ============================================================================

type ListState = Arc<Vec<String>>;

#[derive(Debug, Clone)]
enum ListAction {
    Push(String),
    Nothing,
}

#[derive(Clone)]
struct ListEnv;

#[derive(Clone)]
struct ListReducer;

impl Reducer for ListReducer {
    type State = ListState;
    type Action = ListAction;
    type Environment = ListEnv;

    fn reduce(&self, state: &ListState, action: ListAction, _env: &ListEnv) -> ListState {
        match action {
            ListAction::Push(item) => {
                let mut next = Vec::clone(state);
                next.push(item);
                Arc::new(next)
            },
            ListAction::Nothing => Arc::clone(state),
        }
    }
}

type ListStore = Store<ListState, ListAction, ListEnv, ListReducer>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("todo_store_runtime=debug")
        .try_init();
}

fn new_store(items: &[&str]) -> Arc<ListStore> {
    let initial: Vec<String> = items.iter().map(ToString::to_string).collect();
    Arc::new(Store::new(Arc::new(initial), ListReducer, ListEnv))
}

fn envelope(items: &[&str]) -> Vec<u8> {
    let state: Vec<String> = items.iter().map(ToString::to_string).collect();
    PersistEnvelope::new(1, state).encode().unwrap()
}

fn decode(bytes: &[u8]) -> Vec<String> {
    PersistEnvelope::<Vec<String>>::decode(bytes, 1).unwrap().state
}

fn push(item: &str) -> ListAction {
    ListAction::Push(item.to_string())
}

/// Config that records the kind of every reported failure
fn recording_config() -> (PersistConfig, Arc<Mutex<Vec<&'static str>>>) {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let config = PersistConfig::default().on_failure(move |error| {
        let kind = match error {
            PersistError::Load(_) => "load",
            PersistError::Save(_) => "save",
            PersistError::Encode(_) => "encode",
            PersistError::Decode(_) => "decode",
            PersistError::VersionMismatch { .. } => "version",
        };
        sink.lock().unwrap().push(kind);
    });
    (config, failures)
}

// ============================================================================
// Rehydration
// ============================================================================

#[tokio::test]
async fn test_rehydrates_when_no_dispatch_happened() {
    init_tracing();
    let store = new_store(&["seed"]);
    let bytes = Arc::new(InMemoryByteStore::with_entry("root", envelope(&["a", "b"])));

    let notified = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    let _sub = store.subscribe(move |s: &ListState| sink.lock().unwrap().push(Vec::clone(s)));

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    persistence.ready().await;

    assert_eq!(persistence.status(), PersistStatus::Ready);
    assert_eq!(*store.state(), vec!["a", "b"]);
    assert_eq!(*notified.lock().unwrap(), vec![vec!["a".to_string(), "b".to_string()]]);

    // Rehydrated state is already durable: nothing to write back
    persistence.flush().await;
    assert_eq!(bytes.set_calls(), 0);
}

#[tokio::test]
async fn test_missing_state_keeps_initial_and_writes_after_dispatch() {
    init_tracing();
    let store = new_store(&["seed"]);
    let bytes = Arc::new(InMemoryByteStore::new());

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    persistence.ready().await;
    persistence.flush().await;

    assert_eq!(*store.state(), vec!["seed"]);
    assert_eq!(bytes.set_calls(), 0);

    store.dispatch(push("x")).unwrap();
    persistence.flush().await;

    assert_eq!(bytes.set_calls(), 1);
    assert_eq!(decode(&bytes.raw("root").unwrap()), vec!["seed", "x"]);
    assert_eq!(persistence.saves_completed(), 1);
}

#[tokio::test]
async fn test_live_dispatch_wins_over_slow_load() {
    init_tracing();
    let store = new_store(&[]);
    let bytes = Arc::new(ControlledByteStore::new().with_entry("root", envelope(&["stale"])));

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    bytes.wait_for_gets(1).await;
    assert_eq!(persistence.status(), PersistStatus::Rehydrating);

    store.dispatch(push("live")).unwrap();
    bytes.release_get();
    persistence.ready().await;

    assert_eq!(*store.state(), vec!["live"]);

    // The live state replaces the stale snapshot on disk
    bytes.open_sets();
    persistence.flush().await;
    assert_eq!(decode(&bytes.raw("root").unwrap()), vec!["live"]);
}

#[tokio::test]
async fn test_noop_dispatch_during_load_still_discards_snapshot() {
    let store = new_store(&["seed"]);
    let bytes = Arc::new(ControlledByteStore::new().with_entry("root", envelope(&["stale"])));

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    bytes.wait_for_gets(1).await;
    store.dispatch(ListAction::Nothing).unwrap();
    bytes.release_get();
    persistence.ready().await;

    assert_eq!(*store.state(), vec!["seed"]);

    // The stale envelope is overwritten with the live state
    bytes.open_sets();
    persistence.flush().await;
    assert_eq!(decode(&bytes.raw("root").unwrap()), vec!["seed"]);
    assert_eq!(bytes.set_calls(), 1);
}

#[tokio::test]
async fn test_change_missed_by_subscription_is_written_after_discard() {
    init_tracing();
    let store = new_store(&[]);
    let bytes = Arc::new(ControlledByteStore::new().with_entry("root", envelope(&["stale"])));

    // Registered before the adapter, so its panic ends the notification
    // pass before the adapter hears about the change
    let _sub = store.subscribe(|s: &ListState| {
        if s.len() == 1 {
            panic!("listener failure");
        }
    });

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    bytes.wait_for_gets(1).await;

    let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = store.dispatch(push("live"));
    }));
    assert!(panicked.is_err());

    bytes.release_get();
    persistence.ready().await;
    assert_eq!(*store.state(), vec!["live"]);

    bytes.open_sets();
    persistence.flush().await;
    assert_eq!(decode(&bytes.raw("root").unwrap()), vec!["live"]);
    assert_eq!(bytes.set_calls(), 1);
    assert_eq!(persistence.saves_completed(), 1);
}

#[tokio::test]
async fn test_corrupt_envelope_is_no_prior_state() {
    let store = new_store(&["seed"]);
    let bytes = Arc::new(InMemoryByteStore::with_entry("root", b"{ not json".to_vec()));
    let (config, failures) = recording_config();

    let persistence = Persistor::attach(&store, bytes, config);
    persistence.ready().await;

    assert_eq!(*store.state(), vec!["seed"]);
    assert_eq!(*failures.lock().unwrap(), vec!["decode"]);
}

#[tokio::test]
async fn test_version_mismatch_is_no_prior_state() {
    let store = new_store(&["seed"]);
    let stored = PersistEnvelope::new(99, vec!["future".to_string()])
        .encode()
        .unwrap();
    let bytes = Arc::new(InMemoryByteStore::with_entry("root", stored));
    let (config, failures) = recording_config();

    let persistence = Persistor::attach(&store, bytes, config);
    persistence.ready().await;

    assert_eq!(*store.state(), vec!["seed"]);
    assert_eq!(*failures.lock().unwrap(), vec!["version"]);
}

#[tokio::test]
async fn test_load_failure_proceeds_to_ready() {
    let store = new_store(&["seed"]);
    let bytes = Arc::new(FailingByteStore::new());
    let (config, failures) = recording_config();

    let persistence = Persistor::attach(&store, bytes, config);
    persistence.ready().await;

    assert_eq!(persistence.status(), PersistStatus::Ready);
    assert_eq!(*store.state(), vec!["seed"]);
    assert_eq!(*failures.lock().unwrap(), vec!["load"]);
    // Dispatch is unaffected by persistence failures
    store.dispatch(push("x")).unwrap();
}

#[tokio::test]
async fn test_custom_key_is_used() {
    let store = new_store(&[]);
    let bytes = Arc::new(InMemoryByteStore::with_entry("todos", envelope(&["kept"])));

    let persistence =
        Persistor::attach(&store, bytes.clone(), PersistConfig::default().with_key("todos"));
    persistence.ready().await;
    assert_eq!(*store.state(), vec!["kept"]);

    store.dispatch(push("more")).unwrap();
    persistence.flush().await;
    assert!(!bytes.contains_key("root"));
    assert_eq!(decode(&bytes.raw("todos").unwrap()), vec!["kept", "more"]);
}

// ============================================================================
// Write-back
// ============================================================================

#[tokio::test]
async fn test_writes_are_coalesced_while_save_in_flight() {
    init_tracing();
    let store = new_store(&[]);
    let bytes = Arc::new(ControlledByteStore::new());
    bytes.open_gets();

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    persistence.ready().await;

    store.dispatch(push("1")).unwrap();
    bytes.wait_for_sets(1).await;

    // Three dispatches while the first save is blocked
    store.dispatch(push("2")).unwrap();
    store.dispatch(push("3")).unwrap();
    store.dispatch(push("4")).unwrap();

    bytes.release_sets(1);
    bytes.wait_for_sets(2).await;
    bytes.release_sets(1);
    persistence.flush().await;

    let sets = bytes.sets();
    assert_eq!(sets.len(), 2);
    assert_eq!(decode(&sets[0].1), vec!["1"]);
    assert_eq!(decode(&sets[1].1), vec!["1", "2", "3", "4"]);
    assert_eq!(persistence.saves_completed(), 2);
}

#[tokio::test]
async fn test_noop_dispatch_does_not_write() {
    let store = new_store(&[]);
    let bytes = Arc::new(InMemoryByteStore::new());

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    persistence.ready().await;

    store.dispatch(ListAction::Nothing).unwrap();
    persistence.flush().await;

    assert_eq!(bytes.set_calls(), 0);
}

#[tokio::test]
async fn test_failed_save_is_not_retried_but_next_change_heals() {
    let store = new_store(&[]);
    let bytes = Arc::new(FailingByteStore::new());
    bytes.set_fail_gets(false);
    let (config, failures) = recording_config();

    let persistence = Persistor::attach(&store, bytes.clone(), config);
    persistence.ready().await;

    store.dispatch(push("a")).unwrap();
    persistence.flush().await;

    assert_eq!(persistence.saves_failed(), 1);
    assert_eq!(*failures.lock().unwrap(), vec!["save"]);
    assert!(bytes.inner().is_empty());

    bytes.set_fail_sets(false);
    store.dispatch(push("b")).unwrap();
    persistence.flush().await;

    assert_eq!(persistence.saves_completed(), 1);
    assert_eq!(decode(&bytes.inner().raw("root").unwrap()), vec!["a", "b"]);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_store_dropped_during_load_is_ignored() {
    let store = new_store(&[]);
    let bytes = Arc::new(ControlledByteStore::new().with_entry("root", envelope(&["late"])));

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    bytes.wait_for_gets(1).await;

    drop(store);
    bytes.release_get();

    // Returns because the adapter stopped, without reaching Ready
    persistence.ready().await;
    assert_eq!(persistence.status(), PersistStatus::Rehydrating);
}

#[tokio::test]
async fn test_abort_stops_write_back() {
    let store = new_store(&[]);
    let bytes = Arc::new(InMemoryByteStore::new());

    let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
    persistence.ready().await;
    assert_eq!(store.subscriber_count(), 1);

    persistence.abort();
    assert_eq!(store.subscriber_count(), 0);

    store.dispatch(push("x")).unwrap();
    tokio::task::yield_now().await;
    assert_eq!(bytes.set_calls(), 0);
}

#[tokio::test]
async fn test_byte_store_is_shared_trait_object() {
    let bytes: Arc<dyn ByteStore> = Arc::new(InMemoryByteStore::new());
    let store = new_store(&[]);

    let persistence = Persistor::attach(&store, Arc::clone(&bytes), PersistConfig::default());
    persistence.ready().await;
    store.dispatch(push("x")).unwrap();
    persistence.flush().await;

    let stored = bytes.get("root").await.unwrap().unwrap();
    assert_eq!(decode(&stored), vec!["x"]);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_envelope_round_trips(items in proptest::collection::vec(any::<(String, bool)>(), 0..20)) {
        let bytes = PersistEnvelope::new(1, &items).encode().unwrap();
        let decoded = PersistEnvelope::<Vec<(String, bool)>>::decode(&bytes, 1).unwrap();
        prop_assert_eq!(decoded.state, items);
    }
}
