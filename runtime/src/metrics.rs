//! Metric descriptions for the store and the persistence adapter.
//!
//! Metrics are emitted through the [`metrics`] facade. Nothing is recorded
//! unless the application installs a recorder (for example a Prometheus
//! exporter); call [`register_metrics`] once after installing it so the
//! exporter knows each metric's help text.
//!
//! # Emitted metrics
//!
//! | Name | Kind | Emitted by |
//! |---|---|---|
//! | `store.actions.total` | counter | every accepted dispatch |
//! | `store.actions.unchanged` | counter | dispatches that left state unchanged |
//! | `store.dispatch.reentrant_rejected` | counter | rejected reentrant dispatches |
//! | `store.reducer.duration_seconds` | histogram | reducer execution time |
//! | `store.subscribers.notified` | histogram | listeners per notification pass |
//! | `persist.load.{hit,miss,discarded,failed}` | counter | rehydration outcome |
//! | `persist.save.{ok,failed}` | counter | write-back outcome |

use metrics::{describe_counter, describe_histogram};

// Re-export metrics macros for use in other crates
pub use metrics::{counter, histogram};

/// Register all metric descriptions.
pub fn register_metrics() {
    // Store Metrics
    describe_counter!(
        "store.actions.total",
        "Total number of actions dispatched to the store"
    );
    describe_counter!(
        "store.actions.unchanged",
        "Actions whose reducer returned the unchanged snapshot"
    );
    describe_counter!(
        "store.dispatch.reentrant_rejected",
        "Dispatches rejected because they were issued from inside a dispatch"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken to execute the reducer"
    );
    describe_histogram!(
        "store.subscribers.notified",
        "Number of listeners notified per state change"
    );

    // Persistence Metrics
    describe_counter!(
        "persist.load.hit",
        "Rehydrations that installed persisted state"
    );
    describe_counter!(
        "persist.load.miss",
        "Rehydrations that found no persisted state"
    );
    describe_counter!(
        "persist.load.discarded",
        "Persisted snapshots discarded because the store had already changed"
    );
    describe_counter!(
        "persist.load.failed",
        "Rehydrations that failed to read or decode persisted state"
    );
    describe_counter!("persist.save.ok", "Successful state write-backs");
    describe_counter!("persist.save.failed", "Failed state write-backs");
}
