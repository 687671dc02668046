//! # Todo Store Runtime
//!
//! Runtime implementation for reducer-driven state containers.
//!
//! ## Core Components
//!
//! - **Store**: Owns the current snapshot, applies actions through the
//!   reducer and notifies subscribers synchronously
//! - **Persistor**: Rehydrates a store from a byte store at startup and
//!   writes every new snapshot back, coalescing rapid changes
//!
//! ## Example
//!
//! ```ignore
//! use todo_store_runtime::{PersistConfig, Persistor, Store};
//!
//! let store = Arc::new(Store::new(initial_state, my_reducer, environment));
//! let persistence = Persistor::attach(&store, byte_store, PersistConfig::default());
//!
//! let subscription = store.subscribe(|state| println!("{state:?}"));
//! store.dispatch(Action::DoSomething)?;
//!
//! persistence.flush().await;
//! subscription.unsubscribe();
//! ```

/// Store runtime: dispatch, subscriptions and the reentrancy guard
pub mod store;

/// Persistence adapter: rehydration and debounced write-back
pub mod persistence;

/// Metric descriptions for the store and persistence adapter
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// `dispatch` was called while a dispatch was already running on
        /// the same thread (from a subscriber or from the reducer).
        ///
        /// This is a programming error. The nested action is rejected and
        /// the outer dispatch completes normally.
        #[error("Reentrant dispatch: dispatch called from a subscriber or reducer")]
        ReentrantDispatch,
    }
}

pub use error::StoreError;
pub use persistence::{
    PersistConfig, PersistEnvelope, PersistError, PersistHandle, PersistStatus, Persistor,
};
pub use store::{Store, Subscription};
