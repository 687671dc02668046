//! # Todo Store Core
//!
//! Core traits and types for reducer-driven state containers.
//!
//! This crate provides the abstractions shared by the runtime, the testing
//! utilities and the domain crates. It performs no I/O of its own.
//!
//! ## Core Concepts
//!
//! - **State**: An immutable snapshot; every transition produces a new one
//! - **Action**: An immutable value describing a requested state change
//! - **Reducer**: Pure function `(State, Action, Environment) → State`
//! - **Environment**: Injected capabilities (id generation)
//! - **Byte Store**: Opaque async key-value storage used for persistence
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use todo_store_core::reducer::Reducer;
//! use todo_store_core::state::Snapshot;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Count(Arc<i64>);
//!
//! impl Snapshot for Count {
//!     fn same_snapshot(&self, other: &Self) -> bool {
//!         Arc::ptr_eq(&self.0, &other.0)
//!     }
//! }
//!
//! enum CountAction {
//!     Add(i64),
//! }
//!
//! struct CountReducer;
//!
//! impl Reducer for CountReducer {
//!     type State = Count;
//!     type Action = CountAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &Count, action: CountAction, _env: &()) -> Count {
//!         match action {
//!             CountAction::Add(0) => state.clone(),
//!             CountAction::Add(n) => Count(Arc::new(*state.0 + n)),
//!         }
//!     }
//! }
//!
//! let start = Count(Arc::new(1));
//! let next = CountReducer.reduce(&start, CountAction::Add(2), &());
//! assert_eq!(*next.0, 3);
//! assert!(CountReducer.reduce(&next, CountAction::Add(0), &()).same_snapshot(&next));
//! ```

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};

/// Byte store abstraction used by the persistence adapter
pub mod byte_store;

/// State module - snapshot identity
///
/// State values are treated as immutable snapshots. A reducer either returns
/// the snapshot it was given (nothing changed) or a freshly built one.
/// [`Snapshot::same_snapshot`] lets the store tell the two apart without a
/// deep comparison.
pub mod state {
    use std::sync::Arc;

    /// Identity comparison for state snapshots
    ///
    /// Implementations should compare by reference (for example with
    /// [`Arc::ptr_eq`]), not by value: two snapshots that are equal by value
    /// but were produced by different transitions are different snapshots.
    pub trait Snapshot: Clone {
        /// Returns `true` if `self` and `other` are the same snapshot
        fn same_snapshot(&self, other: &Self) -> bool;
    }

    impl<T: ?Sized> Snapshot for Arc<T> {
        fn same_snapshot(&self, other: &Self) -> bool {
            Arc::ptr_eq(self, other)
        }
    }
}

/// Reducer module - the core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → State`.
///
/// They contain all transition logic and are deterministic and testable.
/// A reducer never mutates the snapshot it receives; it returns either that
/// same snapshot or a new one.
pub mod reducer {
    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The snapshot type this reducer produces
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected capabilities this reducer needs
    ///
    /// # Contract
    ///
    /// `reduce` must be total: it may not panic or fail for any action,
    /// including actions that reference entities that do not exist. Those
    /// are no-ops and return the input snapshot.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into the next state snapshot
        ///
        /// # Arguments
        ///
        /// - `state`: The current snapshot (never mutated)
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// The next snapshot. Returning a clone of `state` signals that
        /// nothing changed.
        fn reduce(
            &self,
            state: &Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Self::State;
    }
}

/// Environment module - dependency injection traits
///
/// All non-deterministic inputs to a reducer are abstracted behind traits
/// and injected via the Environment parameter.
pub mod environment {
    /// Identifier generator - abstracts id creation for testability
    ///
    /// Implementations must return values that are unique for the lifetime
    /// of the process.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::atomic::{AtomicU64, Ordering};
    /// use todo_store_core::environment::IdGenerator;
    ///
    /// struct Counter(AtomicU64);
    ///
    /// impl IdGenerator for Counter {
    ///     fn new_id(&self) -> String {
    ///         self.0.fetch_add(1, Ordering::Relaxed).to_string()
    ///     }
    /// }
    ///
    /// let ids = Counter(AtomicU64::new(0));
    /// assert_ne!(ids.new_id(), ids.new_id());
    /// ```
    pub trait IdGenerator: Send + Sync {
        /// Produce a fresh, never-before-returned identifier
        fn new_id(&self) -> String;
    }
}

#[cfg(test)]
mod tests {
    use super::state::Snapshot;
    use std::sync::Arc;

    #[test]
    fn arc_snapshots_compare_by_reference() {
        let a = Arc::new(vec![1, 2, 3]);
        let b = Arc::clone(&a);
        let c = Arc::new(vec![1, 2, 3]);

        assert!(a.same_snapshot(&b));
        assert!(!a.same_snapshot(&c));
        assert_eq!(a, c);
    }
}
