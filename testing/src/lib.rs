//! # Todo Store Testing
//!
//! Testing utilities and helpers for reducer-driven state containers.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - Mock implementations of environment capabilities ([`SequentialIdGenerator`])
//! - Byte store doubles for persistence tests ([`InMemoryByteStore`],
//!   [`ControlledByteStore`], [`FailingByteStore`])
//!
//! ## Example
//!
//! ```ignore
//! use todo_store_testing::{InMemoryByteStore, SequentialIdGenerator};
//!
//! #[tokio::test]
//! async fn test_todo_flow() {
//!     let store = Arc::new(TodoStore::new(
//!         TodoListState::new(),
//!         TodoReducer::new(),
//!         TodoEnvironment::new(Arc::new(SequentialIdGenerator::new())),
//!     ));
//!     let bytes = Arc::new(InMemoryByteStore::new());
//!     let persistence = Persistor::attach(&store, bytes.clone(), PersistConfig::default());
//!
//!     store.dispatch(TodoAction::add_todo("buy milk")).unwrap();
//!     persistence.flush().await;
//!     assert!(bytes.contains_key("root"));
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use todo_store_core::environment::IdGenerator;

pub mod byte_store_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{AtomicU64, IdGenerator, Ordering};

    /// Predictable id generator for deterministic tests
    ///
    /// Produces `"<prefix>-1"`, `"<prefix>-2"`, ...
    ///
    /// # Example
    ///
    /// ```
    /// use todo_store_testing::mocks::SequentialIdGenerator;
    /// use todo_store_core::environment::IdGenerator;
    ///
    /// let ids = SequentialIdGenerator::new();
    /// assert_eq!(ids.new_id(), "todo-1");
    /// assert_eq!(ids.new_id(), "todo-2");
    /// ```
    #[derive(Debug)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator with the `"todo"` prefix
        #[must_use]
        pub fn new() -> Self {
            Self::with_prefix("todo")
        }

        /// Create a generator with a custom prefix
        #[must_use]
        pub fn with_prefix(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(1),
            }
        }

        /// Number of ids handed out so far
        #[must_use]
        pub fn issued(&self) -> u64 {
            self.next.load(Ordering::SeqCst) - 1
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn new_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n}", self.prefix)
        }
    }
}

// Re-export commonly used items
pub use byte_store_mocks::{ControlledByteStore, FailingByteStore, InMemoryByteStore};
pub use mocks::SequentialIdGenerator;
pub use reducer_test::{ReducerTest, assertions};
