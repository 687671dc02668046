//! To-do list built on a reducer-driven store.
//!
//! This crate is the domain layer: the [`Todo`] model, the
//! [`TodoReducer`], and the glue to run it in a persisted
//! [`Store`](todo_store_runtime::Store):
//!
//! - [`TodoAction`] with plain action creators
//! - [`TodoEnvironment`] injecting the id generator
//! - [`FileByteStore`] for on-disk persistence
//! - [`TodoConfig`] loaded from environment variables
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use todo_list::{FileByteStore, TodoAction, TodoEnvironment, TodoReducer, TodoStore, seed_state};
//! use todo_store_runtime::{PersistConfig, Persistor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let env = TodoEnvironment::production();
//! let store = Arc::new(TodoStore::new(seed_state(&env), TodoReducer::new(), env));
//!
//! let bytes = Arc::new(FileByteStore::new(".todo"));
//! let persistence = Persistor::attach(&store, bytes, PersistConfig::default());
//! persistence.ready().await;
//!
//! store.dispatch(TodoAction::add_todo("Buy milk"))?;
//! persistence.flush().await;
//!
//! for todo in store.state().iter() {
//!     println!("[{}] {}", if todo.done { "x" } else { " " }, todo.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod environment;
pub mod file_store;
pub mod reducer;
pub mod types;

// Re-export commonly used types
pub use command::{Cli, Command};
pub use config::TodoConfig;
pub use environment::{TodoEnvironment, UuidIdGenerator};
pub use file_store::FileByteStore;
pub use reducer::TodoReducer;
pub use types::{Todo, TodoAction, TodoId, TodoListState};

use todo_store_runtime::Store;

/// A store running the to-do reducer
pub type TodoStore = Store<TodoListState, TodoAction, TodoEnvironment, TodoReducer>;

/// Text of the todo a fresh list starts with
pub const SEED_TEXT: &str = "Learn Redux";

/// Initial state used when nothing has been persisted yet
#[must_use]
pub fn seed_state(env: &TodoEnvironment) -> TodoListState {
    [Todo::new(TodoId::new(env.ids.new_id()), SEED_TEXT)]
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use todo_store_testing::SequentialIdGenerator;

    #[test]
    fn seed_has_one_open_todo() {
        let env = TodoEnvironment::new(Arc::new(SequentialIdGenerator::new()));
        let state = seed_state(&env);

        assert_eq!(state.len(), 1);
        let seed = &state.entries()[0];
        assert_eq!(seed.id, TodoId::new("todo-1"));
        assert_eq!(seed.text, SEED_TEXT);
        assert!(!seed.done);
    }
}
