//! Reducer logic for the to-do list.
//!
//! Every transition copies the sequence and reuses untouched records. An
//! action that matches nothing returns the input snapshot itself, so the
//! store can skip notification.

use crate::environment::TodoEnvironment;
use crate::types::{Todo, TodoAction, TodoId, TodoListState};
use todo_store_core::reducer::Reducer;

/// Reducer for the to-do list
#[derive(Clone, Debug, Default)]
pub struct TodoReducer;

impl TodoReducer {
    /// Creates a new `TodoReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for TodoReducer {
    type State = TodoListState;
    type Action = TodoAction;
    type Environment = TodoEnvironment;

    fn reduce(
        &self,
        state: &Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::State {
        match action {
            TodoAction::AddTodo { text } => {
                let id = TodoId::new(env.ids.new_id());
                state.appended(Todo::new(id, text))
            },

            // Only the first match is affected
            TodoAction::ToggleTodo { id } => match state.position(&id) {
                Some(index) => state.replaced(index, state.entries()[index].toggled()),
                None => state.clone(),
            },

            TodoAction::RemoveTodo { id } => match state.position(&id) {
                Some(index) => state.removed(index),
                None => state.clone(),
            },

            TodoAction::Unknown => state.clone(),
        }
    }
}
