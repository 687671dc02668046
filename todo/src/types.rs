//! Domain types for the to-do list.
//!
//! A to-do list is an ordered sequence of [`Todo`] records. Snapshots are
//! immutable and shared: every transition builds a new [`TodoListState`]
//! while untouched records keep their allocation.

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use todo_store_core::state::Snapshot;

/// Unique identifier for a todo
///
/// Opaque: produced by an [`IdGenerator`](todo_store_core::environment::IdGenerator)
/// and never inspected by the reducer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    /// Creates a `TodoId` from any string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TodoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TodoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A single todo
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier, fixed at creation
    pub id: TodoId,
    /// What needs doing
    pub text: String,
    /// Whether the todo is done
    pub done: bool,
}

impl Todo {
    /// Creates a todo that is not done yet
    #[must_use]
    pub fn new(id: TodoId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            done: false,
        }
    }

    /// Returns a copy with `done` flipped
    #[must_use]
    pub fn toggled(&self) -> Self {
        Self {
            done: !self.done,
            ..self.clone()
        }
    }
}

/// State of the to-do list: todos in insertion order
///
/// Cloning is an `Arc` clone. Two snapshots are the *same snapshot* only if
/// they share the outer allocation; see [`Snapshot::same_snapshot`].
///
/// Serializes as a plain JSON array of todos.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoListState(Arc<Vec<Arc<Todo>>>);

impl TodoListState {
    /// Creates an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of todos
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the list has no todos
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the todos in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Todo> + '_ {
        self.0.iter().map(|todo| &**todo)
    }

    /// The shared records backing this snapshot
    ///
    /// Exposed so callers can check which records a transition reused.
    #[must_use]
    pub fn entries(&self) -> &[Arc<Todo>] {
        &self.0
    }

    /// Returns the first todo with the given id
    #[must_use]
    pub fn get(&self, id: &TodoId) -> Option<&Todo> {
        self.iter().find(|todo| &todo.id == id)
    }

    /// Checks if a todo with the given id exists
    #[must_use]
    pub fn contains(&self, id: &TodoId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the number of done todos
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.iter().filter(|todo| todo.done).count()
    }

    /// Returns the number of todos still open
    #[must_use]
    pub fn remaining_count(&self) -> usize {
        self.len() - self.completed_count()
    }

    /// Index of the first todo with the given id
    pub(crate) fn position(&self, id: &TodoId) -> Option<usize> {
        self.0.iter().position(|todo| &todo.id == id)
    }

    /// New snapshot with `todo` appended
    pub(crate) fn appended(&self, todo: Todo) -> Self {
        let mut todos = Vec::with_capacity(self.len() + 1);
        todos.extend(self.0.iter().cloned());
        todos.push(Arc::new(todo));
        Self(Arc::new(todos))
    }

    /// New snapshot with the todo at `index` replaced
    pub(crate) fn replaced(&self, index: usize, todo: Todo) -> Self {
        let mut todos = Vec::clone(&self.0);
        todos[index] = Arc::new(todo);
        Self(Arc::new(todos))
    }

    /// New snapshot without the todo at `index`
    pub(crate) fn removed(&self, index: usize) -> Self {
        let mut todos = Vec::clone(&self.0);
        todos.remove(index);
        Self(Arc::new(todos))
    }
}

impl Snapshot for TodoListState {
    fn same_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl FromIterator<Todo> for TodoListState {
    fn from_iter<I: IntoIterator<Item = Todo>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().map(Arc::new).collect()))
    }
}

/// Actions that change the to-do list
///
/// Serialized in the `{"type": ..., "payload": ...}` shape. A `type` this
/// build does not know decodes to [`TodoAction::Unknown`] whatever its
/// payload, which leaves the state untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum TodoAction {
    /// Append a new todo
    AddTodo {
        /// Text of the new todo
        text: String,
    },

    /// Flip `done` on the first todo with this id
    ToggleTodo {
        /// Todo to toggle
        id: TodoId,
    },

    /// Remove the first todo with this id
    RemoveTodo {
        /// Todo to remove
        id: TodoId,
    },

    /// Any action this reducer does not handle
    Unknown,
}

/// Wire form of an action before its `type` is resolved
#[derive(Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct TextPayload {
    text: String,
}

#[derive(Deserialize)]
struct IdPayload {
    id: TodoId,
}

impl<'de> Deserialize<'de> for TodoAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        fn payload<T: serde::de::DeserializeOwned, E: serde::de::Error>(
            kind: &str,
            value: serde_json::Value,
        ) -> Result<T, E> {
            serde_json::from_value(value)
                .map_err(|error| E::custom(format!("invalid {kind} payload: {error}")))
        }

        let raw = RawAction::deserialize(deserializer)?;
        let action = match raw.kind.as_str() {
            "AddTodo" => {
                let TextPayload { text } = payload::<_, D::Error>(&raw.kind, raw.payload)?;
                Self::AddTodo { text }
            }
            "ToggleTodo" => {
                let IdPayload { id } = payload::<_, D::Error>(&raw.kind, raw.payload)?;
                Self::ToggleTodo { id }
            }
            "RemoveTodo" => {
                let IdPayload { id } = payload::<_, D::Error>(&raw.kind, raw.payload)?;
                Self::RemoveTodo { id }
            }
            _ => Self::Unknown,
        };
        Ok(action)
    }
}

impl TodoAction {
    /// Creates an [`TodoAction::AddTodo`] action
    #[must_use]
    pub fn add_todo(text: impl Into<String>) -> Self {
        Self::AddTodo { text: text.into() }
    }

    /// Creates a [`TodoAction::ToggleTodo`] action
    #[must_use]
    pub fn toggle_todo(id: impl Into<TodoId>) -> Self {
        Self::ToggleTodo { id: id.into() }
    }

    /// Creates a [`TodoAction::RemoveTodo`] action
    #[must_use]
    pub fn remove_todo(id: impl Into<TodoId>) -> Self {
        Self::RemoveTodo { id: id.into() }
    }
}
