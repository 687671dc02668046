//! Configuration for the to-do application.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use todo_store_runtime::PersistConfig;
use todo_store_runtime::persistence::CURRENT_VERSION;

/// Default directory for state files
pub const DEFAULT_STATE_DIR: &str = ".todo";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoConfig {
    /// Directory holding the state file (`TODO_STATE_DIR`)
    pub state_dir: PathBuf,
    /// Byte store key for the list (`TODO_STORAGE_KEY`)
    pub storage_key: String,
    /// Whether to persist at all (`TODO_PERSIST`, default: true)
    pub persist: bool,
}

impl TodoConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source.
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            state_dir: lookup("TODO_STATE_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_STATE_DIR), PathBuf::from),
            storage_key: lookup("TODO_STORAGE_KEY")
                .unwrap_or_else(|| todo_store_runtime::persistence::DEFAULT_KEY.to_string()),
            persist: lookup("TODO_PERSIST")
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        }
    }

    /// Persistence settings derived from this configuration
    #[must_use]
    pub fn persist_config(&self) -> PersistConfig {
        PersistConfig::new(self.storage_key.clone(), CURRENT_VERSION)
    }
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
