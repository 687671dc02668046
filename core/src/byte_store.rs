//! Byte store trait for persisting state snapshots.
//!
//! A byte store is an opaque key-value store holding raw bytes. The
//! persistence adapter in the runtime crate uses a single key (`"root"` by
//! default) to hold an encoded state envelope.
//!
//! # Implementations
//!
//! - `InMemoryByteStore`, `ControlledByteStore`, `FailingByteStore`
//!   (in `todo-store-testing`): deterministic test doubles
//! - `FileByteStore` (in `todo-list`): one file per key on local disk
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn` so the trait can
//! be used as `Arc<dyn ByteStore>` and moved into spawned tasks.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`ByteStore`] operations.
pub type ByteStoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ByteStoreError>> + Send + 'a>>;

/// Errors that can occur during byte store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ByteStoreError {
    /// The backend could not be reached.
    #[error("Byte store unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the underlying medium failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Any other backend-specific failure.
    #[error("Byte store error: {0}")]
    Other(String),
}

impl From<std::io::Error> for ByteStoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Asynchronous key-value storage of raw bytes.
///
/// No ordering guarantee is made between operations on different keys.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so they can be shared with the
/// persistence task.
pub trait ByteStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing has been stored under that key yet;
    /// a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ByteStoreError`] if the backend cannot be read.
    fn get<'a>(&'a self, key: &'a str) -> ByteStoreFuture<'a, Option<Vec<u8>>>;

    /// Store `bytes` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ByteStoreError`] if the write does not complete.
    fn set<'a>(&'a self, key: &'a str, bytes: Vec<u8>) -> ByteStoreFuture<'a, ()>;
}
