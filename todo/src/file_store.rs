//! File-backed byte store.
//!
//! Each key is one file under a directory. Writes go to a temporary file
//! that is renamed over the target, so a crash mid-write leaves the previous
//! snapshot intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use todo_store_core::byte_store::{ByteStore, ByteStoreFuture};

/// [`ByteStore`] keeping one file per key on local disk
#[derive(Debug, Clone)]
pub struct FileByteStore {
    dir: PathBuf,
}

impl FileByteStore {
    /// Creates a store rooted at `dir`
    ///
    /// The directory is created on the first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    ///
    /// Characters outside `[A-Za-z0-9_-]` are replaced with `_`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl ByteStore for FileByteStore {
    fn get<'a>(&'a self, key: &'a str) -> ByteStoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let path = self.path_for(key);
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(error) if error.kind() == ErrorKind::NotFound => {
                    tracing::trace!(path = %path.display(), "No state file");
                    Ok(None)
                },
                Err(error) => Err(error.into()),
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, bytes: Vec<u8>) -> ByteStoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(key);
            let staging = path.with_extension("json.tmp");

            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&staging, &bytes).await?;
            tokio::fs::rename(&staging, &path).await?;

            tracing::trace!(path = %path.display(), len = bytes.len(), "Wrote state file");
            Ok(())
        })
    }
}
