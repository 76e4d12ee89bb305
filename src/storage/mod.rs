//! Durable storage for the directory and regional stores
//!
//! Every logical collection is one record, rewritten in full on each
//! mutation. There is no append log and no compaction.
//!
//! # Backends
//!
//! - [`FileBackend`] - one JSON file per collection under a data directory,
//!   written through a temporary file and renamed into place
//! - [`MemoryBackend`] - in-process map used by tests, with a switch to make
//!   writes fail
//!
//! # Example
//!
//! ```no_run
//! use pawmatch::storage::{Backend, Collection, FileBackend};
//! use std::path::Path;
//!
//! # fn example() -> std::io::Result<()> {
//! let backend = FileBackend::new(Path::new("./data"))?;
//! backend.write(Collection::Animals, b"[]")?;
//! assert_eq!(backend.read(Collection::Animals)?, Some(b"[]".to_vec()));
//! # Ok(())
//! # }
//! ```

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;

use crate::error::{Error, Result};

/// Logical collections persisted by the servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Animals,
    Matches,
    Likes,
    /// Master city registry
    Registry,
    /// Master aggregated snapshot
    Aggregated,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Animals => "animals",
            Self::Matches => "matches",
            Self::Likes => "likes",
            Self::Registry => "server_registry",
            Self::Aggregated => "aggregated_data",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.name())
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage seam injected into the stores
pub trait Backend: Send + Sync {
    /// Read a whole collection; `None` if it was never written
    fn read(&self, collection: Collection) -> io::Result<Option<Vec<u8>>>;

    /// Replace a whole collection
    fn write(&self, collection: Collection, bytes: &[u8]) -> io::Result<()>;
}

/// Serialize `value` and replace the collection with it
pub fn save<T: Serialize + ?Sized>(backend: &dyn Backend, collection: Collection, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    backend.write(collection, &bytes).map_err(|source| Error::Persistence {
        collection: collection.name(),
        source,
    })?;
    tracing::debug!(collection = %collection, bytes = bytes.len(), "Collection saved");
    Ok(())
}

/// Load a collection, falling back to `T::default()` when it is missing or
/// unreadable.
///
/// A fallback is written back so the next start finds a valid record. Write
/// failures at this point are logged only; startup never fails on storage.
pub fn load_or_default<T>(backend: &dyn Backend, collection: Collection) -> T
where
    T: Serialize + DeserializeOwned + Default,
{
    let reason = match backend.read(collection) {
        Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => {
                tracing::debug!(collection = %collection, "Collection loaded");
                return value;
            }
            Err(e) => format!("corrupt record: {e}"),
        },
        Ok(None) => "no record".to_string(),
        Err(e) => format!("read failed: {e}"),
    };

    tracing::warn!(collection = %collection, reason = %reason, "Initialising collection with defaults");

    let value = T::default();
    if let Err(e) = save(backend, collection, &value) {
        tracing::warn!(collection = %collection, "Failed to write default record: {}", e);
    }
    value
}
