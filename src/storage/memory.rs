use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{Backend, Collection};

/// In-memory backend for tests and throwaway servers
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<Collection, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw bytes of a collection, for inspection
    pub fn raw(&self, collection: Collection) -> Option<Vec<u8>> {
        self.lock().get(&collection).cloned()
    }

    /// Decode a collection, for inspection
    pub fn decode<T: serde::de::DeserializeOwned>(&self, collection: Collection) -> Option<T> {
        self.raw(collection)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Collection, Vec<u8>>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Backend for MemoryBackend {
    fn read(&self, collection: Collection) -> io::Result<Option<Vec<u8>>> {
        Ok(self.lock().get(&collection).cloned())
    }

    fn write(&self, collection: Collection, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other(format!("write to {collection} refused")));
        }
        self.lock().insert(collection, bytes.to_vec());
        Ok(())
    }
}
