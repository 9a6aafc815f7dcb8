use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::batch::WriteBatch;
use crate::error::{EngineError, Result};
use crate::traits::KvEngine;

/// In-memory, ordered key-value engine.
///
/// Intended for tests and embedding. Entries live in a `BTreeMap` behind a
/// `RwLock`; a batch is applied under a single write-lock acquisition, which
/// makes it atomic with respect to readers. Values are copied on read and
/// write.
pub struct InMemoryEngine {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryEngine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Returns `true` if the engine holds no keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys in ascending byte order.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.entries.read().map_err(|_| EngineError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.entries.write().map_err(|_| EngineError::LockPoisoned)
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KvEngine for InMemoryEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch<'_>) -> Result<()> {
        // Materialize values before taking the lock so the critical section
        // only swaps map entries.
        let staged: Vec<(Vec<u8>, Vec<u8>)> = batch
            .entries()
            .iter()
            .map(|e| (e.key.to_vec(), e.value_to_vec()))
            .collect();

        let mut map = self.write()?;
        for (key, value) in staged {
            map.insert(key, value);
        }
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEngine")
            .field("key_count", &self.len().ok())
            .finish()
    }
}
