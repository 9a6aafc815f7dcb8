use crate::batch::WriteBatch;
use crate::error::Result;

/// Ordered key-value engine driven by the object store.
///
/// All implementations must satisfy these invariants:
/// - `get` returns `Ok(None)` for a missing key and `Err` only on failure.
/// - `write_batch` is atomic: a concurrent reader observes every entry of the
///   batch or none of them.
/// - Returned values are owned copies; they never borrow engine internals.
/// - Errors are propagated as-is. Engines never retry on the caller's behalf.
pub trait KvEngine: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write a single key. Overwrites any existing value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Apply every entry of `batch` as one atomic write.
    fn write_batch(&self, batch: WriteBatch<'_>) -> Result<()>;

    /// Flush buffered writes to durable storage.
    ///
    /// Default implementation does nothing (for engines without buffering).
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Check whether `key` is present.
    ///
    /// Default implementation calls `get()`. Backends may override to avoid
    /// reading the value.
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<E: KvEngine + ?Sized> KvEngine for Box<E> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn write_batch(&self, batch: WriteBatch<'_>) -> Result<()> {
        (**self).write_batch(batch)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        (**self).contains(key)
    }
}

impl<E: KvEngine + ?Sized> KvEngine for std::sync::Arc<E> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn write_batch(&self, batch: WriteBatch<'_>) -> Result<()> {
        (**self).write_batch(batch)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        (**self).contains(key)
    }
}
