use std::fmt;

/// One keyed write inside a [`WriteBatch`].
///
/// The value is a list of borrowed parts that the engine stores as their
/// concatenation. Callers framing a large value (a header followed by content
/// chunks) can pass the pieces without building a contiguous copy first.
pub struct BatchEntry<'a> {
    pub key: &'a [u8],
    pub parts: Vec<&'a [u8]>,
}

impl BatchEntry<'_> {
    /// Total length of the value in bytes.
    pub fn value_len(&self) -> usize {
        self.parts.iter().map(|p| p.len()).sum()
    }

    /// Concatenate the value parts into one owned buffer.
    pub fn value_to_vec(&self) -> Vec<u8> {
        let mut value = Vec::with_capacity(self.value_len());
        for part in &self.parts {
            value.extend_from_slice(part);
        }
        value
    }
}

impl fmt::Debug for BatchEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchEntry")
            .field("key", &hex::encode(self.key))
            .field("parts", &self.parts.len())
            .field("value_len", &self.value_len())
            .finish()
    }
}

/// An ordered set of writes applied atomically by [`KvEngine::write_batch`].
///
/// If a key appears more than once, the last entry wins.
///
/// [`KvEngine::write_batch`]: crate::KvEngine::write_batch
#[derive(Debug, Default)]
pub struct WriteBatch<'a> {
    entries: Vec<BatchEntry<'a>>,
}

impl<'a> WriteBatch<'a> {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Queue a write of a contiguous value.
    pub fn put(&mut self, key: &'a [u8], value: &'a [u8]) -> &mut Self {
        self.entries.push(BatchEntry {
            key,
            parts: vec![value],
        });
        self
    }

    /// Queue a write whose value is the concatenation of `parts`.
    pub fn put_parts(&mut self, key: &'a [u8], parts: Vec<&'a [u8]>) -> &mut Self {
        self.entries.push(BatchEntry { key, parts });
        self
    }

    /// Queued entries in insertion order.
    pub fn entries(&self) -> &[BatchEntry<'a>] {
        &self.entries
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
