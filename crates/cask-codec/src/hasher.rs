use cask_types::Hash;
use sha1::{Digest, Sha1};

/// Incremental SHA-1 content hasher.
///
/// SHA-1 is the content hash persisted next to every blob and the function
/// that assigns ids to trees written without one. Content can be fed in
/// several chunks without coalescing it first.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha1,
}

impl ContentHasher {
    /// Create an empty hasher.
    pub fn new() -> Self {
        Self { inner: Sha1::new() }
    }

    /// Feed more bytes into the digest.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Consume the hasher and return the digest.
    pub fn finalize(self) -> Hash {
        to_hash(&self.inner.finalize())
    }

    /// SHA-1 of a contiguous buffer.
    pub fn sha1(data: &[u8]) -> Hash {
        to_hash(&Sha1::digest(data))
    }

    /// SHA-1 over a sequence of chunks, as if they were concatenated.
    pub fn sha1_chunks<'a, I>(chunks: I) -> Hash
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = Self::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        hasher.finalize()
    }

    /// Verify that `data` hashes to `expected`.
    pub fn verify(data: &[u8], expected: &Hash) -> bool {
        Self::sha1(data) == *expected
    }
}

fn to_hash(digest: &[u8]) -> Hash {
    let mut raw = [0u8; Hash::RAW_SIZE];
    raw.copy_from_slice(digest);
    Hash::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            ContentHasher::sha1(b"hello").to_hex(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn chunked_matches_contiguous() {
        let chunked = ContentHasher::sha1_chunks([&b"hel"[..], b"", b"lo"]);
        assert_eq!(chunked, ContentHasher::sha1(b"hello"));

        let mut incremental = ContentHasher::new();
        incremental.update(b"he").update(b"llo");
        assert_eq!(incremental.finalize(), chunked);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::sha1(b"original");
        assert!(ContentHasher::verify(b"original", &id));
        assert!(!ContentHasher::verify(b"tampered", &id));
    }
}
