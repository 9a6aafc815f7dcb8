use bytes::{Bytes, BytesMut};
use cask_types::Hash;

use crate::error::CodecResult;
use crate::hasher::ContentHasher;
use crate::split_git_header;

/// Git-style blob header: `"blob <len>\0"`.
pub fn blob_header(len: usize) -> Vec<u8> {
    let mut header = format!("blob {len}").into_bytes();
    header.push(0);
    header
}

/// File content object, identified by `hash`.
///
/// Content is held as a chain of [`Bytes`] chunks so that large payloads can
/// be hashed and written without first being coalesced into one buffer. A
/// blob decoded from the store always has a single chunk that shares the
/// lookup buffer.
#[derive(Clone, Debug)]
pub struct Blob {
    hash: Hash,
    chunks: Vec<Bytes>,
}

impl Blob {
    /// Create a blob from one contiguous buffer.
    pub fn new(hash: Hash, contents: impl Into<Bytes>) -> Self {
        Self::from_chunks(hash, vec![contents.into()])
    }

    /// Create a blob whose content is the concatenation of `chunks`.
    pub fn from_chunks(hash: Hash, chunks: Vec<Bytes>) -> Self {
        let chunks = chunks.into_iter().filter(|c| !c.is_empty()).collect();
        Self { hash, chunks }
    }

    /// The id this blob is stored under.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Content chunks in order.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks.iter().map(|c| &c[..])
    }

    /// Total content length in bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Returns `true` if the blob has no content.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The content as one buffer. Zero-copy unless the blob has several chunks.
    pub fn contents(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            many => {
                let mut buf = BytesMut::with_capacity(self.len());
                for chunk in many {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }

    /// SHA-1 of the raw content (not of the framed object).
    pub fn sha1(&self) -> Hash {
        ContentHasher::sha1_chunks(self.chunks())
    }

    /// Header for the framed git object of this blob.
    pub fn git_header(&self) -> Vec<u8> {
        blob_header(self.len())
    }

    /// Full git object encoding: header followed by content.
    pub fn to_git_bytes(&self) -> Vec<u8> {
        let mut out = self.git_header();
        out.reserve(self.len());
        for chunk in self.chunks() {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// SHA-1 of the framed git object, i.e. the id `git hash-object` assigns.
    pub fn git_object_id(&self) -> Hash {
        let header = self.git_header();
        ContentHasher::sha1_chunks(std::iter::once(header.as_slice()).chain(self.chunks()))
    }

    /// Decode a framed git blob, taking ownership of `data`.
    ///
    /// The returned blob's content is a slice of `data`; no bytes are copied.
    pub fn deserialize_git(hash: Hash, data: Bytes) -> CodecResult<Self> {
        let (body_start, _) = split_git_header("blob", &data)?;
        Ok(Self::new(hash, data.slice(body_start..)))
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.len() == other.len() && self.contents() == other.contents()
    }
}

impl Eq for Blob {}
