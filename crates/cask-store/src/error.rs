use std::path::PathBuf;

use cask_codec::CodecError;
use cask_kv::EngineError;

/// Errors from object store operations.
///
/// A missing key is not an error; lookups return an absent result instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The engine failed a read or write. Never retried by the store.
    #[error("failed to {op} key {key} in local store: {source}")]
    Engine {
        op: &'static str,
        key: String,
        source: EngineError,
    },

    /// An attribute record exists but has the wrong length.
    #[error(
        "database entry for {key} was not of size {expected} \
         (found {actual} bytes); could not convert to SHA-1"
    )]
    CorruptAttribute {
        key: String,
        expected: usize,
        actual: usize,
    },

    /// The object codec rejected bytes while encoding or decoding.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The engine failed to flush buffered writes on close.
    #[error("failed to flush local store: {0}")]
    Flush(#[source] EngineError),

    /// The configured engine could not be opened.
    #[error("failed to open store at {}: {source}", path.display())]
    Open { path: PathBuf, source: EngineError },

    /// The configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;
