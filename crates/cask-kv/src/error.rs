use std::io;

/// Errors reported by a key-value engine.
///
/// "Not found" is not an error; lookups return `Ok(None)` for absent keys.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// I/O error from the backing file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Persisted engine data failed an integrity check.
    #[error("corrupt engine data at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    /// A lock guarding engine state was poisoned by a panicking writer.
    #[error("engine lock poisoned")]
    LockPoisoned,

    /// A key, value, or batch exceeds what the record format can frame.
    #[error("record too large: {len} bytes")]
    TooLarge { len: u64 },
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;
