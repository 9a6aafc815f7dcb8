use cask_types::Hash;

/// Errors from encoding or decoding stored objects.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The object header has no NUL terminator.
    #[error("object header is missing its NUL terminator")]
    MissingHeaderTerminator,

    /// The object header could not be parsed.
    #[error("invalid object header: {reason}")]
    InvalidHeader { reason: String },

    /// The header names a different object type than the caller asked for.
    #[error("expected {expected} object, found {actual}")]
    UnexpectedKind {
        expected: &'static str,
        actual: String,
    },

    /// The header length disagrees with the number of body bytes.
    #[error("object declares {declared} bytes but carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// A tree entry could not be decoded.
    #[error("malformed entry in tree {tree}: {reason}")]
    MalformedTreeEntry { tree: Hash, reason: String },

    /// A tree entry carries a mode this codec does not know.
    #[error("unknown tree entry mode {mode:o}")]
    UnknownMode { mode: u32 },

    /// A tree entry name is empty or contains `/` or NUL.
    #[error("invalid tree entry name {name:?}")]
    InvalidEntryName { name: String },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
