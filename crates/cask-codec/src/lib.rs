//! Object model and codecs for the Cask object store.
//!
//! Objects are encoded exactly as git encodes loose objects (minus zlib), so
//! any git-compatible reader can interpret the persisted bytes:
//!
//! - [`Blob`] -- `"blob <len>\0"` followed by the raw content
//! - [`Tree`] -- `"tree <len>\0"` followed by `"<mode> <name>\0<raw hash>"` entries
//!
//! [`ContentHasher`] computes the SHA-1 digests used as object ids and as the
//! per-blob content checksum.

pub mod blob;
pub mod error;
pub mod hasher;
pub mod tree;

pub use blob::{blob_header, Blob};
pub use error::{CodecError, CodecResult};
pub use hasher::ContentHasher;
pub use tree::{EntryMode, Tree, TreeEntry};

/// Split a git object into its type tag and body.
///
/// Validates the `"<kind> <decimal len>\0"` header and that the declared
/// length matches the body length.
pub(crate) fn split_git_header<'a>(
    expected_kind: &'static str,
    data: &'a [u8],
) -> CodecResult<(usize, &'a [u8])> {
    let nul = data
        .iter()
        .position(|b| *b == 0)
        .ok_or(CodecError::MissingHeaderTerminator)?;
    let header = &data[..nul];
    let header = std::str::from_utf8(header).map_err(|_| CodecError::InvalidHeader {
        reason: "header is not valid UTF-8".into(),
    })?;
    let (kind, len_str) = header.split_once(' ').ok_or_else(|| CodecError::InvalidHeader {
        reason: format!("malformed header {header:?}"),
    })?;
    if kind != expected_kind {
        return Err(CodecError::UnexpectedKind {
            expected: expected_kind,
            actual: kind.to_string(),
        });
    }
    if len_str.is_empty() || !len_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::InvalidHeader {
            reason: format!("invalid length field {len_str:?}"),
        });
    }
    let declared: usize = len_str.parse().map_err(|_| CodecError::InvalidHeader {
        reason: format!("length {len_str:?} out of range"),
    })?;
    let body_start = nul + 1;
    let actual = data.len() - body_start;
    if declared != actual {
        return Err(CodecError::LengthMismatch { declared, actual });
    }
    Ok((body_start, &data[body_start..]))
}
