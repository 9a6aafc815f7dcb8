use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

/// Fixed-size identifier for any stored object.
///
/// A `Hash` is 20 raw bytes. It names objects in the store (the primary key)
/// and doubles as a content checksum for blobs. Ordering and equality are by
/// raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; Hash::RAW_SIZE]);

impl Hash {
    /// Number of raw bytes in a hash.
    pub const RAW_SIZE: usize = 20;

    /// The all-zero hash. Represents "no identifier assigned yet".
    pub const ZERO: Hash = Hash([0u8; Hash::RAW_SIZE]);

    /// Create a `Hash` from a pre-computed digest.
    pub const fn from_raw(bytes: [u8; Hash::RAW_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a `Hash` from a byte slice, which must be exactly
    /// [`Hash::RAW_SIZE`] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; Hash::RAW_SIZE] =
            bytes.try_into().map_err(|_| TypeError::InvalidLength {
                expected: Hash::RAW_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Returns `true` if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; Hash::RAW_SIZE]
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; Hash::RAW_SIZE] {
        &self.0
    }

    /// Lowercase hex representation (40 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; Hash::RAW_SIZE]> for Hash {
    fn from(bytes: [u8; Hash::RAW_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for [u8; Hash::RAW_SIZE] {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = TypeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}
