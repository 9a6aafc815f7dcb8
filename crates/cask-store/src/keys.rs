//! Engine key encoding.
//!
//! Objects live under their raw hash. Derived per-object values live under
//! the raw hash followed by a one-byte [`AttributeTag`].

use std::fmt;

use cask_types::Hash;

/// Length of an attribute key: raw hash plus one tag byte.
pub const ATTRIBUTE_KEY_SIZE: usize = Hash::RAW_SIZE + 1;

/// Tag byte distinguishing attribute records that hang off one object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeTag {
    /// SHA-1 of a blob's raw content.
    Sha1 = b's',
}

impl AttributeTag {
    /// The tag byte written after the hash.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parse a tag byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b's' => Some(Self::Sha1),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
        }
    }
}

/// Key of the object record for `hash`: the raw hash bytes.
pub fn primary_key(hash: &Hash) -> &[u8] {
    hash.as_bytes()
}

/// Key of the `tag` attribute record for `hash`.
pub fn attribute_key(hash: &Hash, tag: AttributeTag) -> AttributeKey {
    AttributeKey::new(hash, tag)
}

/// Fixed-size attribute key: `hash || tag`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeKey([u8; ATTRIBUTE_KEY_SIZE]);

impl AttributeKey {
    /// Build the key for `tag` on `hash`.
    pub fn new(hash: &Hash, tag: AttributeTag) -> Self {
        let mut key = [0u8; ATTRIBUTE_KEY_SIZE];
        key[..Hash::RAW_SIZE].copy_from_slice(hash.as_bytes());
        key[Hash::RAW_SIZE] = tag.as_byte();
        Self(key)
    }

    /// The encoded key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex form, used in error messages.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeKey({})", self.to_hex())
    }
}

impl AsRef<[u8]> for AttributeKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// What a raw engine key refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodedKey {
    /// An object record.
    Primary(Hash),
    /// An attribute record of an object.
    Attribute(Hash, AttributeTag),
}

impl DecodedKey {
    /// Classify a raw key by its length and tag byte.
    ///
    /// Returns `None` for keys this store never writes.
    pub fn parse(key: &[u8]) -> Option<Self> {
        match key.len() {
            Hash::RAW_SIZE => Hash::from_slice(key).ok().map(Self::Primary),
            ATTRIBUTE_KEY_SIZE => {
                let hash = Hash::from_slice(&key[..Hash::RAW_SIZE]).ok()?;
                let tag = AttributeTag::from_byte(key[Hash::RAW_SIZE])?;
                Some(Self::Attribute(hash, tag))
            }
            _ => None,
        }
    }

    /// The object this key belongs to.
    pub fn hash(&self) -> Hash {
        match self {
            Self::Primary(hash) | Self::Attribute(hash, _) => *hash,
        }
    }
}
