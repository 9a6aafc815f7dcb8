use std::cmp::Ordering;

use cask_types::Hash;

use crate::error::{CodecError, CodecResult};
use crate::hasher::ContentHasher;
use crate::split_git_header;

/// File mode for a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Normal file (100644).
    Regular,
    /// Executable file (100755).
    Executable,
    /// Symbolic link (120000).
    Symlink,
    /// Subtree / directory (40000).
    Directory,
    /// Submodule commit reference (160000).
    Gitlink,
}

impl EntryMode {
    /// Octal mode value as git writes it.
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Directory => 0o040000,
            Self::Gitlink => 0o160000,
        }
    }

    /// Parse from an octal mode value.
    pub fn from_mode_bits(bits: u32) -> Option<Self> {
        match bits {
            0o100644 => Some(Self::Regular),
            0o100755 => Some(Self::Executable),
            0o120000 => Some(Self::Symlink),
            0o040000 => Some(Self::Directory),
            0o160000 => Some(Self::Gitlink),
            _ => None,
        }
    }

    /// Returns `true` for subtrees.
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// A single entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// File mode (regular, executable, symlink, directory, gitlink).
    pub mode: EntryMode,
    /// Entry name (a single path component).
    pub name: String,
    /// Id of the referenced blob or subtree.
    pub hash: Hash,
}

impl TreeEntry {
    /// Create a new tree entry.
    pub fn new(mode: EntryMode, name: impl Into<String>, hash: Hash) -> Self {
        Self {
            mode,
            name: name.into(),
            hash,
        }
    }

    /// Git sorts subtrees as if their name ended in `/`.
    fn sort_key(&self) -> impl Iterator<Item = u8> + '_ {
        let suffix = if self.mode.is_tree() { Some(b'/') } else { None };
        self.name.bytes().chain(suffix)
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(other.sort_key())
    }
}

/// Directory listing object.
///
/// `hash` is [`Hash::ZERO`] for a tree that has not been assigned an id yet;
/// the store then derives one from the serialized bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree {
    /// Id of this tree, or [`Hash::ZERO`] if unassigned.
    pub hash: Hash,
    /// Entries in git order.
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a tree with the given id and entries.
    ///
    /// Entries are sorted into git order for deterministic hashing.
    pub fn new(hash: Hash, mut entries: Vec<TreeEntry>) -> Self {
        entries.sort();
        Self { hash, entries }
    }

    /// Create a tree with no id assigned.
    pub fn unhashed(entries: Vec<TreeEntry>) -> Self {
        Self::new(Hash::ZERO, entries)
    }

    /// Create an empty, unhashed tree.
    pub fn empty() -> Self {
        Self {
            hash: Hash::ZERO,
            entries: Vec::new(),
        }
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as a git tree object, header included.
    pub fn serialize_git(&self) -> CodecResult<Vec<u8>> {
        let mut body = Vec::with_capacity(self.entries.len() * (Hash::RAW_SIZE + 32));
        for entry in &self.entries {
            validate_name(&entry.name)?;
            body.extend_from_slice(format!("{:o} ", entry.mode.mode_bits()).as_bytes());
            body.extend_from_slice(entry.name.as_bytes());
            body.push(0);
            body.extend_from_slice(entry.hash.as_bytes());
        }

        let mut out = format!("tree {}", body.len()).into_bytes();
        out.push(0);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// SHA-1 of the serialized tree.
    pub fn compute_hash(&self) -> CodecResult<Hash> {
        Ok(ContentHasher::sha1(&self.serialize_git()?))
    }

    /// Decode a git tree object stored under `hash`.
    ///
    /// Entry order is preserved as stored.
    pub fn deserialize_git(hash: Hash, data: &[u8]) -> CodecResult<Self> {
        let (_, mut body) = split_git_header("tree", data)?;
        let malformed = |reason: String| CodecError::MalformedTreeEntry { tree: hash, reason };

        let mut entries = Vec::new();
        while !body.is_empty() {
            let space = body
                .iter()
                .position(|b| *b == b' ')
                .ok_or_else(|| malformed("missing space after mode".into()))?;
            let mode_str = std::str::from_utf8(&body[..space])
                .map_err(|_| malformed("mode is not ASCII".into()))?;
            let bits = u32::from_str_radix(mode_str, 8)
                .map_err(|_| malformed(format!("invalid mode {mode_str:?}")))?;
            let mode =
                EntryMode::from_mode_bits(bits).ok_or(CodecError::UnknownMode { mode: bits })?;
            body = &body[space + 1..];

            let nul = body
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| malformed("missing NUL after name".into()))?;
            let name = std::str::from_utf8(&body[..nul])
                .map_err(|_| malformed("name is not valid UTF-8".into()))?;
            validate_name(name)?;
            body = &body[nul + 1..];

            if body.len() < Hash::RAW_SIZE {
                return Err(malformed(format!(
                    "entry {name:?} has a truncated hash ({} bytes)",
                    body.len()
                )));
            }
            let (raw, rest) = body.split_at(Hash::RAW_SIZE);
            let entry_hash = Hash::from_slice(raw).map_err(|e| malformed(e.to_string()))?;
            entries.push(TreeEntry::new(mode, name, entry_hash));
            body = rest;
        }

        Ok(Self { hash, entries })
    }
}

fn validate_name(name: &str) -> CodecResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\0') {
        return Err(CodecError::InvalidEntryName {
            name: name.to_string(),
        });
    }
    Ok(())
}
