use cask_codec::{Blob, ContentHasher, Tree};
use cask_kv::{EngineError, InMemoryEngine, KvEngine, LogEngine, WriteBatch};
use cask_types::Hash;
use tracing::{debug, info};

use crate::config::{EngineKind, StoreConfig};
use crate::error::{Result, StoreError};
use crate::keys::{attribute_key, primary_key, AttributeTag};
use crate::result::StoreResult;

/// Content-addressed object store over a key-value engine.
///
/// Trees and blobs are stored git-encoded under their raw hash. Every blob
/// write also records the SHA-1 of the blob's content under an attribute key,
/// in the same atomic batch. The store keeps no state besides the engine
/// handle, so it can be shared across threads behind an `Arc`.
pub struct LocalStore {
    engine: Box<dyn KvEngine>,
}

impl LocalStore {
    /// Open the engine described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let engine: Box<dyn KvEngine> = match config.engine {
            EngineKind::Memory => Box::new(InMemoryEngine::new()),
            EngineKind::Log => {
                let path = config.log_path();
                let engine = LogEngine::open(&path, config.log_config())
                    .map_err(|source| StoreError::Open { path, source })?;
                Box::new(engine)
            }
        };
        info!(
            engine = ?config.engine,
            path = %config.path.display(),
            "local store opened"
        );
        Ok(Self { engine })
    }

    /// Wrap an already constructed engine.
    pub fn with_engine(engine: impl KvEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    /// Look up the value stored under an arbitrary engine key.
    pub fn get_raw(&self, key: &[u8]) -> Result<StoreResult> {
        self.engine
            .get(key)
            .map(StoreResult::from)
            .map_err(engine_error("get", key))
    }

    /// Look up the object record for `hash`.
    pub fn get(&self, hash: &Hash) -> Result<StoreResult> {
        self.get_raw(primary_key(hash))
    }

    /// Fetch and decode the tree stored under `hash`.
    pub fn get_tree(&self, hash: &Hash) -> Result<Option<Tree>> {
        match self.get(hash)?.bytes() {
            Some(data) => Ok(Some(Tree::deserialize_git(*hash, data)?)),
            None => Ok(None),
        }
    }

    /// Fetch and decode the blob stored under `hash`.
    ///
    /// The returned blob owns the lookup buffer; its content is a view into it.
    pub fn get_blob(&self, hash: &Hash) -> Result<Option<Blob>> {
        match self.get(hash)?.into_shared() {
            Some(data) => Ok(Some(Blob::deserialize_git(*hash, data)?)),
            None => Ok(None),
        }
    }

    /// SHA-1 of the content of the blob stored under `hash`.
    pub fn get_sha1_for_blob(&self, hash: &Hash) -> Result<Option<Hash>> {
        let key = attribute_key(hash, AttributeTag::Sha1);
        let Some(value) = self.get_raw(key.as_bytes())?.into_bytes() else {
            return Ok(None);
        };
        Hash::from_slice(&value)
            .map(Some)
            .map_err(|_| StoreError::CorruptAttribute {
                key: key.to_hex(),
                expected: Hash::RAW_SIZE,
                actual: value.len(),
            })
    }

    /// Store `blob` under `hash` together with the SHA-1 of its content.
    ///
    /// The framed value is handed to the engine as a header span followed by
    /// the blob's own chunks; nothing is concatenated here.
    pub fn put_blob(&self, hash: &Hash, blob: &Blob) -> Result<()> {
        let sha1 = blob.sha1();
        let header = blob.git_header();
        let mut parts = Vec::with_capacity(1 + blob.chunks().count());
        parts.push(header.as_slice());
        parts.extend(blob.chunks());

        let attr = attribute_key(hash, AttributeTag::Sha1);
        let mut batch = WriteBatch::new();
        batch
            .put_parts(primary_key(hash), parts)
            .put(attr.as_bytes(), sha1.as_bytes());
        self.engine
            .write_batch(batch)
            .map_err(engine_error("put blob", primary_key(hash)))?;

        debug!(hash = %hash.short_hex(), len = blob.len(), "stored blob");
        Ok(())
    }

    /// Store already framed blob bytes and a caller-computed content SHA-1.
    ///
    /// Neither value is checked.
    pub fn put_blob_raw(&self, hash: &Hash, blob_data: &[u8], sha1: &Hash) -> Result<()> {
        let attr = attribute_key(hash, AttributeTag::Sha1);
        let mut batch = WriteBatch::new();
        batch
            .put(primary_key(hash), blob_data)
            .put(attr.as_bytes(), sha1.as_bytes());
        self.engine
            .write_batch(batch)
            .map_err(engine_error("put blob", primary_key(hash)))?;

        debug!(hash = %hash.short_hex(), len = blob_data.len(), "stored raw blob");
        Ok(())
    }

    /// Store `tree` and return the id it was stored under.
    ///
    /// A tree whose hash is [`Hash::ZERO`] is keyed by the SHA-1 of its
    /// encoding. Any other hash is trusted as given.
    pub fn put_tree(&self, tree: &Tree) -> Result<Hash> {
        let data = tree.serialize_git()?;
        let id = if tree.hash.is_zero() {
            ContentHasher::sha1(&data)
        } else {
            tree.hash
        };
        self.put(primary_key(&id), &data)?;

        debug!(hash = %id.short_hex(), entries = tree.len(), "stored tree");
        Ok(id)
    }

    /// Write a single key outside of any batch.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.engine.put(key, value).map_err(engine_error("put", key))
    }

    /// Flush the engine and release it.
    pub fn close(self) -> Result<()> {
        self.engine.flush().map_err(StoreError::Flush)?;
        info!("local store closed");
        Ok(())
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

/// Wrap an engine failure with the operation and hex key. The key is only
/// encoded when an error actually occurs.
fn engine_error<'k>(
    op: &'static str,
    key: &'k [u8],
) -> impl FnOnce(EngineError) -> StoreError + 'k {
    move |source| StoreError::Engine {
        op,
        key: hex::encode(key),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cask_codec::{CodecError, EntryMode, TreeEntry};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn memory_store() -> LocalStore {
        LocalStore::with_engine(InMemoryEngine::new())
    }

    fn hello_hash() -> Hash {
        "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0".parse().unwrap()
    }

    /// Engine whose every call fails with an I/O error.
    struct FailingEngine;

    impl KvEngine for FailingEngine {
        fn get(&self, _key: &[u8]) -> cask_kv::Result<Option<Vec<u8>>> {
            Err(EngineError::Io(std::io::Error::other("disk on fire")))
        }

        fn put(&self, _key: &[u8], _value: &[u8]) -> cask_kv::Result<()> {
            Err(EngineError::Io(std::io::Error::other("disk on fire")))
        }

        fn write_batch(&self, _batch: WriteBatch<'_>) -> cask_kv::Result<()> {
            Err(EngineError::Io(std::io::Error::other("disk on fire")))
        }

        fn flush(&self) -> cask_kv::Result<()> {
            Err(EngineError::Io(std::io::Error::other("disk on fire")))
        }
    }

    #[test]
    fn hello_blob_roundtrip() {
        let store = memory_store();
        let hash = hello_hash();
        let blob = Blob::new(hash, &b"hello"[..]);
        store.put_blob(&hash, &blob).unwrap();

        let raw = store.get(&hash).unwrap();
        assert_eq!(raw.bytes(), Some(&b"blob 5\0hello"[..]));

        let got = store.get_blob(&hash).unwrap().unwrap();
        assert_eq!(got.hash(), hash);
        assert_eq!(got.contents(), Bytes::from_static(b"hello"));
        assert_eq!(got, blob);

        let sha1 = store.get_sha1_for_blob(&hash).unwrap().unwrap();
        assert_eq!(sha1.to_hex(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert!(ContentHasher::verify(&got.contents(), &sha1));
        assert!(!ContentHasher::verify(b"hello!", &sha1));
    }

    #[test]
    fn chunked_blob_is_stored_contiguously() {
        let store = memory_store();
        let hash = Hash::from_raw([7; 20]);
        let blob = Blob::from_chunks(
            hash,
            vec![Bytes::from_static(b"hel"), Bytes::new(), Bytes::from_static(b"lo")],
        );
        store.put_blob(&hash, &blob).unwrap();

        assert_eq!(store.get(&hash).unwrap().bytes(), Some(&b"blob 5\0hello"[..]));
        assert_eq!(
            store.get_sha1_for_blob(&hash).unwrap(),
            Some(ContentHasher::sha1(b"hello"))
        );
    }

    #[test]
    fn empty_blob() {
        let store = memory_store();
        let hash: Hash = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391".parse().unwrap();
        store.put_blob(&hash, &Blob::new(hash, Bytes::new())).unwrap();

        let got = store.get_blob(&hash).unwrap().unwrap();
        assert!(got.is_empty());
        assert_eq!(
            store.get_sha1_for_blob(&hash).unwrap(),
            Some(ContentHasher::sha1(b""))
        );
    }

    #[test]
    fn missing_keys_are_absent_not_errors() {
        let store = memory_store();
        let hash = Hash::from_raw([9; 20]);
        assert!(!store.get(&hash).unwrap().is_present());
        assert!(!store.get_raw(b"anything").unwrap().is_present());
        assert!(store.get_tree(&hash).unwrap().is_none());
        assert!(store.get_blob(&hash).unwrap().is_none());
        assert!(store.get_sha1_for_blob(&hash).unwrap().is_none());
    }

    #[test]
    fn engine_failures_surface_with_context() {
        let store = LocalStore::with_engine(FailingEngine);
        let hash = Hash::from_raw([0xab; 20]);

        let err = store.get(&hash).unwrap_err();
        match &err {
            StoreError::Engine { op, key, .. } => {
                assert_eq!(*op, "get");
                assert_eq!(key, &hash.to_hex());
            }
            other => panic!("expected engine error, got {other:?}"),
        }
        assert!(err.to_string().contains("disk on fire"));

        let err = store.get_sha1_for_blob(&hash).unwrap_err();
        match err {
            StoreError::Engine { key, .. } => assert!(key.ends_with("73")),
            other => panic!("expected engine error, got {other:?}"),
        }

        let blob = Blob::new(hash, &b"x"[..]);
        assert!(matches!(
            store.put_blob(&hash, &blob),
            Err(StoreError::Engine { op: "put blob", .. })
        ));
        match store.put_blob_raw(&hash, b"blob 1\0x", &ContentHasher::sha1(b"x")) {
            Err(StoreError::Engine { op: "put blob", key, .. }) => assert_eq!(key, hash.to_hex()),
            other => panic!("expected engine error, got {other:?}"),
        }
        assert!(matches!(
            store.put(b"k", b"v"),
            Err(StoreError::Engine { op: "put", .. })
        ));
        let empty_tree_hex = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
        match store.put_tree(&Tree::empty()) {
            Err(StoreError::Engine { op: "put", key, .. }) => assert_eq!(key, empty_tree_hex),
            other => panic!("expected engine error, got {other:?}"),
        }
        assert!(matches!(store.get_tree(&hash), Err(StoreError::Engine { .. })));
        assert!(matches!(store.close(), Err(StoreError::Flush(_))));
    }

    #[test]
    fn wrong_size_sha1_attribute_is_corruption() {
        let store = memory_store();
        let hash = Hash::from_raw([0x5a; 20]);
        let key = attribute_key(&hash, AttributeTag::Sha1);
        store.put(key.as_bytes(), &[1, 2, 3]).unwrap();

        match store.get_sha1_for_blob(&hash).unwrap_err() {
            StoreError::CorruptAttribute {
                key: reported,
                expected,
                actual,
            } => {
                assert_eq!(reported, key.to_hex());
                assert_eq!(expected, 20);
                assert_eq!(actual, 3);
            }
            other => panic!("expected corrupt attribute, got {other:?}"),
        }
    }

    #[test]
    fn put_blob_and_put_blob_raw_write_identical_records() {
        let hash = hello_hash();
        let blob = Blob::new(hash, &b"hello"[..]);

        let a = Arc::new(InMemoryEngine::new());
        LocalStore::with_engine(Arc::clone(&a))
            .put_blob(&hash, &blob)
            .unwrap();

        let b = Arc::new(InMemoryEngine::new());
        LocalStore::with_engine(Arc::clone(&b))
            .put_blob_raw(&hash, &blob.to_git_bytes(), &ContentHasher::sha1(b"hello"))
            .unwrap();

        assert_eq!(a.keys().unwrap(), b.keys().unwrap());
        for key in a.keys().unwrap() {
            assert_eq!(a.get(&key).unwrap(), b.get(&key).unwrap());
        }
        assert_eq!(a.len().unwrap(), 2);
    }

    #[test]
    fn repeated_put_blob_is_idempotent() {
        let engine = Arc::new(InMemoryEngine::new());
        let store = LocalStore::with_engine(Arc::clone(&engine));
        let hash = hello_hash();
        let blob = Blob::new(hash, &b"hello"[..]);

        store.put_blob(&hash, &blob).unwrap();
        let first = store.get(&hash).unwrap();
        store.put_blob(&hash, &blob).unwrap();

        assert_eq!(store.get(&hash).unwrap(), first);
        assert_eq!(engine.len().unwrap(), 2);
    }

    #[test]
    fn unhashed_tree_gets_git_id() {
        let store = memory_store();
        let tree = Tree::unhashed(vec![TreeEntry::new(
            EntryMode::Regular,
            "hello.txt",
            hello_hash(),
        )]);
        let id = store.put_tree(&tree).unwrap();
        assert_eq!(id.to_hex(), "04df07b08ca746b3167d0f1d1514e2f39a52c16c");

        let got = store.get_tree(&id).unwrap().unwrap();
        assert_eq!(got.hash, id);
        assert_eq!(got.entries, tree.entries);
    }

    #[test]
    fn empty_tree_id() {
        let store = memory_store();
        let id = store.put_tree(&Tree::empty()).unwrap();
        assert_eq!(id.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        assert!(store.get_tree(&id).unwrap().unwrap().is_empty());
    }

    #[test]
    fn supplied_tree_hash_is_used_unverified() {
        let store = memory_store();
        let claimed = Hash::from_raw([0xee; 20]);
        let tree = Tree::new(claimed, Vec::new());
        assert_eq!(store.put_tree(&tree).unwrap(), claimed);
        assert!(store.get_tree(&claimed).unwrap().is_some());
    }

    #[test]
    fn invalid_tree_entry_is_rejected_before_write() {
        let engine = Arc::new(InMemoryEngine::new());
        let store = LocalStore::with_engine(Arc::clone(&engine));
        let tree = Tree::unhashed(vec![TreeEntry::new(EntryMode::Regular, "a/b", hello_hash())]);

        assert!(matches!(
            store.put_tree(&tree),
            Err(StoreError::Codec(CodecError::InvalidEntryName { .. }))
        ));
        assert!(engine.is_empty().unwrap());
    }

    #[test]
    fn decode_failures_propagate() {
        let store = memory_store();
        let hash = Hash::from_raw([0x42; 20]);
        store.put(primary_key(&hash), b"not an object").unwrap();
        assert!(matches!(store.get_tree(&hash), Err(StoreError::Codec(_))));
        assert!(matches!(store.get_blob(&hash), Err(StoreError::Codec(_))));

        let tree_id = store.put_tree(&Tree::empty()).unwrap();
        assert!(matches!(
            store.get_blob(&tree_id),
            Err(StoreError::Codec(CodecError::UnexpectedKind { expected: "blob", .. }))
        ));
    }

    fn assert_blob_pairs_stay_atomic(store: LocalStore) {
        let store = Arc::new(store);
        let hashes: Vec<Hash> = (0u8..64).map(|i| Hash::from_raw([i; 20])).collect();

        let writer = {
            let store = Arc::clone(&store);
            let hashes = hashes.clone();
            thread::spawn(move || {
                for (i, hash) in hashes.iter().enumerate() {
                    let blob = Blob::new(*hash, format!("content {i}").into_bytes());
                    store.put_blob(hash, &blob).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|n| {
                let store = Arc::clone(&store);
                let hashes = hashes.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        for hash in &hashes {
                            if n % 2 == 0 {
                                if store.get_sha1_for_blob(hash).unwrap().is_some() {
                                    assert!(store.get_blob(hash).unwrap().is_some());
                                }
                            } else if store.get_blob(hash).unwrap().is_some() {
                                assert!(store.get_sha1_for_blob(hash).unwrap().is_some());
                            }
                        }
                    }
                })
            })
            .collect();

        writer.join().expect("writer should not panic");
        for r in readers {
            r.join().expect("reader should not panic");
        }

        for (i, hash) in hashes.iter().enumerate() {
            let expected = format!("content {i}");
            assert_eq!(
                store.get_blob(hash).unwrap().unwrap().contents(),
                Bytes::from(expected.clone())
            );
            assert_eq!(
                store.get_sha1_for_blob(hash).unwrap(),
                Some(ContentHasher::sha1(expected.as_bytes()))
            );
        }
    }

    #[test]
    fn readers_never_see_half_a_blob_write() {
        assert_blob_pairs_stay_atomic(memory_store());
    }

    #[test]
    fn log_readers_never_see_half_a_blob_write() {
        let dir = tempfile::tempdir().unwrap();
        assert_blob_pairs_stay_atomic(LocalStore::open(&StoreConfig::at(dir.path())).unwrap());
    }

    #[test]
    fn log_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at(dir.path());
        let hash = hello_hash();

        let tree_id = {
            let store = LocalStore::open(&config).unwrap();
            store.put_blob(&hash, &Blob::new(hash, &b"hello"[..])).unwrap();
            let id = store
                .put_tree(&Tree::unhashed(vec![TreeEntry::new(
                    EntryMode::Regular,
                    "hello.txt",
                    hash,
                )]))
                .unwrap();
            store.close().unwrap();
            id
        };

        let store = LocalStore::open(&config).unwrap();
        assert_eq!(
            store.get_blob(&hash).unwrap().unwrap().contents(),
            Bytes::from_static(b"hello")
        );
        assert_eq!(
            store.get_sha1_for_blob(&hash).unwrap(),
            Some(ContentHasher::sha1(b"hello"))
        );
        let tree = store.get_tree(&tree_id).unwrap().unwrap();
        assert_eq!(tree.get("hello.txt").map(|e| e.hash), Some(hash));
    }

    #[test]
    fn open_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let err = LocalStore::open(&StoreConfig::at(blocker.join("store"))).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
        assert!(err.to_string().contains("blocker"));
    }

    #[test]
    fn memory_config_opens_empty_store() {
        let store = LocalStore::open(&StoreConfig::in_memory()).unwrap();
        assert!(store.get(&Hash::from_raw([1; 20])).unwrap().bytes().is_none());
        store.close().unwrap();
    }

    fn entry_mode() -> impl Strategy<Value = EntryMode> {
        prop_oneof![
            Just(EntryMode::Regular),
            Just(EntryMode::Executable),
            Just(EntryMode::Symlink),
            Just(EntryMode::Directory),
            Just(EntryMode::Gitlink),
        ]
    }

    proptest! {
        #[test]
        fn stored_trees_decode_to_the_same_entries(
            entries in prop::collection::btree_map(
                "[a-zA-Z0-9._-]{1,12}",
                (entry_mode(), any::<[u8; 20]>()),
                0..16,
            )
        ) {
            let store = memory_store();
            let tree = Tree::unhashed(
                entries
                    .into_iter()
                    .map(|(name, (mode, raw))| TreeEntry::new(mode, name, Hash::from_raw(raw)))
                    .collect(),
            );
            let id = store.put_tree(&tree).unwrap();
            prop_assert_eq!(id, tree.compute_hash().unwrap());

            let got = store.get_tree(&id).unwrap().unwrap();
            prop_assert_eq!(got.entries, tree.entries);
        }

        #[test]
        fn stored_blobs_keep_content_and_sha1(
            content in prop::collection::vec(any::<u8>(), 0..2048),
            split in any::<prop::sample::Index>(),
        ) {
            let store = memory_store();
            let at = split.index(content.len() + 1);
            let blob = Blob::from_chunks(
                Hash::ZERO,
                vec![
                    Bytes::copy_from_slice(&content[..at]),
                    Bytes::copy_from_slice(&content[at..]),
                ],
            );
            let id = blob.git_object_id();
            store.put_blob(&id, &blob).unwrap();

            let got = store.get_blob(&id).unwrap().unwrap();
            prop_assert_eq!(&got.contents()[..], &content[..]);
            let sha1 = store.get_sha1_for_blob(&id).unwrap().unwrap();
            prop_assert!(ContentHasher::verify(&got.contents(), &sha1));
            prop_assert_eq!(sha1, ContentHasher::sha1(&content));
        }
    }
}
