//! Content-addressed local object store.
//!
//! [`LocalStore`] maps 20-byte [`Hash`] ids to git-encoded trees and blobs
//! held in a key-value engine, and records the SHA-1 of every blob's content
//! next to it.
//!
//! # Key Layout
//!
//! | Record | Key | Value |
//! |---|---|---|
//! | Tree / blob | raw hash (20 bytes) | git object bytes |
//! | Blob content SHA-1 | raw hash + `b's'` (21 bytes) | 20 raw SHA-1 bytes |
//!
//! Primary and attribute keys differ in length, so they never collide.
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; the store exposes no delete.
//! 2. A blob and its SHA-1 attribute are written in one atomic batch.
//! 3. "Not found" is a successful, empty result, never an error.
//! 4. Engine and codec errors propagate unchanged; nothing is retried.
//! 5. The store caches nothing; every call is one engine request or batch.

pub mod config;
pub mod error;
pub mod keys;
pub mod result;
pub mod store;

pub use cask_codec::{Blob, EntryMode, Tree, TreeEntry};
pub use cask_types::Hash;
pub use config::{EngineKind, StoreConfig, SyncPolicy};
pub use error::{Result, StoreError};
pub use keys::{attribute_key, primary_key, AttributeKey, AttributeTag, DecodedKey};
pub use result::StoreResult;
pub use store::LocalStore;
