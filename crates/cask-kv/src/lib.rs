//! Key-value engines for the Cask object store.
//!
//! The object store does not implement storage itself; it drives any engine
//! that implements [`KvEngine`]:
//!
//! - [`InMemoryEngine`] -- `BTreeMap`-based engine for tests and embedding
//! - [`LogEngine`] -- append-only, CRC-framed log file with an in-memory index
//!
//! # Engine Contract
//!
//! 1. `get` distinguishes "not found" (`Ok(None)`) from failure (`Err`).
//! 2. `write_batch` is atomic: readers see every entry of a batch or none.
//! 3. Engines are `Send + Sync`; callers may share one across threads.

pub mod batch;
pub mod error;
pub mod log;
pub mod memory;
pub mod traits;

pub use batch::{BatchEntry, WriteBatch};
pub use error::{EngineError, Result};
pub use log::{LogConfig, LogEngine, SyncMode};
pub use memory::InMemoryEngine;
pub use traits::KvEngine;
