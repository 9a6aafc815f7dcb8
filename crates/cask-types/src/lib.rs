//! Foundation types for the Cask object store.
//!
//! Every other Cask crate depends on `cask-types` for [`Hash`], the fixed-size
//! identifier used both as a primary key and as a content checksum.

pub mod error;
pub mod hash;

pub use error::TypeError;
pub use hash::Hash;
