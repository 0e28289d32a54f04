//! # Cache System
//!
//! Disk-backed storage of fetched URL content: key derivation, the
//! in-memory index of the cache root and the fetch-on-miss facade.

mod disk;
pub mod index;
pub mod key;

pub use disk::UrlDiskCache;
pub use index::CacheIndex;
pub use key::{derive_key, derive_path};
