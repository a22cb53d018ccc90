//! Local cache partitions for offline access.
//!
//! This module provides the `CacheManager` for storing and retrieving
//! responses in named, versioned partitions, on top of a `CacheStorage`
//! backend supplied by the host:
//! - `MemoryStorage`: in-process, used by tests and embedded hosts
//! - `DiskStorage`: one JSON file per entry under a cache directory
//!
//! Partitions are never compacted or evicted by size. A partition goes
//! away only when its version tag is superseded or the cache is cleared.

pub mod disk;
pub mod manager;
pub mod storage;

pub use disk::{CachedEntry, DiskStorage};
pub use manager::CacheManager;
pub use storage::{CacheStorage, MemoryStorage};
