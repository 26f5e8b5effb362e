//! Low-level primitives for building the index.
//!
//! Includes the page table hash, disk I/O, and the buffer pool.

/// Extendible hash table.
///
/// Directory of buckets that doubles on overflow; serves as the buffer
/// pool's page table.
pub mod hash;

/// Disk managers.
///
/// Fixed-size page storage in memory or in a single file.
pub mod io;

/// Buffer pool.
///
/// Caches disk pages in frames with pin counts and LRU eviction.
pub mod pager;
