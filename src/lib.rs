//! Disk-oriented B+ tree index over a fixed-size buffer pool.
//!
//! Pages live on a [`DiskManager`](primitives::io::DiskManager) and are
//! cached by a [`BufferPool`](primitives::pager::BufferPool), whose page
//! table is an [`ExtendibleHash`](primitives::hash::ExtendibleHash). The
//! [`BPlusTree`](storage::btree::BPlusTree) stores unique keys in those
//! pages and records its root in a [`HeaderPage`](storage::header::HeaderPage).

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;

pub use primitives::hash::ExtendibleHash;
pub use primitives::io::{DiskManager, FileDisk, MemDisk};
pub use primitives::pager::{BufferManager, BufferPool, BufferPoolOptions, PageGuard};
pub use storage::btree::{BPlusTree, BPlusTreeOptions, GenericComparator, GenericKey, RecordId};
pub use storage::header::{HeaderPage, RootRegistry};
pub use types::{IndexError, PageId, Result};
