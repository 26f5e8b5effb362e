#![forbid(unsafe_code)]

//! Paged B+ tree index with unique keys, built on the buffer pool.

/// Encoding and decoding utilities for keys and values.
pub mod codecs;

/// B+ tree page format and operations.
pub mod page;
mod iterator;
mod stats;
mod tree;

pub use codecs::{
    FnComparator, FromInteger, GenericComparator, GenericKey, KeyCodec, KeyComparator,
    OrdComparator, RecordId, ValCodec, MAX_KEY_SIZE,
};
pub use iterator::IndexIterator;
pub use stats::{BTreeStats, BTreeStatsSnapshot};
pub use tree::{BPlusTree, BPlusTreeOptions, TreeSummary};
