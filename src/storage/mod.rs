//! Index structures stored in buffer pool pages.

/// Paged B+ tree index.
///
/// Leaves hold sorted `(key, value)` entries linked left to right; internal
/// pages route searches by separator keys.
pub mod btree;

/// Registry page mapping index names to their root page ids.
pub mod header;
