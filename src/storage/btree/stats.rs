use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Snapshot of B+ tree statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeStatsSnapshot {
    /// Leaf pages consulted by point lookups and descents
    pub leaf_searches: u64,
    /// Internal pages routed through on the way down
    pub internal_searches: u64,
    /// Leaf page splits
    pub leaf_splits: u64,
    /// Internal page splits
    pub internal_splits: u64,
    /// Leaf pages merged into a sibling
    pub leaf_merges: u64,
    /// Internal pages merged into a sibling
    pub internal_merges: u64,
    /// Entries borrowed between sibling leaves
    pub leaf_redistributions: u64,
    /// Children borrowed between sibling internal pages
    pub internal_redistributions: u64,
    /// Times the root page id changed
    pub root_changes: u64,
}

/// Thread-safe statistics tracking for B+ tree operations.
#[derive(Default, Debug)]
pub struct BTreeStats {
    leaf_searches: AtomicU64,
    internal_searches: AtomicU64,
    leaf_splits: AtomicU64,
    internal_splits: AtomicU64,
    leaf_merges: AtomicU64,
    internal_merges: AtomicU64,
    leaf_redistributions: AtomicU64,
    internal_redistributions: AtomicU64,
    root_changes: AtomicU64,
}

impl BTreeStats {
    /// Returns the current count of leaf page searches.
    pub fn leaf_searches(&self) -> u64 {
        self.leaf_searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of internal page searches.
    pub fn internal_searches(&self) -> u64 {
        self.internal_searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of leaf page splits.
    pub fn leaf_splits(&self) -> u64 {
        self.leaf_splits.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of internal page splits.
    pub fn internal_splits(&self) -> u64 {
        self.internal_splits.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of leaf page merges.
    pub fn leaf_merges(&self) -> u64 {
        self.leaf_merges.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of internal page merges.
    pub fn internal_merges(&self) -> u64 {
        self.internal_merges.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of leaf redistributions.
    pub fn leaf_redistributions(&self) -> u64 {
        self.leaf_redistributions.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of internal redistributions.
    pub fn internal_redistributions(&self) -> u64 {
        self.internal_redistributions.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of root changes.
    pub fn root_changes(&self) -> u64 {
        self.root_changes.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn inc_leaf_searches(&self) {
        self.leaf_searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_searches(&self) {
        self.internal_searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_splits(&self) {
        self.leaf_splits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_splits(&self) {
        self.internal_splits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_merges(&self) {
        self.leaf_merges.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_merges(&self) {
        self.internal_merges.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_redistributions(&self) {
        self.leaf_redistributions
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_redistributions(&self) {
        self.internal_redistributions
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_root_changes(&self) {
        self.root_changes.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Creates a snapshot of all current statistics.
    pub fn snapshot(&self) -> BTreeStatsSnapshot {
        BTreeStatsSnapshot {
            leaf_searches: self.leaf_searches(),
            internal_searches: self.internal_searches(),
            leaf_splits: self.leaf_splits(),
            internal_splits: self.internal_splits(),
            leaf_merges: self.leaf_merges(),
            internal_merges: self.internal_merges(),
            leaf_redistributions: self.leaf_redistributions(),
            internal_redistributions: self.internal_redistributions(),
            root_changes: self.root_changes(),
        }
    }

    /// Emits current statistics to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "pageindex::btree::stats",
            leaf_searches = snapshot.leaf_searches,
            internal_searches = snapshot.internal_searches,
            leaf_splits = snapshot.leaf_splits,
            internal_splits = snapshot.internal_splits,
            leaf_merges = snapshot.leaf_merges,
            internal_merges = snapshot.internal_merges,
            leaf_redistributions = snapshot.leaf_redistributions,
            internal_redistributions = snapshot.internal_redistributions,
            root_changes = snapshot.root_changes,
            "btree stats snapshot"
        );
    }
}
