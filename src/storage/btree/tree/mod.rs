//! The B+ tree index: handle, options, and descent. Mutation lives in
//! `insert` and `remove`; bulk loading and introspection in `bulk` and
//! `debug`.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::debug;

use super::codecs::{KeyCodec, KeyComparator, OrdComparator, ValCodec, MAX_KEY_SIZE};
use super::iterator::IndexIterator;
use super::page::{self, BTreePageKind, Header, InternalView, LeafView};
use super::stats::{BTreeStats, BTreeStatsSnapshot};
use crate::primitives::pager::{BufferManager, PageGuard};
use crate::storage::header::RootRegistry;
use crate::types::{IndexError, PageId, Result};

mod bulk;
mod debug;
mod insert;
mod remove;

pub use debug::TreeSummary;

/// Configuration knobs for a [`BPlusTree`].
#[derive(Clone, Debug, Default)]
pub struct BPlusTreeOptions {
    /// Largest number of entries in a leaf. Defaults to what fits in a page.
    pub leaf_max_size: Option<usize>,
    /// Largest number of children of an internal page. Defaults to what fits
    /// in a page.
    pub internal_max_size: Option<usize>,
}

/// Disk-resident B+ tree mapping unique keys to values.
///
/// Mutations take `&mut self`, so one writer at a time is enforced by the
/// borrow checker; lookups and iteration take `&self`.
pub struct BPlusTree<K, V, C = OrdComparator> {
    pub(super) name: String,
    pub(super) pool: Arc<dyn BufferManager>,
    pub(super) registry: Arc<dyn RootRegistry>,
    pub(super) root: AtomicU64,
    pub(super) comparator: C,
    pub(super) leaf_max: usize,
    pub(super) internal_max: usize,
    pub(super) stats: Arc<BTreeStats>,
    pub(super) _marker: PhantomData<(K, V)>,
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: KeyCodec,
    V: ValCodec,
    C: KeyComparator<K>,
{
    /// Opens the index called `name`, picking up its root from `registry`
    /// if one was recorded.
    pub fn open(
        name: impl Into<String>,
        pool: Arc<dyn BufferManager>,
        registry: Arc<dyn RootRegistry>,
        comparator: C,
        options: BPlusTreeOptions,
    ) -> Result<Self> {
        if K::ENCODED_LEN > MAX_KEY_SIZE {
            return Err(IndexError::Invalid("key type wider than MAX_KEY_SIZE"));
        }
        let page_size = pool.page_size();
        let leaf_slots = page::leaf_slots::<K, V>(page_size);
        let internal_slots = page::internal_slots::<K>(page_size);
        let leaf_max = options
            .leaf_max_size
            .unwrap_or_else(|| leaf_slots.saturating_sub(1));
        let internal_max = options
            .internal_max_size
            .unwrap_or_else(|| internal_slots.saturating_sub(1));
        if leaf_max < 2 || leaf_max + 1 > leaf_slots {
            return Err(IndexError::Invalid("leaf_max_size does not fit the page"));
        }
        if internal_max < 3 || internal_max + 1 > internal_slots {
            return Err(IndexError::Invalid("internal_max_size does not fit the page"));
        }
        let name = name.into();
        let root = registry.root_of(&name)?.unwrap_or(PageId::INVALID);
        debug!(index = %name, root = %root, leaf_max, internal_max, "btree.open");
        Ok(Self {
            name,
            pool,
            registry,
            root: AtomicU64::new(root.0),
            comparator,
            leaf_max,
            internal_max,
            stats: Arc::new(BTreeStats::default()),
            _marker: PhantomData,
        })
    }

    /// Name the root is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current root page, `INVALID` when the tree is empty.
    pub fn root_page_id(&self) -> PageId {
        PageId(self.root.load(AtomicOrdering::SeqCst))
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        !self.root_page_id().is_valid()
    }

    /// Leaf capacity used for new pages.
    pub fn leaf_max_size(&self) -> usize {
        self.leaf_max
    }

    /// Internal fan-out used for new pages.
    pub fn internal_max_size(&self) -> usize {
        self.internal_max
    }

    /// Access the live statistics counters for this tree.
    pub fn stats(&self) -> Arc<BTreeStats> {
        Arc::clone(&self.stats)
    }

    /// Snapshot the current statistics counters.
    pub fn stats_snapshot(&self) -> BTreeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Value stored under `key`, if any.
    pub fn get_value(&self, key: &K) -> Result<Option<V>> {
        let Some(page) = self.find_leaf_page(Some(key))? else {
            return Ok(None);
        };
        let data = page.data();
        let leaf = LeafView::<K, V>::open(&data[..])?;
        let value = leaf.lookup(key, &self.comparator)?;
        Ok(value)
    }

    /// Iterates every entry in key order.
    pub fn iter(&self) -> Result<IndexIterator<'_, K, V>> {
        let leaf = self.find_leaf_page(None)?;
        Ok(IndexIterator::new(&*self.pool, leaf, 0))
    }

    /// Iterates entries with keys `>= key` in key order.
    pub fn iter_from(&self, key: &K) -> Result<IndexIterator<'_, K, V>> {
        let Some(leaf) = self.find_leaf_page(Some(key))? else {
            return Ok(IndexIterator::new(&*self.pool, None, 0));
        };
        let index = {
            let data = leaf.data();
            let view = LeafView::<K, V>::open(&data[..])?;
            let index = view.key_index(key, &self.comparator)?;
            index
        };
        Ok(IndexIterator::new(&*self.pool, Some(leaf), index))
    }

    /// Descends to the leaf that owns `key`, or to the left-most leaf when
    /// `key` is `None`. Each child is pinned before its parent is released.
    pub(super) fn find_leaf_page(&self, key: Option<&K>) -> Result<Option<PageGuard<'_>>> {
        let root = self.root_page_id();
        if !root.is_valid() {
            return Ok(None);
        }
        let mut page = PageGuard::fetch(&*self.pool, root)?;
        loop {
            let child = {
                let data = page.data();
                let kind = Header::parse(&data)?.kind;
                match kind {
                    BTreePageKind::Leaf => None,
                    BTreePageKind::Internal => {
                        let node = InternalView::<K>::open(&data[..])?;
                        Some(match key {
                            Some(key) => node.lookup(key, &self.comparator)?,
                            None => node.value_at(0)?,
                        })
                    }
                }
            };
            match child {
                None => {
                    self.stats.inc_leaf_searches();
                    return Ok(Some(page));
                }
                Some(child) => {
                    self.stats.inc_internal_searches();
                    let next = PageGuard::fetch(&*self.pool, child)?;
                    page = next;
                }
            }
        }
    }

    /// Publishes a new root to the registry and then to the handle.
    ///
    /// The registry may need a free frame to reach its page, so callers
    /// release their own pins first. If the registry write fails the handle
    /// keeps its old root.
    pub(super) fn set_root(&self, root: PageId) -> Result<()> {
        if !self.registry.update_record(&self.name, root)? {
            self.registry.insert_record(&self.name, root)?;
        }
        let old = PageId(self.root.swap(root.0, AtomicOrdering::SeqCst));
        self.stats.inc_root_changes();
        debug!(index = %self.name, old = %old, new = %root, "btree.root_changed");
        Ok(())
    }

    /// Unpins and deletes a page the tree no longer references.
    pub(super) fn discard(&self, page: PageGuard<'_>) -> Result<()> {
        let id = page.id();
        drop(page);
        self.discard_unpinned(id)
    }

    /// Deletes a page whose guard has already been dropped.
    pub(super) fn discard_unpinned(&self, id: PageId) -> Result<()> {
        if !self.pool.delete_page(id)? {
            return Err(IndexError::Corruption("discarded page is still pinned"));
        }
        debug!(page = id.0, "btree.page_discarded");
        Ok(())
    }
}
