use std::sync::atomic::Ordering as AtomicOrdering;

use smallvec::SmallVec;
use tracing::{trace, warn};

use super::BPlusTree;
use crate::primitives::pager::PageGuard;
use crate::storage::btree::codecs::{KeyCodec, KeyComparator, ValCodec};
use crate::storage::btree::page::{set_parent, Header, InternalMut, InternalView, LeafMut, LeafView};
use crate::types::{IndexError, PageId, Result};

/// Fresh pages set aside before a split so it cannot fail half way.
type Reserved<'a> = SmallVec<[PageGuard<'a>; 4]>;

impl<K, V, C> BPlusTree<K, V, C>
where
    K: KeyCodec,
    V: ValCodec,
    C: KeyComparator<K>,
{
    /// Inserts `key -> value`. Returns false, leaving the tree untouched, if
    /// `key` is already present.
    ///
    /// Every page a split cascade needs is allocated before anything is
    /// modified; if the pool cannot provide them the call fails with
    /// [`IndexError::OutOfMemory`] and the tree is unchanged.
    pub fn insert(&mut self, key: &K, value: &V) -> Result<bool> {
        let Some(mut leaf_page) = self.find_leaf_page(Some(key))? else {
            self.start_new_tree(key, value)?;
            return Ok(true);
        };
        let (exists, size, max_size, parent) = {
            let data = leaf_page.data();
            let leaf = LeafView::<K, V>::open(&data[..])?;
            let exists = leaf.lookup(key, &self.comparator)?.is_some();
            (exists, leaf.size(), leaf.max_size(), leaf.parent_page_id())
        };
        if exists {
            return Ok(false);
        }
        if size < max_size {
            let mut data = leaf_page.data_mut();
            LeafMut::<K, V>::open(&mut data[..])?.insert(key, value, &self.comparator)?;
            return Ok(true);
        }

        let needed = self.pages_needed_for_split(parent)?;
        let mut reserved = self.reserve_pages(needed)?;
        reserved.reverse();

        let sibling_page = reserved
            .pop()
            .ok_or(IndexError::Corruption("split reservation exhausted"))?;
        let (leaf_page, separator, sibling_page) = self.split_leaf(leaf_page, sibling_page, key, value)?;
        self.stats.inc_leaf_splits();
        self.insert_into_parent(leaf_page, separator, sibling_page, &mut reserved)?;
        for unused in reserved {
            self.discard(unused)?;
        }
        Ok(true)
    }

    fn start_new_tree(&self, key: &K, value: &V) -> Result<()> {
        let mut page = PageGuard::allocate(&*self.pool)?;
        let root_id = page.id();
        {
            let mut data = page.data_mut();
            let mut leaf = LeafMut::<K, V>::init(&mut data[..], root_id, PageId::INVALID, self.leaf_max)?;
            leaf.insert(key, value, &self.comparator)?;
        }
        // the registry may need this frame to reach its own page
        drop(page);
        let registered = match self.registry.insert_record(&self.name, root_id) {
            Ok(true) => Ok(true),
            Ok(false) => self.registry.update_record(&self.name, root_id),
            Err(err) => Err(err),
        };
        if let Err(err) = registered {
            if let Err(release) = self.discard_unpinned(root_id) {
                warn!(page = root_id.0, error = %release, "btree.new_root_release_failed");
            }
            return Err(err);
        }
        self.root.store(root_id.0, AtomicOrdering::SeqCst);
        self.stats.inc_root_changes();
        trace!(index = %self.name, root = root_id.0, "btree.start_new_tree");
        Ok(())
    }

    /// Counts the pages a split starting at a full leaf whose parent is
    /// `parent` will allocate: one sibling per full level plus a new root
    /// when every ancestor is full.
    fn pages_needed_for_split(&self, mut parent: PageId) -> Result<usize> {
        let mut needed = 1;
        while parent.is_valid() {
            let page = PageGuard::fetch(&*self.pool, parent)?;
            let data = page.data();
            let node = InternalView::<K>::open(&data[..])?;
            if node.size() < node.max_size() {
                return Ok(needed);
            }
            needed += 1;
            parent = node.parent_page_id();
        }
        Ok(needed + 1)
    }

    fn reserve_pages(&self, count: usize) -> Result<Reserved<'_>> {
        let mut pages = Reserved::new();
        for _ in 0..count {
            match PageGuard::allocate(&*self.pool) {
                Ok(page) => pages.push(page),
                Err(err) => {
                    for page in pages.drain(..) {
                        let id = page.id();
                        if let Err(release) = page.delete() {
                            warn!(page = id.0, error = %release, "btree.reserve_release_failed");
                        }
                    }
                    warn!(index = %self.name, needed = count, error = %err, "btree.split_reservation_failed");
                    return Err(err);
                }
            }
        }
        Ok(pages)
    }

    /// Inserts into a full leaf and moves its upper half into `sibling`,
    /// which is linked in right after it. Returns the sibling's first key.
    fn split_leaf<'a>(
        &self,
        mut leaf_page: PageGuard<'a>,
        mut sibling_page: PageGuard<'a>,
        key: &K,
        value: &V,
    ) -> Result<(PageGuard<'a>, K, PageGuard<'a>)> {
        let sibling_id = sibling_page.id();
        let separator = {
            let mut leaf_data = leaf_page.data_mut();
            let mut leaf = LeafMut::<K, V>::open(&mut leaf_data[..])?;
            leaf.insert(key, value, &self.comparator)?;
            let mut sibling_data = sibling_page.data_mut();
            let mut sibling = LeafMut::<K, V>::init(
                &mut sibling_data[..],
                sibling_id,
                leaf.parent_page_id(),
                self.leaf_max,
            )?;
            leaf.move_half_to(&mut sibling)?;
            sibling.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(sibling_id);
            let separator = sibling.key_at(0)?;
            separator
        };
        trace!(left = leaf_page.id().0, right = sibling_id.0, "btree.leaf_split");
        Ok((leaf_page, separator, sibling_page))
    }

    /// Links `new` into the parent of `old` under `key`, splitting parents
    /// upward for as long as they overflow.
    fn insert_into_parent<'a>(
        &'a self,
        mut old: PageGuard<'a>,
        mut key: K,
        mut new: PageGuard<'a>,
        reserved: &mut Reserved<'a>,
    ) -> Result<()> {
        loop {
            let parent_id = Header::parse(&old.data())?.parent;
            if !parent_id.is_valid() {
                let mut root = reserved
                    .pop()
                    .ok_or(IndexError::Corruption("split reservation exhausted"))?;
                let root_id = root.id();
                {
                    let mut data = root.data_mut();
                    let mut node = InternalMut::<K>::init(
                        &mut data[..],
                        root_id,
                        PageId::INVALID,
                        self.internal_max,
                    )?;
                    node.populate_new_root(old.id(), &key, new.id());
                }
                set_parent(&mut old.data_mut(), root_id);
                set_parent(&mut new.data_mut(), root_id);
                drop(root);
                drop(new);
                drop(old);
                for unused in reserved.drain(..) {
                    self.discard(unused)?;
                }
                return self.set_root(root_id);
            }

            let (old_id, new_id) = (old.id(), new.id());
            drop(new);
            drop(old);
            let mut parent = PageGuard::fetch(&*self.pool, parent_id)?;
            let size = {
                let mut data = parent.data_mut();
                let mut node = InternalMut::<K>::open(&mut data[..])?;
                let size = node.insert_node_after(old_id, &key, new_id)?;
                if size <= node.max_size() {
                    return Ok(());
                }
                size
            };

            let mut sibling = reserved
                .pop()
                .ok_or(IndexError::Corruption("split reservation exhausted"))?;
            let sibling_id = sibling.id();
            let separator = {
                let mut parent_data = parent.data_mut();
                let mut node = InternalMut::<K>::open(&mut parent_data[..])?;
                let mut sibling_data = sibling.data_mut();
                let mut split = InternalMut::<K>::init(
                    &mut sibling_data[..],
                    sibling_id,
                    node.parent_page_id(),
                    self.internal_max,
                )?;
                node.move_half_to(&mut split, &*self.pool)?;
                let separator = split.key_at(0)?;
                separator
            };
            self.stats.inc_internal_splits();
            trace!(left = parent_id.0, right = sibling_id.0, size, "btree.internal_split");
            old = parent;
            new = sibling;
            key = separator;
        }
    }
}
