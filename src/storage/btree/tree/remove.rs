use tracing::trace;

use super::BPlusTree;
use crate::primitives::pager::PageGuard;
use crate::storage::btree::codecs::{KeyCodec, KeyComparator, ValCodec};
use crate::storage::btree::page::{
    min_size_for, set_parent, BTreePageKind, Header, InternalMut, InternalView, LeafMut, LeafView,
};
use crate::types::{IndexError, PageId, Result};

impl<K, V, C> BPlusTree<K, V, C>
where
    K: KeyCodec,
    V: ValCodec,
    C: KeyComparator<K>,
{
    /// Removes `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &K) -> Result<bool> {
        let Some(mut leaf_page) = self.find_leaf_page(Some(key))? else {
            return Ok(false);
        };
        let present = {
            let data = leaf_page.data();
            let leaf = LeafView::<K, V>::open(&data[..])?;
            let present = leaf.lookup(key, &self.comparator)?.is_some();
            present
        };
        if !present {
            return Ok(false);
        }
        {
            let mut data = leaf_page.data_mut();
            LeafMut::<K, V>::open(&mut data[..])?.remove(key, &self.comparator)?;
        }
        self.coalesce_or_redistribute(leaf_page)?;
        Ok(true)
    }

    /// Restores the size invariant after `node` lost an entry, merging or
    /// borrowing from a sibling and walking up while parents underflow.
    fn coalesce_or_redistribute<'a>(&'a self, mut node: PageGuard<'a>) -> Result<()> {
        loop {
            let header = Header::parse(&node.data())?;
            if !header.parent.is_valid() {
                return self.adjust_root(node, &header);
            }
            if header.size >= min_size_for(header.max_size) {
                return Ok(());
            }

            let mut parent = PageGuard::fetch(&*self.pool, header.parent)?;
            let (index, sibling_id) = {
                let data = parent.data();
                let view = InternalView::<K>::open(&data[..])?;
                let index = view
                    .value_index(node.id())
                    .ok_or(IndexError::Corruption("child missing from parent"))?;
                let sibling_index = if index == 0 { 1 } else { index - 1 };
                (index, view.value_at(sibling_index)?)
            };
            let sibling = PageGuard::fetch(&*self.pool, sibling_id)?;
            let sibling_size = Header::parse(&sibling.data())?.size;

            if sibling_size + header.size <= header.max_size {
                // merge the right page of the pair into the left one
                let (left, right, right_index) = if index == 0 {
                    (node, sibling, 1)
                } else {
                    (sibling, node, index)
                };
                self.coalesce(left, right, &mut parent, right_index, header.kind)?;
                node = parent;
                continue;
            }

            self.redistribute(sibling, node, &mut parent, index, header.kind)?;
            return Ok(());
        }
    }

    /// Moves every entry of `right` into `left`, deletes `right`, and drops
    /// its entry at `right_index` from `parent`.
    fn coalesce<'a>(
        &'a self,
        mut left: PageGuard<'a>,
        mut right: PageGuard<'a>,
        parent: &mut PageGuard<'a>,
        right_index: usize,
        kind: BTreePageKind,
    ) -> Result<()> {
        match kind {
            BTreePageKind::Leaf => {
                let mut left_data = left.data_mut();
                let mut right_data = right.data_mut();
                let mut recipient = LeafMut::<K, V>::open(&mut left_data[..])?;
                LeafMut::<K, V>::open(&mut right_data[..])?.move_all_to(&mut recipient)?;
                self.stats.inc_leaf_merges();
            }
            BTreePageKind::Internal => {
                let middle_key = self.separator_at(parent, right_index)?;
                let mut left_data = left.data_mut();
                let mut right_data = right.data_mut();
                let mut recipient = InternalMut::<K>::open(&mut left_data[..])?;
                InternalMut::<K>::open(&mut right_data[..])?.move_all_to(
                    &mut recipient,
                    &middle_key,
                    &*self.pool,
                )?;
                self.stats.inc_internal_merges();
            }
        }
        trace!(left = left.id().0, right = right.id().0, "btree.coalesce");
        InternalMut::<K>::open(&mut parent.data_mut()[..])?.remove(right_index)?;
        drop(left);
        self.discard(right)
    }

    /// Borrows one entry from `sibling` into `node`, where `index` is
    /// `node`'s position in `parent`, and fixes the separator between them.
    fn redistribute<'a>(
        &'a self,
        mut sibling: PageGuard<'a>,
        mut node: PageGuard<'a>,
        parent: &mut PageGuard<'a>,
        index: usize,
        kind: BTreePageKind,
    ) -> Result<()> {
        // node is the left-most child: borrow from the right, else from the left
        let separator_index = if index == 0 { 1 } else { index };
        let separator = match kind {
            BTreePageKind::Leaf => {
                let mut sibling_data = sibling.data_mut();
                let mut node_data = node.data_mut();
                let mut donor = LeafMut::<K, V>::open(&mut sibling_data[..])?;
                let mut recipient = LeafMut::<K, V>::open(&mut node_data[..])?;
                let separator = if index == 0 {
                    donor.move_first_to_end_of(&mut recipient)?
                } else {
                    donor.move_last_to_front_of(&mut recipient)?
                };
                self.stats.inc_leaf_redistributions();
                separator
            }
            BTreePageKind::Internal => {
                let middle_key = self.separator_at(parent, separator_index)?;
                let mut sibling_data = sibling.data_mut();
                let mut node_data = node.data_mut();
                let mut donor = InternalMut::<K>::open(&mut sibling_data[..])?;
                let mut recipient = InternalMut::<K>::open(&mut node_data[..])?;
                let separator = if index == 0 {
                    donor.move_first_to_end_of(&mut recipient, &middle_key, &*self.pool)?
                } else {
                    donor.move_last_to_front_of(&mut recipient, &middle_key, &*self.pool)?
                };
                self.stats.inc_internal_redistributions();
                separator
            }
        };
        InternalMut::<K>::open(&mut parent.data_mut()[..])?.set_key_at(separator_index, &separator)?;
        trace!(node = node.id().0, donor = sibling.id().0, "btree.redistribute");
        Ok(())
    }

    /// Handles the root after a removal: an internal root left with one
    /// child hands the root role to it, and an empty leaf root empties the
    /// tree. Either way the old root page is deleted once the registry
    /// names its replacement. No page stays pinned while the registry is
    /// written.
    fn adjust_root<'a>(&'a self, mut root: PageGuard<'a>, header: &Header) -> Result<()> {
        let root_id = root.id();
        match header.kind {
            BTreePageKind::Internal if header.size == 1 => {
                let child = InternalMut::<K>::open(&mut root.data_mut()[..])?
                    .remove_and_return_only_child()?;
                {
                    let mut child_page = PageGuard::fetch(&*self.pool, child)?;
                    set_parent(&mut child_page.data_mut(), PageId::INVALID);
                }
                drop(root);
                self.set_root(child)?;
                self.discard_unpinned(root_id)
            }
            BTreePageKind::Leaf if header.size == 0 => {
                drop(root);
                self.set_root(PageId::INVALID)?;
                self.discard_unpinned(root_id)
            }
            _ => Ok(()),
        }
    }

    fn separator_at(&self, parent: &PageGuard<'_>, index: usize) -> Result<K> {
        let data = parent.data();
        let view = InternalView::<K>::open(&data[..])?;
        let key = view.key_at(index)?;
        Ok(key)
    }
}
