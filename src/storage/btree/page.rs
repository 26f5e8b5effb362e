//! Fixed-layout leaf and internal page views.
//!
//! Every tree page starts with a 40-byte header (big-endian):
//!
//! | offset | field              |
//! |--------|--------------------|
//! | 0      | kind `u8`          |
//! | 4      | size `u32`         |
//! | 8      | max size `u32`     |
//! | 16     | page id `u64`      |
//! | 24     | parent id `u64`    |
//! | 32     | next leaf id `u64` |
//!
//! followed by fixed-width entries. Leaf entries are `key || value`; internal
//! entries are `key || child:u64`, and the key of internal entry 0 is unused.
//! A page has room for `max_size + 1` entries so an insert may overflow it
//! before the tree splits it.

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::primitives::pager::{BufferManager, PageGuard};
use crate::storage::btree::codecs::{KeyCodec, KeyComparator, ValCodec};
use crate::types::{IndexError, PageId, Result};

/// Bytes taken by the common page header.
pub const HEADER_LEN: usize = 40;

const KIND_OFFSET: usize = 0;
const SIZE_OFFSET: usize = 4;
const MAX_SIZE_OFFSET: usize = 8;
const PAGE_ID_OFFSET: usize = 16;
const PARENT_OFFSET: usize = 24;
const NEXT_OFFSET: usize = 32;
const CHILD_LEN: usize = 8;

/// Read-only leaf view over latched page bytes.
pub type LeafView<'p, K, V> = LeafPage<&'p [u8], K, V>;
/// Mutable leaf view over latched page bytes.
pub type LeafMut<'p, K, V> = LeafPage<&'p mut [u8], K, V>;
/// Read-only internal view over latched page bytes.
pub type InternalView<'p, K> = InternalPage<&'p [u8], K>;
/// Mutable internal view over latched page bytes.
pub type InternalMut<'p, K> = InternalPage<&'p mut [u8], K>;

/// Logical kind of a tree page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BTreePageKind {
    /// Holds key/value entries and a link to the next leaf.
    Leaf = 1,
    /// Holds separator keys and child page ids.
    Internal = 2,
}

impl BTreePageKind {
    /// Converts the on-page tag.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Leaf),
            2 => Ok(Self::Internal),
            _ => Err(IndexError::Corruption("unknown btree page kind")),
        }
    }
}

/// Header fields shared by both page kinds.
#[derive(Clone, Debug)]
pub struct Header {
    /// Page kind.
    pub kind: BTreePageKind,
    /// Entries (leaf) or children (internal).
    pub size: usize,
    /// Largest size allowed between operations.
    pub max_size: usize,
    /// Id the page was initialised with.
    pub page_id: PageId,
    /// Parent page, `INVALID` for the root.
    pub parent: PageId,
}

impl Header {
    /// Decodes the header from `page`.
    pub fn parse(page: &[u8]) -> Result<Self> {
        if page.len() < HEADER_LEN {
            return Err(IndexError::Corruption("page shorter than btree header"));
        }
        let header = Self {
            kind: BTreePageKind::from_u8(page[KIND_OFFSET])?,
            size: read_u32(page, SIZE_OFFSET) as usize,
            max_size: read_u32(page, MAX_SIZE_OFFSET) as usize,
            page_id: read_page_id(page, PAGE_ID_OFFSET),
            parent: read_page_id(page, PARENT_OFFSET),
        };
        if header.size > header.max_size + 1 {
            return Err(IndexError::Corruption("btree page size exceeds max size"));
        }
        Ok(header)
    }
}

/// Rewrites the parent link of any tree page.
pub fn set_parent(page: &mut [u8], parent: PageId) {
    write_u64(page, PARENT_OFFSET, parent.0);
}

/// Number of entry slots a leaf page of `page_size` bytes has.
pub fn leaf_slots<K: KeyCodec, V: ValCodec>(page_size: usize) -> usize {
    page_size.saturating_sub(HEADER_LEN) / (K::ENCODED_LEN + V::ENCODED_LEN)
}

/// Number of entry slots an internal page of `page_size` bytes has.
pub fn internal_slots<K: KeyCodec>(page_size: usize) -> usize {
    page_size.saturating_sub(HEADER_LEN) / (K::ENCODED_LEN + CHILD_LEN)
}

/// Smallest size a non-root page may shrink to: `ceil(max_size / 2)`.
pub const fn min_size_for(max_size: usize) -> usize {
    (max_size + 1) / 2
}

fn read_u32(page: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&page[offset..offset + 4]);
    u32::from_be_bytes(raw)
}

fn read_page_id(page: &[u8], offset: usize) -> PageId {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&page[offset..offset + 8]);
    PageId(u64::from_be_bytes(raw))
}

fn write_u32(page: &mut [u8], offset: usize, value: u32) {
    page[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn write_u64(page: &mut [u8], offset: usize, value: u64) {
    page[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
}

fn init_header(page: &mut [u8], kind: BTreePageKind, page_id: PageId, parent: PageId, max_size: usize) {
    page[..HEADER_LEN].fill(0);
    page[KIND_OFFSET] = kind as u8;
    write_u32(page, SIZE_OFFSET, 0);
    write_u32(page, MAX_SIZE_OFFSET, max_size as u32);
    write_u64(page, PAGE_ID_OFFSET, page_id.0);
    write_u64(page, PARENT_OFFSET, parent.0);
    write_u64(page, NEXT_OFFSET, PageId::INVALID.0);
}

fn open_checked(page: &[u8], kind: BTreePageKind, slots: usize) -> Result<()> {
    let header = Header::parse(page)?;
    if header.kind != kind {
        return Err(IndexError::Corruption("unexpected btree page kind"));
    }
    if header.max_size + 1 > slots {
        return Err(IndexError::Corruption("btree max size exceeds page capacity"));
    }
    Ok(())
}

/// Repoints `child`'s parent link at `parent`.
fn adopt(pool: &dyn BufferManager, child: PageId, parent: PageId) -> Result<()> {
    let mut page = PageGuard::fetch(pool, child)?;
    set_parent(&mut page.data_mut(), parent);
    Ok(())
}

/// Typed view over a leaf page's bytes.
pub struct LeafPage<B, K, V> {
    buf: B,
    _marker: PhantomData<(K, V)>,
}

impl<B: AsRef<[u8]>, K: KeyCodec, V: ValCodec> LeafPage<B, K, V> {
    const ENTRY_LEN: usize = K::ENCODED_LEN + V::ENCODED_LEN;

    /// Wraps an initialised leaf page, validating its header.
    pub fn open(buf: B) -> Result<Self> {
        let page = buf.as_ref();
        open_checked(page, BTreePageKind::Leaf, Self::slots_in(page.len()))?;
        Ok(Self {
            buf,
            _marker: PhantomData,
        })
    }

    fn slots_in(len: usize) -> usize {
        len.saturating_sub(HEADER_LEN) / Self::ENTRY_LEN
    }

    fn bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    fn entry_offset(index: usize) -> usize {
        HEADER_LEN + index * Self::ENTRY_LEN
    }

    /// Id stored in the header.
    pub fn page_id(&self) -> PageId {
        read_page_id(self.bytes(), PAGE_ID_OFFSET)
    }

    /// Parent page, `INVALID` for the root.
    pub fn parent_page_id(&self) -> PageId {
        read_page_id(self.bytes(), PARENT_OFFSET)
    }

    /// Next leaf in key order, `INVALID` for the right-most leaf.
    pub fn next_page_id(&self) -> PageId {
        read_page_id(self.bytes(), NEXT_OFFSET)
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        read_u32(self.bytes(), SIZE_OFFSET) as usize
    }

    /// Largest size allowed between operations.
    pub fn max_size(&self) -> usize {
        read_u32(self.bytes(), MAX_SIZE_OFFSET) as usize
    }

    /// Smallest size allowed for a non-root leaf.
    pub fn min_size(&self) -> usize {
        min_size_for(self.max_size())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.size() {
            return Err(IndexError::Corruption("leaf entry index out of range"));
        }
        Ok(())
    }

    /// Key of entry `index`.
    pub fn key_at(&self, index: usize) -> Result<K> {
        self.check_index(index)?;
        let off = Self::entry_offset(index);
        K::decode_key(&self.bytes()[off..off + K::ENCODED_LEN])
    }

    /// Value of entry `index`.
    pub fn value_at(&self, index: usize) -> Result<V> {
        self.check_index(index)?;
        let off = Self::entry_offset(index) + K::ENCODED_LEN;
        V::decode_val(&self.bytes()[off..off + V::ENCODED_LEN])
    }

    /// Entry `index` as a pair.
    pub fn item(&self, index: usize) -> Result<(K, V)> {
        Ok((self.key_at(index)?, self.value_at(index)?))
    }

    /// First index whose key is `>= key`; `size()` if there is none.
    pub fn key_index<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Result<usize> {
        let (mut lo, mut hi) = (0, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(&self.key_at(mid)?, key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Value stored under `key`.
    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Result<Option<V>> {
        let index = self.key_index(key, cmp)?;
        if index < self.size() && cmp.compare(&self.key_at(index)?, key) == Ordering::Equal {
            return self.value_at(index).map(Some);
        }
        Ok(None)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: KeyCodec, V: ValCodec> LeafPage<B, K, V> {
    /// Formats `buf` as an empty leaf.
    pub fn init(mut buf: B, page_id: PageId, parent: PageId, max_size: usize) -> Result<Self> {
        let page = buf.as_mut();
        if max_size < 2 || max_size + 1 > Self::slots_in(page.len()) {
            return Err(IndexError::Invalid("leaf max size does not fit the page"));
        }
        init_header(page, BTreePageKind::Leaf, page_id, parent, max_size);
        Ok(Self {
            buf,
            _marker: PhantomData,
        })
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    fn set_size(&mut self, size: usize) {
        write_u32(self.bytes_mut(), SIZE_OFFSET, size as u32);
    }

    /// Sets the parent link.
    pub fn set_parent_page_id(&mut self, parent: PageId) {
        set_parent(self.bytes_mut(), parent);
    }

    /// Sets the next-leaf link.
    pub fn set_next_page_id(&mut self, next: PageId) {
        write_u64(self.bytes_mut(), NEXT_OFFSET, next.0);
    }

    fn write_entry(&mut self, index: usize, key: &K, value: &V) {
        let off = Self::entry_offset(index);
        let page = self.bytes_mut();
        K::encode_key(key, &mut page[off..off + K::ENCODED_LEN]);
        V::encode_val(value, &mut page[off + K::ENCODED_LEN..off + Self::ENTRY_LEN]);
    }

    /// Inserts `(key, value)` in order. Returns the new size, or the
    /// unchanged size if `key` is already present.
    pub fn insert<C: KeyComparator<K>>(&mut self, key: &K, value: &V, cmp: &C) -> Result<usize> {
        let size = self.size();
        let index = self.key_index(key, cmp)?;
        if index < size && cmp.compare(&self.key_at(index)?, key) == Ordering::Equal {
            return Ok(size);
        }
        if size > self.max_size() {
            return Err(IndexError::Corruption("leaf page already overflowing"));
        }
        let start = Self::entry_offset(index);
        let end = Self::entry_offset(size);
        self.bytes_mut().copy_within(start..end, start + Self::ENTRY_LEN);
        self.write_entry(index, key, value);
        self.set_size(size + 1);
        Ok(size + 1)
    }

    /// Removes `key` if present. Returns the new size.
    pub fn remove<C: KeyComparator<K>>(&mut self, key: &K, cmp: &C) -> Result<usize> {
        let size = self.size();
        let index = self.key_index(key, cmp)?;
        if index == size || cmp.compare(&self.key_at(index)?, key) != Ordering::Equal {
            return Ok(size);
        }
        self.remove_at(index);
        Ok(size - 1)
    }

    fn remove_at(&mut self, index: usize) {
        let size = self.size();
        let start = Self::entry_offset(index + 1);
        let end = Self::entry_offset(size);
        self.bytes_mut()
            .copy_within(start..end, start - Self::ENTRY_LEN);
        self.set_size(size - 1);
    }

    fn append_raw(&mut self, raw: &[u8]) {
        let size = self.size();
        let off = Self::entry_offset(size);
        self.bytes_mut()[off..off + raw.len()].copy_from_slice(raw);
        self.set_size(size + raw.len() / Self::ENTRY_LEN);
    }

    /// Moves the upper half of the entries into the empty `recipient`.
    /// This page keeps `floor(size / 2)` entries.
    pub fn move_half_to<R>(&mut self, recipient: &mut LeafPage<R, K, V>) -> Result<()>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        debug_assert_eq!(recipient.size(), 0, "split recipient must be empty");
        let size = self.size();
        let keep = size / 2;
        let raw = &self.bytes()[Self::entry_offset(keep)..Self::entry_offset(size)];
        recipient.append_raw(raw);
        self.set_size(keep);
        Ok(())
    }

    /// Appends every entry to `recipient`, the left neighbour, and hands it
    /// this page's next link.
    pub fn move_all_to<R>(&mut self, recipient: &mut LeafPage<R, K, V>) -> Result<()>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        if recipient.size() + size > recipient.max_size() + 1 {
            return Err(IndexError::Corruption("leaf merge exceeds page capacity"));
        }
        let raw = &self.bytes()[Self::entry_offset(0)..Self::entry_offset(size)];
        recipient.append_raw(raw);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
        Ok(())
    }

    /// Moves this page's first entry to the end of `recipient`, the left
    /// neighbour. Returns this page's new first key.
    pub fn move_first_to_end_of<R>(&mut self, recipient: &mut LeafPage<R, K, V>) -> Result<K>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.check_index(1)?;
        let raw = &self.bytes()[Self::entry_offset(0)..Self::entry_offset(1)];
        recipient.append_raw(raw);
        self.remove_at(0);
        self.key_at(0)
    }

    /// Moves this page's last entry to the front of `recipient`, the right
    /// neighbour. Returns the recipient's new first key.
    pub fn move_last_to_front_of<R>(&mut self, recipient: &mut LeafPage<R, K, V>) -> Result<K>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        self.check_index(1)?;
        let (key, value) = self.item(size - 1)?;
        self.set_size(size - 1);
        recipient.push_front(&key, &value);
        Ok(key)
    }

    fn push_front(&mut self, key: &K, value: &V) {
        let size = self.size();
        let end = Self::entry_offset(size);
        self.bytes_mut()
            .copy_within(HEADER_LEN..end, HEADER_LEN + Self::ENTRY_LEN);
        self.write_entry(0, key, value);
        self.set_size(size + 1);
    }
}

/// Typed view over an internal page's bytes.
pub struct InternalPage<B, K> {
    buf: B,
    _marker: PhantomData<K>,
}

impl<B: AsRef<[u8]>, K: KeyCodec> InternalPage<B, K> {
    const ENTRY_LEN: usize = K::ENCODED_LEN + CHILD_LEN;

    /// Wraps an initialised internal page, validating its header.
    pub fn open(buf: B) -> Result<Self> {
        let page = buf.as_ref();
        open_checked(page, BTreePageKind::Internal, Self::slots_in(page.len()))?;
        Ok(Self {
            buf,
            _marker: PhantomData,
        })
    }

    fn slots_in(len: usize) -> usize {
        len.saturating_sub(HEADER_LEN) / Self::ENTRY_LEN
    }

    fn bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    fn entry_offset(index: usize) -> usize {
        HEADER_LEN + index * Self::ENTRY_LEN
    }

    /// Id stored in the header.
    pub fn page_id(&self) -> PageId {
        read_page_id(self.bytes(), PAGE_ID_OFFSET)
    }

    /// Parent page, `INVALID` for the root.
    pub fn parent_page_id(&self) -> PageId {
        read_page_id(self.bytes(), PARENT_OFFSET)
    }

    /// Number of children.
    pub fn size(&self) -> usize {
        read_u32(self.bytes(), SIZE_OFFSET) as usize
    }

    /// Largest number of children allowed between operations.
    pub fn max_size(&self) -> usize {
        read_u32(self.bytes(), MAX_SIZE_OFFSET) as usize
    }

    /// Smallest number of children for a non-root internal page.
    pub fn min_size(&self) -> usize {
        min_size_for(self.max_size())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.size() {
            return Err(IndexError::Corruption("internal entry index out of range"));
        }
        Ok(())
    }

    /// Separator key `index`. Index 0 holds no meaningful key.
    pub fn key_at(&self, index: usize) -> Result<K> {
        self.check_index(index)?;
        let off = Self::entry_offset(index);
        K::decode_key(&self.bytes()[off..off + K::ENCODED_LEN])
    }

    /// Child page `index`.
    pub fn value_at(&self, index: usize) -> Result<PageId> {
        self.check_index(index)?;
        Ok(read_page_id(self.bytes(), Self::entry_offset(index) + K::ENCODED_LEN))
    }

    /// Every child id in order.
    pub fn children(&self) -> Result<Vec<PageId>> {
        (0..self.size()).map(|i| self.value_at(i)).collect()
    }

    /// Position of `child`, if it is one of this page's children.
    pub fn value_index(&self, child: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| {
            read_page_id(self.bytes(), Self::entry_offset(i) + K::ENCODED_LEN) == child
        })
    }

    /// Child whose key range contains `key`.
    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Result<PageId> {
        let size = self.size();
        if size == 0 {
            return Err(IndexError::Corruption("internal page has no children"));
        }
        // first separator strictly greater than `key`
        let (mut lo, mut hi) = (1, size);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(&self.key_at(mid)?, key) == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        self.value_at(lo - 1)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: KeyCodec> InternalPage<B, K> {
    /// Formats `buf` as an empty internal page.
    pub fn init(mut buf: B, page_id: PageId, parent: PageId, max_size: usize) -> Result<Self> {
        let page = buf.as_mut();
        if max_size < 3 || max_size + 1 > Self::slots_in(page.len()) {
            return Err(IndexError::Invalid("internal max size does not fit the page"));
        }
        init_header(page, BTreePageKind::Internal, page_id, parent, max_size);
        Ok(Self {
            buf,
            _marker: PhantomData,
        })
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    fn set_size(&mut self, size: usize) {
        write_u32(self.bytes_mut(), SIZE_OFFSET, size as u32);
    }

    /// Sets the parent link.
    pub fn set_parent_page_id(&mut self, parent: PageId) {
        set_parent(self.bytes_mut(), parent);
    }

    /// Overwrites separator `index`.
    pub fn set_key_at(&mut self, index: usize, key: &K) -> Result<()> {
        self.check_index(index)?;
        let off = Self::entry_offset(index);
        K::encode_key(key, &mut self.bytes_mut()[off..off + K::ENCODED_LEN]);
        Ok(())
    }

    fn write_child(&mut self, index: usize, child: PageId) {
        let off = Self::entry_offset(index) + K::ENCODED_LEN;
        write_u64(self.bytes_mut(), off, child.0);
    }

    fn write_entry(&mut self, index: usize, key: Option<&K>, child: PageId) {
        let off = Self::entry_offset(index);
        match key {
            Some(key) => K::encode_key(key, &mut self.bytes_mut()[off..off + K::ENCODED_LEN]),
            None => self.bytes_mut()[off..off + K::ENCODED_LEN].fill(0),
        }
        self.write_child(index, child);
    }

    fn append_raw(&mut self, raw: &[u8]) {
        let size = self.size();
        let off = Self::entry_offset(size);
        self.bytes_mut()[off..off + raw.len()].copy_from_slice(raw);
        self.set_size(size + raw.len() / Self::ENTRY_LEN);
    }

    /// Turns an empty page into a root with two children.
    pub fn populate_new_root(&mut self, left: PageId, key: &K, right: PageId) {
        self.write_entry(0, None, left);
        self.write_entry(1, Some(key), right);
        self.set_size(2);
    }

    /// Inserts `(key, new_child)` right after `old_child`. Returns the new size.
    pub fn insert_node_after(&mut self, old_child: PageId, key: &K, new_child: PageId) -> Result<usize> {
        let size = self.size();
        let index = self
            .value_index(old_child)
            .ok_or(IndexError::Corruption("split child missing from parent"))?
            + 1;
        if size > self.max_size() {
            return Err(IndexError::Corruption("internal page already overflowing"));
        }
        let start = Self::entry_offset(index);
        let end = Self::entry_offset(size);
        self.bytes_mut().copy_within(start..end, start + Self::ENTRY_LEN);
        self.write_entry(index, Some(key), new_child);
        self.set_size(size + 1);
        Ok(size + 1)
    }

    /// Drops entry `index`, shifting later entries left.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let size = self.size();
        let start = Self::entry_offset(index + 1);
        let end = Self::entry_offset(size);
        self.bytes_mut()
            .copy_within(start..end, start - Self::ENTRY_LEN);
        self.set_size(size - 1);
        Ok(())
    }

    /// Empties a one-child page and returns that child.
    pub fn remove_and_return_only_child(&mut self) -> Result<PageId> {
        if self.size() != 1 {
            return Err(IndexError::Corruption("root collapse with more than one child"));
        }
        let child = self.value_at(0)?;
        self.set_size(0);
        Ok(child)
    }

    /// Moves the upper half of the children into the empty `recipient` and
    /// re-parents them. The recipient's key 0 is the separator to push up.
    pub fn move_half_to<R>(
        &mut self,
        recipient: &mut InternalPage<R, K>,
        pool: &dyn BufferManager,
    ) -> Result<()>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        debug_assert_eq!(recipient.size(), 0, "split recipient must be empty");
        let size = self.size();
        let keep = size / 2;
        let raw = &self.bytes()[Self::entry_offset(keep)..Self::entry_offset(size)];
        recipient.append_raw(raw);
        self.set_size(keep);
        recipient.adopt_range(0, size - keep, pool)
    }

    /// Appends every child to `recipient`, the left neighbour, using
    /// `middle_key` as the separator for this page's first child.
    pub fn move_all_to<R>(
        &mut self,
        recipient: &mut InternalPage<R, K>,
        middle_key: &K,
        pool: &dyn BufferManager,
    ) -> Result<()>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        if recipient.size() + size > recipient.max_size() + 1 {
            return Err(IndexError::Corruption("internal merge exceeds page capacity"));
        }
        self.set_key_at(0, middle_key)?;
        let start = recipient.size();
        let raw = &self.bytes()[Self::entry_offset(0)..Self::entry_offset(size)];
        recipient.append_raw(raw);
        self.set_size(0);
        recipient.adopt_range(start, start + size, pool)
    }

    /// Moves this page's first child to the end of `recipient`, the left
    /// neighbour, filed under `middle_key`. Returns the separator that now
    /// bounds this page from the left.
    pub fn move_first_to_end_of<R>(
        &mut self,
        recipient: &mut InternalPage<R, K>,
        middle_key: &K,
        pool: &dyn BufferManager,
    ) -> Result<K>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let child = self.value_at(0)?;
        let separator = self.key_at(1)?;
        let end = recipient.size();
        recipient.write_entry(end, Some(middle_key), child);
        recipient.set_size(end + 1);
        self.remove(0)?;
        recipient.adopt_range(end, end + 1, pool)?;
        Ok(separator)
    }

    /// Moves this page's last child to the front of `recipient`, the right
    /// neighbour, whose old first child is filed under `middle_key`. Returns
    /// the separator that now bounds the recipient from the left.
    pub fn move_last_to_front_of<R>(
        &mut self,
        recipient: &mut InternalPage<R, K>,
        middle_key: &K,
        pool: &dyn BufferManager,
    ) -> Result<K>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size().saturating_sub(1);
        let separator = self.key_at(last)?;
        let child = self.value_at(last)?;
        self.set_size(last);
        recipient.set_key_at(0, middle_key)?;
        let size = recipient.size();
        let end = Self::entry_offset(size);
        recipient
            .bytes_mut()
            .copy_within(HEADER_LEN..end, HEADER_LEN + Self::ENTRY_LEN);
        recipient.write_entry(0, None, child);
        recipient.set_size(size + 1);
        recipient.adopt_range(0, 1, pool)?;
        Ok(separator)
    }

    fn adopt_range(&self, start: usize, end: usize, pool: &dyn BufferManager) -> Result<()> {
        let parent = self.page_id();
        for index in start..end {
            adopt(pool, self.value_at(index)?, parent)?;
        }
        Ok(())
    }
}
