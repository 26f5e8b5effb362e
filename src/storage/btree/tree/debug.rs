use std::cmp::Ordering;
use std::fmt::{self, Write as _};

use super::BPlusTree;
use crate::primitives::pager::PageGuard;
use crate::storage::btree::codecs::{KeyCodec, KeyComparator, ValCodec};
use crate::storage::btree::page::{min_size_for, BTreePageKind, Header, InternalView, LeafView};
use crate::types::{IndexError, PageId, Result};

/// Shape of a tree as seen by [`BPlusTree::check_integrity`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeSummary {
    /// Levels from root to leaves; 0 for an empty tree.
    pub height: usize,
    /// Number of leaf pages.
    pub leaf_pages: usize,
    /// Number of internal pages.
    pub internal_pages: usize,
    /// Number of entries across all leaves.
    pub entries: usize,
}

struct Visit<K> {
    page: PageId,
    parent: PageId,
    depth: usize,
    lower: Option<K>,
    upper: Option<K>,
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: KeyCodec,
    V: ValCodec,
    C: KeyComparator<K>,
{
    /// Renders the tree level by level, one line per level.
    ///
    /// Leaves print as `[k1 k2 ...]` and internal pages as `<k1 k2 ...>`
    /// (separators only). With `verbose`, each page is prefixed with
    /// `id^parent`, leaf entries print as `key:value`, and leaves show their
    /// next link as `->id`.
    pub fn dump(&self, verbose: bool) -> Result<String>
    where
        K: fmt::Display,
        V: fmt::Display,
    {
        let mut out = String::new();
        let root = self.root_page_id();
        if !root.is_valid() {
            out.push_str("(empty)\n");
            return Ok(out);
        }
        let mut level = vec![root];
        while !level.is_empty() {
            let mut next_level = Vec::new();
            let mut parts = Vec::with_capacity(level.len());
            for &id in &level {
                let page = PageGuard::fetch(&*self.pool, id)?;
                let data = page.data();
                let header = Header::parse(&data)?;
                let mut part = String::new();
                if verbose {
                    let _ = write!(part, "{}^{}", header.page_id, header.parent);
                }
                match header.kind {
                    BTreePageKind::Leaf => {
                        let leaf = LeafView::<K, V>::open(&data[..])?;
                        let mut items = Vec::with_capacity(leaf.size());
                        for i in 0..leaf.size() {
                            let (key, value) = leaf.item(i)?;
                            items.push(if verbose {
                                format!("{key}:{value}")
                            } else {
                                key.to_string()
                            });
                        }
                        let _ = write!(part, "[{}]", items.join(" "));
                        if verbose {
                            let _ = write!(part, "->{}", leaf.next_page_id());
                        }
                    }
                    BTreePageKind::Internal => {
                        let node = InternalView::<K>::open(&data[..])?;
                        let mut keys = Vec::with_capacity(node.size());
                        for i in 1..node.size() {
                            keys.push(node.key_at(i)?.to_string());
                        }
                        let _ = write!(part, "<{}>", keys.join(" "));
                        next_level.extend(node.children()?);
                    }
                }
                parts.push(part);
            }
            out.push_str(&parts.join(" "));
            out.push('\n');
            level = next_level;
        }
        Ok(out)
    }

    /// Walks the whole tree and verifies its structure: page kinds and ids,
    /// parent links, size bounds, key order within each page and against
    /// the parent's separators, equal leaf depth, and the leaf chain.
    pub fn check_integrity(&self) -> Result<TreeSummary> {
        let root = self.root_page_id();
        let mut summary = TreeSummary::default();
        if !root.is_valid() {
            return Ok(summary);
        }
        let mut leaves = Vec::new();
        let mut leaf_links = Vec::new();
        let mut leaf_depth = None;
        let mut stack = vec![Visit {
            page: root,
            parent: PageId::INVALID,
            depth: 1,
            lower: None,
            upper: None,
        }];
        while let Some(visit) = stack.pop() {
            let page = PageGuard::fetch(&*self.pool, visit.page)?;
            let data = page.data();
            let header = Header::parse(&data)?;
            if header.page_id != visit.page {
                return Err(IndexError::Corruption("page id in header does not match location"));
            }
            if header.parent != visit.parent {
                return Err(IndexError::Corruption("parent link does not match the tree"));
            }
            let is_root = !visit.parent.is_valid();
            let min = match (is_root, header.kind) {
                (true, BTreePageKind::Leaf) => 1,
                (true, BTreePageKind::Internal) => 2,
                (false, _) => min_size_for(header.max_size),
            };
            if header.size < min || header.size > header.max_size {
                return Err(IndexError::Corruption("page size outside its bounds"));
            }
            match header.kind {
                BTreePageKind::Leaf => {
                    if *leaf_depth.get_or_insert(visit.depth) != visit.depth {
                        return Err(IndexError::Corruption("leaves at different depths"));
                    }
                    let leaf = LeafView::<K, V>::open(&data[..])?;
                    let keys = (0..leaf.size())
                        .map(|i| leaf.key_at(i))
                        .collect::<Result<Vec<_>>>()?;
                    self.check_keys(&keys, visit.lower.as_ref(), visit.upper.as_ref())?;
                    summary.leaf_pages += 1;
                    summary.entries += keys.len();
                    leaves.push(visit.page);
                    leaf_links.push(leaf.next_page_id());
                }
                BTreePageKind::Internal => {
                    let node = InternalView::<K>::open(&data[..])?;
                    let keys = (1..node.size())
                        .map(|i| node.key_at(i))
                        .collect::<Result<Vec<_>>>()?;
                    self.check_keys(&keys, visit.lower.as_ref(), visit.upper.as_ref())?;
                    summary.internal_pages += 1;
                    // push right to left so children are visited left to right
                    for i in (0..node.size()).rev() {
                        let lower = if i == 0 {
                            visit.lower.clone()
                        } else {
                            Some(keys[i - 1].clone())
                        };
                        let upper = if i + 1 < node.size() {
                            Some(keys[i].clone())
                        } else {
                            visit.upper.clone()
                        };
                        stack.push(Visit {
                            page: node.value_at(i)?,
                            parent: visit.page,
                            depth: visit.depth + 1,
                            lower,
                            upper,
                        });
                    }
                }
            }
        }
        for (i, link) in leaf_links.iter().enumerate() {
            let expected = leaves.get(i + 1).copied().unwrap_or(PageId::INVALID);
            if *link != expected {
                return Err(IndexError::Corruption("leaf chain out of order"));
            }
        }
        summary.height = leaf_depth.unwrap_or(0);
        Ok(summary)
    }

    fn check_keys(&self, keys: &[K], lower: Option<&K>, upper: Option<&K>) -> Result<()> {
        let cmp = &self.comparator;
        if keys
            .windows(2)
            .any(|pair| cmp.compare(&pair[0], &pair[1]) != Ordering::Less)
        {
            return Err(IndexError::Corruption("keys out of order within a page"));
        }
        if let (Some(lower), Some(first)) = (lower, keys.first()) {
            if cmp.compare(first, lower) == Ordering::Less {
                return Err(IndexError::Corruption("key below its parent separator"));
            }
        }
        if let (Some(upper), Some(last)) = (upper, keys.last()) {
            if cmp.compare(last, upper) != Ordering::Less {
                return Err(IndexError::Corruption("key at or above its parent separator"));
            }
        }
        Ok(())
    }
}
