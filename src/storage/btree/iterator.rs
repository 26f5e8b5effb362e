use std::marker::PhantomData;

use crate::primitives::pager::{BufferManager, PageGuard};
use crate::types::{PageId, Result};

use super::codecs::{KeyCodec, ValCodec};
use super::page::LeafView;

/// Forward iterator over leaf entries in key order.
///
/// Holds a pin on the current leaf only. At the end of a leaf it pins the
/// next leaf before releasing the current one. Any error ends the iteration
/// after it is yielded.
pub struct IndexIterator<'a, K, V> {
    pool: &'a dyn BufferManager,
    page: Option<PageGuard<'a>>,
    index: usize,
    _marker: PhantomData<(K, V)>,
}

enum Step<K, V> {
    Item(K, V),
    Next(PageId),
}

impl<'a, K: KeyCodec, V: ValCodec> IndexIterator<'a, K, V> {
    pub(crate) fn new(pool: &'a dyn BufferManager, page: Option<PageGuard<'a>>, index: usize) -> Self {
        Self {
            pool,
            page,
            index,
            _marker: PhantomData,
        }
    }

    /// Whether the iterator is exhausted.
    pub fn is_end(&self) -> bool {
        self.page.is_none()
    }

    fn step(page: &PageGuard<'_>, index: usize) -> Result<Step<K, V>> {
        let data = page.data();
        let leaf = LeafView::<K, V>::open(&data[..])?;
        let step = if index < leaf.size() {
            let (key, value) = leaf.item(index)?;
            Step::Item(key, value)
        } else {
            Step::Next(leaf.next_page_id())
        };
        Ok(step)
    }
}

impl<'a, K: KeyCodec, V: ValCodec> Iterator for IndexIterator<'a, K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page = self.page.as_ref()?;
            match Self::step(page, self.index) {
                Ok(Step::Item(key, value)) => {
                    self.index += 1;
                    return Some(Ok((key, value)));
                }
                Ok(Step::Next(next)) if next.is_valid() => match PageGuard::fetch(self.pool, next) {
                    Ok(next_page) => {
                        self.page = Some(next_page);
                        self.index = 0;
                    }
                    Err(err) => {
                        self.page = None;
                        return Some(Err(err));
                    }
                },
                Ok(Step::Next(_)) => {
                    self.page = None;
                    return None;
                }
                Err(err) => {
                    self.page = None;
                    return Some(Err(err));
                }
            }
        }
    }
}
