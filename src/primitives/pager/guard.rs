use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::types::{PageId, Result};

use super::{BufferManager, PageBuf};

/// A pinned page that unpins itself when dropped.
///
/// The pin keeps the page resident; [`data`](Self::data) and
/// [`data_mut`](Self::data_mut) take the page latch for as long as the
/// returned lock guard lives.
pub struct PageGuard<'a> {
    id: PageId,
    pool: &'a dyn BufferManager,
    buf: PageBuf,
    dirty: bool,
    released: bool,
}

impl<'a> PageGuard<'a> {
    /// Pins an existing page.
    pub fn fetch(pool: &'a dyn BufferManager, id: PageId) -> Result<Self> {
        let buf = pool.fetch_page(id)?;
        Ok(Self::wrap(pool, id, buf, false))
    }

    /// Allocates and pins a fresh zeroed page. The page starts dirty.
    pub fn allocate(pool: &'a dyn BufferManager) -> Result<Self> {
        let (id, buf) = pool.new_page()?;
        Ok(Self::wrap(pool, id, buf, true))
    }

    fn wrap(pool: &'a dyn BufferManager, id: PageId, buf: PageBuf, dirty: bool) -> Self {
        Self {
            id,
            pool,
            buf,
            dirty,
            released: false,
        }
    }

    /// Id of the pinned page.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Read-latches the page bytes.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.buf.read()
    }

    /// Write-latches the page bytes and marks the page dirty.
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.dirty = true;
        self.buf.write()
    }

    /// Whether the page will be unpinned as dirty.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Unpins the page and then deletes it from the pool and the disk.
    pub fn delete(mut self) -> Result<bool> {
        self.release()?;
        self.pool.delete_page(self.id)
    }

    fn release(&mut self) -> Result<bool> {
        if self.released {
            return Ok(false);
        }
        self.released = true;
        self.pool.unpin_page(self.id, self.dirty)
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(page = self.id.0, error = %err, "page_guard.unpin_failed");
        }
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("id", &self.id)
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::io::MemDisk;
    use crate::primitives::pager::{BufferPool, BufferPoolOptions};

    fn pool() -> Result<BufferPool> {
        BufferPool::new(
            MemDisk::new(256)?,
            BufferPoolOptions {
                pool_size: 2,
                page_table_bucket_size: 4,
            },
        )
    }

    #[test]
    fn drop_releases_the_pin() -> Result<()> {
        let pool = pool()?;
        let id = {
            let mut page = PageGuard::allocate(&pool)?;
            page.data_mut()[0] = 9;
            assert_eq!(pool.pin_count(page.id()), Some(1));
            page.id()
        };
        assert_eq!(pool.pin_count(id), Some(0));
        let page = PageGuard::fetch(&pool, id)?;
        assert!(!page.is_dirty());
        assert_eq!(page.data()[0], 9);
        Ok(())
    }

    #[test]
    fn delete_unpins_before_removing() -> Result<()> {
        let pool = pool()?;
        let page = PageGuard::allocate(&pool)?;
        let id = page.id();
        assert!(page.delete()?);
        assert_eq!(pool.pin_count(id), None);
        assert_eq!(pool.pinned_frames(), 0);
        Ok(())
    }

    #[test]
    fn delete_fails_softly_while_another_pin_exists() -> Result<()> {
        let pool = pool()?;
        let first = PageGuard::allocate(&pool)?;
        let second = PageGuard::fetch(&pool, first.id())?;
        assert!(!second.delete()?);
        assert_eq!(pool.pin_count(first.id()), Some(1));
        Ok(())
    }
}
