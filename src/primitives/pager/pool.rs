use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::primitives::hash::ExtendibleHash;
use crate::primitives::io::{DiskManager, DiskStats};
use crate::types::{IndexError, PageId, Result};

use super::frame::Frame;
use super::{BufferManager, PageBuf};

/// Configuration for a [`BufferPool`].
#[derive(Clone, Debug)]
pub struct BufferPoolOptions {
    /// Number of frames. Bounds how many pages can be pinned at once.
    pub pool_size: usize,
    /// Bucket capacity of the page table's hash directory.
    pub page_table_bucket_size: usize,
}

impl Default for BufferPoolOptions {
    fn default() -> Self {
        Self {
            pool_size: 64,
            page_table_bucket_size: 8,
        }
    }
}

/// Snapshot of pool counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    /// Fetches served from a resident frame.
    pub hits: u64,
    /// Fetches that had to read from disk.
    pub misses: u64,
    /// Resident pages pushed out to make room.
    pub evictions: u64,
    /// Dirty pages written back, by eviction or flush.
    pub writebacks: u64,
}

struct PoolInner {
    frames: Vec<Frame>,
    page_table: ExtendibleHash<PageId, usize>,
    free_frames: Vec<usize>,
    /// Unpinned resident frames, least recently unpinned first.
    replacer: LruCache<usize, ()>,
    disk: Box<dyn DiskManager>,
    stats: PoolStats,
}

impl PoolInner {
    /// Picks a frame to reuse, writing back and unmapping its old page.
    /// Returns `None` when every frame is pinned.
    fn take_victim(&mut self) -> Result<Option<usize>> {
        if let Some(idx) = self.free_frames.pop() {
            return Ok(Some(idx));
        }
        let Some((idx, ())) = self.replacer.pop_lru() else {
            return Ok(None);
        };
        let frame = &mut self.frames[idx];
        debug_assert_eq!(frame.pin_count, 0, "pinned frame in replacer");
        if let Some(old) = frame.id {
            if frame.dirty {
                let buf = frame.buf.read();
                if let Err(err) = self.disk.write_page(old, &buf) {
                    drop(buf);
                    self.replacer.put(idx, ());
                    return Err(err);
                }
                self.stats.writebacks += 1;
            }
            self.page_table.remove(&old);
            self.stats.evictions += 1;
            debug!(page = old.0, frame = idx, dirty = frame.dirty, "buffer_pool.evict");
        }
        frame.reset();
        Ok(Some(idx))
    }

    fn write_back(&mut self, idx: usize) -> Result<()> {
        let frame = &mut self.frames[idx];
        if let (Some(id), true) = (frame.id, frame.dirty) {
            let buf = frame.buf.read();
            self.disk.write_page(id, &buf)?;
            drop(buf);
            frame.dirty = false;
            self.stats.writebacks += 1;
        }
        Ok(())
    }
}

/// Fixed-size buffer pool over a [`DiskManager`].
///
/// The page table is an [`ExtendibleHash`] from page id to frame index; the
/// replacer evicts the least recently unpinned page.
pub struct BufferPool {
    page_size: usize,
    pool_size: usize,
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    /// Creates a pool of `options.pool_size` frames over `disk`.
    pub fn new(disk: impl DiskManager, options: BufferPoolOptions) -> Result<Self> {
        if options.pool_size == 0 {
            return Err(IndexError::Invalid("pool_size must be at least 1"));
        }
        let page_size = disk.page_size();
        let frames = (0..options.pool_size)
            .map(|_| Frame::new(page_size))
            .collect::<Vec<_>>();
        let free_frames = (0..options.pool_size).rev().collect();
        Ok(Self {
            page_size,
            pool_size: options.pool_size,
            inner: Mutex::new(PoolInner {
                frames,
                page_table: ExtendibleHash::new(options.page_table_bucket_size),
                free_frames,
                replacer: LruCache::unbounded(),
                disk: Box::new(disk),
                stats: PoolStats::default(),
            }),
        })
    }

    /// Convenience for `Arc::new(BufferPool::new(..)?)`.
    pub fn shared(disk: impl DiskManager, options: BufferPoolOptions) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(disk, options)?))
    }

    /// Number of frames.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Current pin count of `id`, or `None` if it is not resident.
    pub fn pin_count(&self, id: PageId) -> Option<u32> {
        let inner = self.inner.lock();
        inner
            .page_table
            .find(&id)
            .map(|&idx| inner.frames[idx].pin_count)
    }

    /// Number of frames currently pinned at least once.
    pub fn pinned_frames(&self) -> usize {
        let inner = self.inner.lock();
        inner.frames.iter().filter(|f| f.pin_count > 0).count()
    }

    /// Pool counters.
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }

    /// Counters of the underlying disk.
    pub fn disk_stats(&self) -> DiskStats {
        self.inner.lock().disk.stats()
    }
}

impl BufferManager for BufferPool {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn fetch_page(&self, id: PageId) -> Result<PageBuf> {
        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.page_table.find(&id) {
            inner.stats.hits += 1;
            inner.replacer.pop(&idx);
            let frame = &mut inner.frames[idx];
            frame.pin_count += 1;
            return Ok(Arc::clone(&frame.buf));
        }
        let idx = inner.take_victim()?.ok_or(IndexError::BufferExhausted)?;
        let inner = &mut *inner;
        let frame = &mut inner.frames[idx];
        let read = {
            let mut buf = frame.buf.write();
            inner.disk.read_page(id, &mut buf)
        };
        if let Err(err) = read {
            inner.free_frames.push(idx);
            return Err(err);
        }
        frame.id = Some(id);
        frame.pin_count = 1;
        inner.page_table.insert(id, idx);
        inner.stats.misses += 1;
        trace!(page = id.0, frame = idx, "buffer_pool.fetch_miss");
        Ok(Arc::clone(&frame.buf))
    }

    fn new_page(&self) -> Result<(PageId, PageBuf)> {
        let mut inner = self.inner.lock();
        let idx = inner.take_victim()?.ok_or(IndexError::OutOfMemory)?;
        let id = match inner.disk.allocate_page() {
            Ok(id) => id,
            Err(err) => {
                inner.free_frames.push(idx);
                return Err(err);
            }
        };
        let inner = &mut *inner;
        let frame = &mut inner.frames[idx];
        frame.buf.write().fill(0);
        frame.id = Some(id);
        frame.pin_count = 1;
        frame.dirty = true;
        inner.page_table.insert(id, idx);
        trace!(page = id.0, frame = idx, "buffer_pool.new_page");
        Ok((id, Arc::clone(&frame.buf)))
    }

    fn unpin_page(&self, id: PageId, dirty: bool) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(&idx) = inner.page_table.find(&id) else {
            warn!(page = id.0, "buffer_pool.unpin_not_resident");
            return Ok(false);
        };
        let frame = &mut inner.frames[idx];
        if frame.pin_count == 0 {
            warn!(page = id.0, "buffer_pool.unpin_unbalanced");
            return Ok(false);
        }
        frame.pin_count -= 1;
        frame.dirty |= dirty;
        if frame.pin_count == 0 {
            inner.replacer.put(idx, ());
        }
        Ok(true)
    }

    fn delete_page(&self, id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.page_table.find(&id) {
            if inner.frames[idx].pin_count > 0 {
                return Ok(false);
            }
            inner.page_table.remove(&id);
            inner.replacer.pop(&idx);
            inner.frames[idx].reset();
            inner.free_frames.push(idx);
        }
        inner.disk.deallocate_page(id)?;
        trace!(page = id.0, "buffer_pool.delete_page");
        Ok(true)
    }

    fn flush_page(&self, id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(&idx) = inner.page_table.find(&id) else {
            return Ok(false);
        };
        inner.write_back(idx)?;
        Ok(true)
    }

    fn flush_all(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        for idx in 0..inner.frames.len() {
            inner.write_back(idx)?;
        }
        inner.disk.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::io::MemDisk;

    const PAGE: usize = 256;

    fn pool(frames: usize) -> Result<BufferPool> {
        BufferPool::new(
            MemDisk::new(PAGE)?,
            BufferPoolOptions {
                pool_size: frames,
                page_table_bucket_size: 2,
            },
        )
    }

    #[test]
    fn new_pages_fail_once_every_frame_is_pinned() -> Result<()> {
        let pool = pool(2)?;
        let (a, _) = pool.new_page()?;
        let (_b, _) = pool.new_page()?;
        assert!(matches!(pool.new_page(), Err(IndexError::OutOfMemory)));
        assert!(pool.unpin_page(a, false)?);
        let (c, _) = pool.new_page()?;
        assert_ne!(a, c);
        assert_eq!(pool.pin_count(a), None);
        Ok(())
    }

    #[test]
    fn fetch_fails_with_exhausted_pool() -> Result<()> {
        let pool = pool(1)?;
        let (a, _) = pool.new_page()?;
        pool.unpin_page(a, true)?;
        let (_b, _) = pool.new_page()?;
        assert!(matches!(pool.fetch_page(a), Err(IndexError::BufferExhausted)));
        Ok(())
    }

    #[test]
    fn evicted_dirty_page_is_written_back_and_reloaded() -> Result<()> {
        let pool = pool(1)?;
        let (a, buf) = pool.new_page()?;
        buf.write()[..4].copy_from_slice(b"page");
        drop(buf);
        pool.unpin_page(a, true)?;

        let (b, _) = pool.new_page()?;
        pool.unpin_page(b, false)?;
        assert_eq!(pool.stats().evictions, 1);

        let buf = pool.fetch_page(a)?;
        assert_eq!(&buf.read()[..4], b"page");
        drop(buf);
        pool.unpin_page(a, false)?;
        assert!(pool.disk_stats().writes >= 1);
        Ok(())
    }

    #[test]
    fn replacer_prefers_least_recently_unpinned() -> Result<()> {
        let pool = pool(2)?;
        let (a, _) = pool.new_page()?;
        let (b, _) = pool.new_page()?;
        pool.unpin_page(b, false)?;
        pool.unpin_page(a, false)?;
        let (_c, _) = pool.new_page()?;
        assert_eq!(pool.pin_count(b), None);
        assert_eq!(pool.pin_count(a), Some(0));
        Ok(())
    }

    #[test]
    fn unbalanced_unpin_reports_false() -> Result<()> {
        let pool = pool(2)?;
        let (a, _) = pool.new_page()?;
        assert!(pool.unpin_page(a, false)?);
        assert!(!pool.unpin_page(a, false)?);
        assert!(!pool.unpin_page(PageId(42), false)?);
        Ok(())
    }

    #[test]
    fn delete_refuses_pinned_pages() -> Result<()> {
        let pool = pool(2)?;
        let (a, _) = pool.new_page()?;
        assert!(!pool.delete_page(a)?);
        pool.unpin_page(a, false)?;
        assert!(pool.delete_page(a)?);
        assert_eq!(pool.pin_count(a), None);
        assert!(matches!(pool.fetch_page(a), Err(IndexError::PageNotFound(_))));
        assert_eq!(pool.pinned_frames(), 0);
        Ok(())
    }

    #[test]
    fn many_pages_cycle_through_a_small_pool() -> Result<()> {
        let pool = pool(3)?;
        let mut ids = Vec::new();
        for i in 0..20u8 {
            let (id, buf) = pool.new_page()?;
            buf.write()[0] = i;
            drop(buf);
            pool.unpin_page(id, true)?;
            ids.push(id);
        }
        for (i, id) in ids.iter().enumerate() {
            let buf = pool.fetch_page(*id)?;
            assert_eq!(buf.read()[0], i as u8);
            drop(buf);
            pool.unpin_page(*id, false)?;
        }
        assert_eq!(pool.pinned_frames(), 0);
        Ok(())
    }
}
