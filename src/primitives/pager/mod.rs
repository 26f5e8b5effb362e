#![forbid(unsafe_code)]

//! Buffer pool handing out pinned, latched page buffers.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::types::{PageId, Result};

mod frame;
mod guard;
mod pool;

pub use guard::PageGuard;
pub use pool::{BufferPool, BufferPoolOptions, PoolStats};

/// Shared handle to one frame's bytes. The lock is the page latch.
pub type PageBuf = Arc<RwLock<Box<[u8]>>>;

/// Buffer-manager contract the index is written against.
///
/// Every successful [`fetch_page`](Self::fetch_page) or
/// [`new_page`](Self::new_page) pins the page and must be paired with exactly
/// one [`unpin_page`](Self::unpin_page). [`PageGuard`] does the pairing.
pub trait BufferManager: Send + Sync {
    /// Size of every page in bytes.
    fn page_size(&self) -> usize;

    /// Pins page `id`, reading it from disk if it is not resident.
    ///
    /// Fails with [`IndexError::BufferExhausted`](crate::types::IndexError::BufferExhausted)
    /// when every frame is pinned.
    fn fetch_page(&self, id: PageId) -> Result<PageBuf>;

    /// Allocates and pins a zeroed page.
    ///
    /// Fails with [`IndexError::OutOfMemory`](crate::types::IndexError::OutOfMemory)
    /// when every frame is pinned.
    fn new_page(&self) -> Result<(PageId, PageBuf)>;

    /// Drops one pin on `id`, marking it dirty when `dirty` is set.
    /// Returns false if the page was not resident or not pinned.
    fn unpin_page(&self, id: PageId, dirty: bool) -> Result<bool>;

    /// Removes `id` from the pool and releases it on disk.
    /// Returns false, leaving everything untouched, while the page is pinned.
    fn delete_page(&self, id: PageId) -> Result<bool>;

    /// Writes `id` back if it is resident. Returns whether it was.
    fn flush_page(&self, id: PageId) -> Result<bool>;

    /// Writes back every dirty resident page and syncs the disk.
    fn flush_all(&self) -> Result<()>;
}
