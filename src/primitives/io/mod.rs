#![forbid(unsafe_code)]

//! Page-granular storage backends used beneath the buffer pool.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::types::{page::MIN_PAGE_SIZE, IndexError, PageId, Result};

/// Counters describing traffic through a [`DiskManager`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiskStats {
    /// Number of page reads served.
    pub reads: u64,
    /// Number of page writes applied.
    pub writes: u64,
}

/// Persists raw pages by id.
pub trait DiskManager: Send + 'static {
    /// Size of every page in bytes.
    fn page_size(&self) -> usize;
    /// Reads page `id` into `dst`, which must be exactly one page long.
    fn read_page(&mut self, id: PageId, dst: &mut [u8]) -> Result<()>;
    /// Writes `src`, exactly one page long, as the contents of page `id`.
    fn write_page(&mut self, id: PageId, src: &[u8]) -> Result<()>;
    /// Reserves a fresh page id.
    fn allocate_page(&mut self) -> Result<PageId>;
    /// Returns `id` to the allocator for reuse.
    fn deallocate_page(&mut self, id: PageId) -> Result<()>;
    /// Forces written pages to stable storage.
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
    /// Read/write counters.
    fn stats(&self) -> DiskStats;
}

fn check_page_size(page_size: usize) -> Result<()> {
    if page_size < MIN_PAGE_SIZE {
        return Err(IndexError::Invalid("page size below minimum"));
    }
    Ok(())
}

fn check_buffer(page_size: usize, len: usize) -> Result<()> {
    if len != page_size {
        return Err(IndexError::Invalid("buffer length differs from page size"));
    }
    Ok(())
}

/// Disk manager that keeps every page in memory.
pub struct MemDisk {
    page_size: usize,
    pages: FxHashMap<PageId, Box<[u8]>>,
    next_page: u64,
    free_pages: Vec<PageId>,
    stats: DiskStats,
}

impl MemDisk {
    /// Creates an empty in-memory disk.
    pub fn new(page_size: usize) -> Result<Self> {
        check_page_size(page_size)?;
        Ok(Self {
            page_size,
            pages: FxHashMap::default(),
            next_page: 0,
            free_pages: Vec::new(),
            stats: DiskStats::default(),
        })
    }

    fn is_allocated(&self, id: PageId) -> bool {
        id.0 < self.next_page && !self.free_pages.contains(&id)
    }
}

impl DiskManager for MemDisk {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&mut self, id: PageId, dst: &mut [u8]) -> Result<()> {
        check_buffer(self.page_size, dst.len())?;
        if !self.is_allocated(id) {
            return Err(IndexError::PageNotFound(id));
        }
        match self.pages.get(&id) {
            Some(page) => dst.copy_from_slice(page),
            None => dst.fill(0),
        }
        self.stats.reads += 1;
        Ok(())
    }

    fn write_page(&mut self, id: PageId, src: &[u8]) -> Result<()> {
        check_buffer(self.page_size, src.len())?;
        if !self.is_allocated(id) {
            return Err(IndexError::PageNotFound(id));
        }
        self.pages.insert(id, src.into());
        self.stats.writes += 1;
        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        if let Some(id) = self.free_pages.pop() {
            return Ok(id);
        }
        let id = PageId(self.next_page);
        self.next_page += 1;
        Ok(id)
    }

    fn deallocate_page(&mut self, id: PageId) -> Result<()> {
        if !self.is_allocated(id) {
            return Err(IndexError::PageNotFound(id));
        }
        self.pages.remove(&id);
        self.free_pages.push(id);
        Ok(())
    }

    fn stats(&self) -> DiskStats {
        self.stats
    }
}

/// Disk manager backed by a single file of contiguous pages.
///
/// Page `n` lives at byte offset `n * page_size`. Pages allocated but never
/// written read back as zeroes. Deallocated ids are reused within the
/// lifetime of the handle only.
pub struct FileDisk {
    file: File,
    page_size: usize,
    page_count: u64,
    free_pages: Vec<PageId>,
    stats: DiskStats,
}

impl FileDisk {
    /// Opens `path`, creating it if necessary.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> Result<Self> {
        check_page_size(page_size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let len = file.metadata()?.len();
        if len % page_size as u64 != 0 {
            return Err(IndexError::Corruption("file length is not a whole number of pages"));
        }
        let page_count = len / page_size as u64;
        debug!(path = %path.as_ref().display(), page_count, "file_disk.open");
        Ok(Self {
            file,
            page_size,
            page_count,
            free_pages: Vec::new(),
            stats: DiskStats::default(),
        })
    }

    /// Number of page ids handed out, including freed ones.
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    fn offset(&self, id: PageId) -> Result<u64> {
        if id.0 >= self.page_count {
            return Err(IndexError::PageNotFound(id));
        }
        id.0
            .checked_mul(self.page_size as u64)
            .ok_or(IndexError::Invalid("page offset overflow"))
    }
}

impl DiskManager for FileDisk {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&mut self, id: PageId, dst: &mut [u8]) -> Result<()> {
        check_buffer(self.page_size, dst.len())?;
        let off = self.offset(id)?;
        self.file.seek(SeekFrom::Start(off))?;
        match self.file.read_exact(dst) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => dst.fill(0),
            Err(err) => return Err(err.into()),
        }
        self.stats.reads += 1;
        Ok(())
    }

    fn write_page(&mut self, id: PageId, src: &[u8]) -> Result<()> {
        check_buffer(self.page_size, src.len())?;
        let off = self.offset(id)?;
        self.file.seek(SeekFrom::Start(off))?;
        self.file.write_all(src)?;
        self.stats.writes += 1;
        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        if let Some(id) = self.free_pages.pop() {
            return Ok(id);
        }
        let id = PageId(self.page_count);
        self.page_count += 1;
        Ok(id)
    }

    fn deallocate_page(&mut self, id: PageId) -> Result<()> {
        if id.0 >= self.page_count || self.free_pages.contains(&id) {
            return Err(IndexError::PageNotFound(id));
        }
        self.free_pages.push(id);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn stats(&self) -> DiskStats {
        self.stats
    }
}
