//! Identifiers, the crate-wide error type, and page-size constants shared by
//! the pager and the index.

use std::fmt;

/// Identifier of a fixed-size page on disk.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PageId(pub u64);

impl PageId {
    /// Sentinel used for "no page": empty roots, missing parents, the last leaf's link.
    pub const INVALID: PageId = PageId(u64::MAX);

    /// Returns true unless this is [`PageId::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("INVALID")
        }
    }
}

/// Errors surfaced by the pager, the hash directory and the B+ tree.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// Underlying file I/O failed.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// On-page data violates a structural invariant.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Caller supplied an argument outside the supported range.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// The buffer pool could not supply a frame for a new page.
    #[error("out of memory: no frame available for a new page")]
    OutOfMemory,
    /// The buffer pool could not supply a frame to fetch an existing page.
    #[error("buffer pool exhausted: every frame is pinned")]
    BufferExhausted,
    /// The requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(PageId),
    /// Text input could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, IndexError>;

pub mod page {
    //! Page sizing shared by the disk managers and the buffer pool.

    /// Default size of a page in bytes.
    pub const DEFAULT_PAGE_SIZE: usize = 4096;
    /// Smallest page size the tree layer can lay out useful nodes in.
    pub const MIN_PAGE_SIZE: usize = 256;
}
