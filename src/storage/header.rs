//! Header page holding the `index name -> root page id` registry.
//!
//! Layout (big-endian): a `u32` record count at offset 0, then fixed records
//! of a zero-padded 32-byte name followed by a `u64` root page id.

use std::sync::Arc;

use tracing::debug;

use crate::primitives::pager::{BufferManager, PageGuard};
use crate::types::{IndexError, PageId, Result};

const COUNT_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 4;
/// Longest index name the header page stores.
pub const MAX_NAME_LEN: usize = 32;
const RECORD_LEN: usize = MAX_NAME_LEN + 8;

/// Where a tree publishes its current root page id.
pub trait RootRegistry: Send + Sync {
    /// Adds a record for `name`. Returns false if one already exists.
    fn insert_record(&self, name: &str, root: PageId) -> Result<bool>;
    /// Overwrites the record for `name`. Returns false if there is none.
    fn update_record(&self, name: &str, root: PageId) -> Result<bool>;
    /// Root registered for `name`, if any.
    fn root_of(&self, name: &str) -> Result<Option<PageId>>;
}

/// [`RootRegistry`] stored in a single buffer-pool page.
pub struct HeaderPage {
    pool: Arc<dyn BufferManager>,
    page_id: PageId,
}

impl HeaderPage {
    /// Allocates an empty header page.
    pub fn create(pool: Arc<dyn BufferManager>) -> Result<Self> {
        let page_id = {
            let mut page = PageGuard::allocate(&*pool)?;
            page.data_mut()[COUNT_OFFSET..RECORDS_OFFSET].copy_from_slice(&0u32.to_be_bytes());
            page.id()
        };
        debug!(page = page_id.0, "header.create");
        Ok(Self { pool, page_id })
    }

    /// Opens an existing header page, validating its record count.
    pub fn open(pool: Arc<dyn BufferManager>, page_id: PageId) -> Result<Self> {
        let header = Self { pool, page_id };
        {
            let page = PageGuard::fetch(&*header.pool, page_id)?;
            let data = page.data();
            header.count(&data)?;
        }
        Ok(header)
    }

    /// Id of the header page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Every record in insertion order.
    pub fn records(&self) -> Result<Vec<(String, PageId)>> {
        let page = PageGuard::fetch(&*self.pool, self.page_id)?;
        let data = page.data();
        let count = self.count(&data)?;
        let records = (0..count)
            .map(|slot| {
                let (name, root) = read_record(&data, slot);
                (String::from_utf8_lossy(name).into_owned(), root)
            })
            .collect();
        Ok(records)
    }

    fn capacity(&self) -> usize {
        (self.pool.page_size() - RECORDS_OFFSET) / RECORD_LEN
    }

    fn count(&self, data: &[u8]) -> Result<usize> {
        let count = read_u32(data, COUNT_OFFSET) as usize;
        if count > self.capacity() {
            return Err(IndexError::Corruption("header record count exceeds page"));
        }
        Ok(count)
    }

    fn find_slot(&self, data: &[u8], name: &[u8]) -> Result<Option<usize>> {
        let count = self.count(data)?;
        Ok((0..count).find(|&slot| read_record(data, slot).0 == name))
    }
}

impl RootRegistry for HeaderPage {
    fn insert_record(&self, name: &str, root: PageId) -> Result<bool> {
        let name = check_name(name)?;
        let mut page = PageGuard::fetch(&*self.pool, self.page_id)?;
        if self.find_slot(&page.data(), name)?.is_some() {
            return Ok(false);
        }
        let count = self.count(&page.data())?;
        if count == self.capacity() {
            return Err(IndexError::Invalid("header page is full"));
        }
        let mut data = page.data_mut();
        write_record(&mut data, count, name, root);
        data[COUNT_OFFSET..RECORDS_OFFSET].copy_from_slice(&(count as u32 + 1).to_be_bytes());
        debug!(index = %String::from_utf8_lossy(name), root = %root, "header.insert_record");
        Ok(true)
    }

    fn update_record(&self, name: &str, root: PageId) -> Result<bool> {
        let name = check_name(name)?;
        let mut page = PageGuard::fetch(&*self.pool, self.page_id)?;
        let Some(slot) = self.find_slot(&page.data(), name)? else {
            return Ok(false);
        };
        write_record(&mut page.data_mut(), slot, name, root);
        debug!(index = %String::from_utf8_lossy(name), root = %root, "header.update_record");
        Ok(true)
    }

    fn root_of(&self, name: &str) -> Result<Option<PageId>> {
        let name = check_name(name)?;
        let page = PageGuard::fetch(&*self.pool, self.page_id)?;
        let data = page.data();
        let root = self
            .find_slot(&data, name)?
            .map(|slot| read_record(&data, slot).1);
        Ok(root)
    }
}

fn check_name(name: &str) -> Result<&[u8]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_NAME_LEN || bytes.contains(&0) {
        return Err(IndexError::Invalid("index name must be 1..=32 bytes without NUL"));
    }
    Ok(bytes)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[offset..offset + 4]);
    u32::from_be_bytes(raw)
}

fn read_record(data: &[u8], slot: usize) -> (&[u8], PageId) {
    let start = RECORDS_OFFSET + slot * RECORD_LEN;
    let name = &data[start..start + MAX_NAME_LEN];
    let name_len = name.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[start + MAX_NAME_LEN..start + RECORD_LEN]);
    (&name[..name_len], PageId(u64::from_be_bytes(raw)))
}

fn write_record(data: &mut [u8], slot: usize, name: &[u8], root: PageId) {
    let start = RECORDS_OFFSET + slot * RECORD_LEN;
    let field = &mut data[start..start + MAX_NAME_LEN];
    field.fill(0);
    field[..name.len()].copy_from_slice(name);
    data[start + MAX_NAME_LEN..start + RECORD_LEN].copy_from_slice(&root.0.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::io::MemDisk;
    use crate::primitives::pager::{BufferPool, BufferPoolOptions};

    fn pool() -> Result<Arc<dyn BufferManager>> {
        let pool: Arc<dyn BufferManager> =
            BufferPool::shared(MemDisk::new(256)?, BufferPoolOptions::default())?;
        Ok(pool)
    }

    #[test]
    fn insert_then_update_round_trips() -> Result<()> {
        let header = HeaderPage::create(pool()?)?;
        assert_eq!(header.root_of("orders")?, None);
        assert!(header.insert_record("orders", PageId(3))?);
        assert!(!header.insert_record("orders", PageId(4))?);
        assert_eq!(header.root_of("orders")?, Some(PageId(3)));
        assert!(header.update_record("orders", PageId::INVALID)?);
        assert_eq!(header.root_of("orders")?, Some(PageId::INVALID));
        assert!(!header.update_record("missing", PageId(1))?);
        Ok(())
    }

    #[test]
    fn reopen_sees_records() -> Result<()> {
        let pool = pool()?;
        let id = {
            let header = HeaderPage::create(Arc::clone(&pool))?;
            header.insert_record("a", PageId(1))?;
            header.insert_record("b", PageId(2))?;
            header.page_id()
        };
        let header = HeaderPage::open(pool, id)?;
        assert_eq!(
            header.records()?,
            vec![("a".to_string(), PageId(1)), ("b".to_string(), PageId(2))]
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_names_and_full_pages() -> Result<()> {
        let header = HeaderPage::create(pool()?)?;
        assert!(header.insert_record("", PageId(1)).is_err());
        assert!(header.insert_record(&"x".repeat(33), PageId(1)).is_err());
        let capacity = (256 - RECORDS_OFFSET) / RECORD_LEN;
        for i in 0..capacity {
            assert!(header.insert_record(&format!("idx{i}"), PageId(i as u64))?);
        }
        assert!(matches!(
            header.insert_record("overflow", PageId(0)),
            Err(IndexError::Invalid(_))
        ));
        Ok(())
    }
}
