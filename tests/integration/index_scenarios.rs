#![allow(missing_docs)]

use std::hash::{BuildHasherDefault, Hasher};
use std::sync::Arc;

use pageindex::{
    primitives::pager::{BufferManager, BufferPool, BufferPoolOptions},
    storage::btree::{BPlusTree, BPlusTreeOptions, OrdComparator},
    storage::header::{HeaderPage, RootRegistry},
    types::{page::DEFAULT_PAGE_SIZE, PageId, Result},
    ExtendibleHash, FileDisk, MemDisk,
};
use tempfile::tempdir;

/// Hashes a `u64` to itself so bucket placement follows the key's low bits.
#[derive(Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 = (self.0 << 8) | u64::from(*byte);
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.0 = value;
    }
}

type LowBits = BuildHasherDefault<IdentityHasher>;

struct Fixture {
    pool: Arc<BufferPool>,
    registry: Arc<HeaderPage>,
    tree: BPlusTree<i64, i64>,
}

fn fixture(max_size: usize) -> Result<Fixture> {
    let pool = BufferPool::shared(
        MemDisk::new(DEFAULT_PAGE_SIZE)?,
        BufferPoolOptions::default(),
    )?;
    let registry = Arc::new(HeaderPage::create(pool.clone())?);
    let tree = BPlusTree::open(
        "ordered",
        pool.clone(),
        registry.clone(),
        OrdComparator,
        BPlusTreeOptions {
            leaf_max_size: Some(max_size),
            internal_max_size: Some(max_size),
        },
    )?;
    Ok(Fixture {
        pool,
        registry,
        tree,
    })
}

#[test]
fn ascending_inserts_split_and_stay_findable() -> Result<()> {
    let mut fx = fixture(4)?;
    assert_eq!(fx.registry.root_of("ordered")?, None);

    fx.tree.insert(&1, &100)?;
    assert!(fx.tree.root_page_id().is_valid());
    assert_eq!(
        fx.registry.root_of("ordered")?,
        Some(fx.tree.root_page_id())
    );

    let mut split_at = Vec::new();
    for key in 2..=100i64 {
        let before = fx.tree.stats().leaf_splits();
        assert!(fx.tree.insert(&key, &(key * 100))?);
        if fx.tree.stats().leaf_splits() > before {
            split_at.push(key);
        }
    }
    assert_eq!(split_at.first(), Some(&5));

    for key in 1..=100i64 {
        assert_eq!(fx.tree.get_value(&key)?, Some(key * 100));
    }
    assert_eq!(fx.tree.get_value(&101)?, None);
    assert_eq!(fx.tree.check_integrity()?.entries, 100);
    assert_eq!(fx.pool.pinned_frames(), 0);
    Ok(())
}

#[test]
fn duplicate_insert_leaves_tree_unchanged() -> Result<()> {
    let mut fx = fixture(4)?;
    for key in [1i64, 2, 3] {
        assert!(fx.tree.insert(&key, &(key * 11))?);
    }
    let before = fx.tree.dump(true)?;
    assert!(!fx.tree.insert(&2, &-1)?);
    assert_eq!(fx.tree.dump(true)?, before);
    assert_eq!(fx.tree.get_value(&2)?, Some(22));
    Ok(())
}

#[test]
fn removing_down_to_one_key_leaves_a_single_leaf_root() -> Result<()> {
    let mut fx = fixture(4)?;
    fx.tree.insert_keys(1..=20)?;
    fx.tree.remove_keys(1..=19)?;

    let summary = fx.tree.check_integrity()?;
    assert_eq!((summary.height, summary.leaf_pages, summary.entries), (1, 1, 1));
    assert_eq!(fx.tree.dump(false)?, "[20]\n");
    assert_eq!(fx.tree.get_value(&20)?, Some(20));

    // emptying the tree resets the registry too
    assert!(fx.tree.remove(&20)?);
    assert_eq!(fx.tree.root_page_id(), PageId::INVALID);
    assert_eq!(fx.registry.root_of("ordered")?, Some(PageId::INVALID));
    assert_eq!(fx.pool.pinned_frames(), 0);
    Ok(())
}

#[test]
fn directory_splits_on_low_hash_bits() -> Result<()> {
    let mut table: ExtendibleHash<u64, &str, LowBits> =
        ExtendibleHash::with_hasher(2, LowBits::default());
    for (key, value) in [(0b00u64, "a"), (0b01, "b"), (0b10, "c"), (0b11, "d")] {
        assert_eq!(table.insert(key, value), None);
    }
    table.verify()?;
    // one split on bit 0 leaves two buckets of two entries each
    assert_eq!(table.global_depth(), 1);
    assert_eq!(table.bucket_count(), 2);
    assert_eq!(table.local_depth(0), Some(1));
    assert_eq!(table.local_depth(1), Some(1));
    assert_eq!(table.len(), 4);
    assert_eq!(table.find(&0b10), Some(&"c"));
    assert_eq!(table.find(&0b100), None);

    // overflowing both buckets brings in bit 1
    table.insert(0b100, "e");
    table.insert(0b101, "f");
    table.verify()?;
    assert_eq!(table.global_depth(), 2);
    assert_eq!(table.bucket_count(), 4);
    for slot in 0..4 {
        assert_eq!(table.local_depth(slot), Some(2));
    }
    Ok(())
}

#[test]
fn removing_a_missing_key_changes_nothing() -> Result<()> {
    let mut fx = fixture(4)?;
    fx.tree.insert_keys((0..40).map(|k| k * 5))?;
    let before = fx.tree.dump(true)?;
    assert!(!fx.tree.remove(&3)?);
    assert_eq!(fx.tree.dump(true)?, before);
    for key in (0..40).map(|k| k * 5) {
        assert_eq!(fx.tree.get_value(&key)?, Some(key));
    }
    Ok(())
}

#[test]
fn two_indexes_share_one_registry_and_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("shared.idx");
    let options = BPlusTreeOptions {
        leaf_max_size: Some(6),
        internal_max_size: Some(6),
    };
    let header = {
        let pool = BufferPool::shared(FileDisk::open(&path, 1024)?, BufferPoolOptions::default())?;
        let registry = Arc::new(HeaderPage::create(pool.clone())?);
        let mut evens: BPlusTree<i64, i64> = BPlusTree::open(
            "evens",
            pool.clone(),
            registry.clone(),
            OrdComparator,
            options.clone(),
        )?;
        let mut odds: BPlusTree<i64, i64> = BPlusTree::open(
            "odds",
            pool.clone(),
            registry.clone(),
            OrdComparator,
            options.clone(),
        )?;
        evens.insert_keys((0..100).map(|k| k * 2))?;
        odds.insert_keys((0..100).map(|k| k * 2 + 1))?;
        pool.flush_all()?;
        registry.page_id()
    };

    let pool = BufferPool::shared(FileDisk::open(&path, 1024)?, BufferPoolOptions::default())?;
    let registry = Arc::new(HeaderPage::open(pool.clone(), header)?);
    let names: Vec<String> = registry.records()?.into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["evens", "odds"]);
    let odds: BPlusTree<i64, i64> =
        BPlusTree::open("odds", pool.clone(), registry, OrdComparator, options)?;
    assert_eq!(odds.get_value(&51)?, Some(51));
    assert_eq!(odds.get_value(&50)?, None);
    assert_eq!(odds.iter()?.count(), 100);
    Ok(())
}
