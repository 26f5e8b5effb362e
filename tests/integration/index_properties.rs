#![allow(missing_docs)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use pageindex::{
    primitives::pager::{BufferPool, BufferPoolOptions},
    storage::btree::{BPlusTree, BPlusTreeOptions, OrdComparator},
    storage::header::HeaderPage,
    ExtendibleHash, MemDisk,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert(u16, u32),
    Remove(u16),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<u16>(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k % 512, v)),
        2 => any::<u16>().prop_map(|k| Op::Remove(k % 512)),
    ]
}

fn small_tree(
    leaf_max: usize,
    internal_max: usize,
    pool_size: usize,
) -> (Arc<BufferPool>, BPlusTree<u64, u64>) {
    let pool = BufferPool::shared(
        MemDisk::new(512).expect("disk"),
        BufferPoolOptions {
            pool_size,
            page_table_bucket_size: 4,
        },
    )
    .expect("pool");
    let registry = Arc::new(HeaderPage::create(pool.clone()).expect("header"));
    let tree = BPlusTree::open(
        "prop",
        pool.clone(),
        registry,
        OrdComparator,
        BPlusTreeOptions {
            leaf_max_size: Some(leaf_max),
            internal_max_size: Some(internal_max),
        },
    )
    .expect("tree");
    (pool, tree)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tree_matches_btreemap(
        ops in prop::collection::vec(arb_op(), 1..400),
        leaf_max in 2usize..8,
        internal_max in 3usize..8,
    ) {
        let (pool, mut tree) = small_tree(leaf_max, internal_max, 32);
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let (key, value) = (u64::from(k), u64::from(v));
                    let fresh = !model.contains_key(&key);
                    prop_assert_eq!(tree.insert(&key, &value).expect("insert"), fresh);
                    model.entry(key).or_insert(value);
                }
                Op::Remove(k) => {
                    let key = u64::from(k);
                    prop_assert_eq!(tree.remove(&key).expect("remove"), model.remove(&key).is_some());
                }
            }
        }

        let summary = tree.check_integrity().expect("integrity");
        prop_assert_eq!(summary.entries, model.len());
        let scanned: Vec<(u64, u64)> = tree
            .iter()
            .expect("iter")
            .collect::<Result<_, _>>()
            .expect("scan");
        prop_assert_eq!(scanned, model.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>());
        prop_assert_eq!(pool.pinned_frames(), 0);
    }

    #[test]
    fn iter_from_starts_at_lower_bound(
        keys in prop::collection::btree_set(0u64..10_000, 0..300),
        probe in 0u64..10_000,
    ) {
        let (_pool, mut tree) = small_tree(4, 4, 32);
        for key in &keys {
            tree.insert(key, &(key + 1)).expect("insert");
        }
        let expected: Vec<u64> = keys.range(probe..).copied().collect();
        let found: Vec<u64> = tree
            .iter_from(&probe)
            .expect("iter_from")
            .map(|item| item.map(|(k, _)| k))
            .collect::<Result<_, _>>()
            .expect("scan");
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn directory_matches_hashmap(
        ops in prop::collection::vec((any::<bool>(), 0u32..256, any::<u32>()), 1..500),
        capacity in 1usize..6,
    ) {
        let mut table: ExtendibleHash<u32, u32> = ExtendibleHash::new(capacity);
        let mut model = HashMap::new();
        for (insert, key, value) in ops {
            if insert {
                prop_assert_eq!(table.insert(key, value), model.insert(key, value));
            } else {
                prop_assert_eq!(table.remove(&key), model.remove(&key));
            }
        }
        table.verify().expect("verify");
        prop_assert_eq!(table.len(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(table.find(key), Some(value));
        }
    }
}
