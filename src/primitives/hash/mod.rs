//! Extendible hashing directory.
//!
//! The directory is an array of `2^global_depth` slots, each naming a bucket in
//! an arena. Several slots may name the same bucket; a bucket of local depth
//! `d` is named by every slot whose low `d` bits match the bucket's pattern.
//! Full buckets split one at a time and the directory doubles only when a
//! splitting bucket already uses every directory bit. Buckets are never merged
//! and depths never shrink.

use std::hash::{BuildHasher, BuildHasherDefault, Hash};

use rustc_hash::FxHasher;
use tracing::{debug, trace};

use crate::types::{IndexError, Result};

/// Default hasher for the directory.
pub type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Largest global depth the directory grows to. Beyond it, full buckets
/// absorb extra entries instead of doubling the directory again.
pub const MAX_GLOBAL_DEPTH: u32 = 24;

/// Index of a bucket in the directory's arena.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BucketId(pub usize);

struct Entry<K, V> {
    hash: u64,
    key: K,
    value: V,
}

struct Bucket<K, V> {
    local_depth: u32,
    entries: Vec<Entry<K, V>>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == *key)
    }
}

/// In-memory extendible hash table.
pub struct ExtendibleHash<K, V, S = FxBuildHasher> {
    global_depth: u32,
    bucket_capacity: usize,
    directory: Vec<BucketId>,
    buckets: Vec<Bucket<K, V>>,
    len: usize,
    hasher: S,
}

impl<K: Hash + Eq, V> ExtendibleHash<K, V> {
    /// Creates an empty table whose buckets hold `bucket_capacity` entries.
    pub fn new(bucket_capacity: usize) -> Self {
        Self::with_hasher(bucket_capacity, FxBuildHasher::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> ExtendibleHash<K, V, S> {
    /// Creates an empty table using `hasher` to place keys.
    pub fn with_hasher(bucket_capacity: usize, hasher: S) -> Self {
        let bucket_capacity = bucket_capacity.max(1);
        Self {
            global_depth: 0,
            bucket_capacity,
            directory: vec![BucketId(0)],
            buckets: vec![Bucket {
                local_depth: 0,
                entries: Vec::with_capacity(bucket_capacity),
            }],
            len: 0,
            hasher,
        }
    }

    /// Hashes `key` with the table's hasher.
    pub fn hash_key(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Number of low hash bits used to index the directory.
    pub fn global_depth(&self) -> u32 {
        self.global_depth
    }

    /// Local depth of the bucket named by directory slot `dir_index`.
    pub fn local_depth(&self, dir_index: usize) -> Option<u32> {
        self.directory
            .get(dir_index)
            .map(|bucket| self.buckets[bucket.0].local_depth)
    }

    /// Bucket named by directory slot `dir_index`.
    pub fn bucket_id(&self, dir_index: usize) -> Option<BucketId> {
        self.directory.get(dir_index).copied()
    }

    /// Number of distinct buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of directory slots (`2^global_depth`).
    pub fn directory_len(&self) -> usize {
        self.directory.len()
    }

    /// Nominal number of entries per bucket.
    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Looks up the value stored for `key`.
    pub fn find(&self, key: &K) -> Option<&V> {
        let bucket = &self.buckets[self.bucket_for(self.hash_key(key)).0];
        bucket
            .position(key)
            .map(|idx| &bucket.entries[idx].value)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Inserts `key -> value`, returning the value it replaced, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_key(&key);
        loop {
            let bucket_id = self.bucket_for(hash);
            let capacity = self.bucket_capacity;
            let bucket = &mut self.buckets[bucket_id.0];
            if let Some(idx) = bucket.position(&key) {
                return Some(std::mem::replace(&mut bucket.entries[idx].value, value));
            }
            if bucket.entries.len() < capacity || !self.can_split(bucket_id, hash) {
                self.buckets[bucket_id.0]
                    .entries
                    .push(Entry { hash, key, value });
                self.len += 1;
                return None;
            }
            self.split_bucket(bucket_id);
        }
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let bucket_id = self.bucket_for(self.hash_key(key));
        let bucket = &mut self.buckets[bucket_id.0];
        let idx = bucket.position(key)?;
        self.len -= 1;
        Some(bucket.entries.swap_remove(idx).value)
    }

    /// Checks every structural invariant of the directory.
    pub fn verify(&self) -> Result<()> {
        if self.directory.len() != 1usize << self.global_depth {
            return Err(IndexError::Corruption(
                "directory length differs from 2^global_depth",
            ));
        }
        let mut referenced = vec![0usize; self.buckets.len()];
        for (idx, bucket_id) in self.directory.iter().enumerate() {
            let bucket = self
                .buckets
                .get(bucket_id.0)
                .ok_or(IndexError::Corruption("directory slot names a missing bucket"))?;
            if bucket.local_depth > self.global_depth {
                return Err(IndexError::Corruption("local depth exceeds global depth"));
            }
            referenced[bucket_id.0] += 1;
            let mask = low_bits(bucket.local_depth);
            for entry in &bucket.entries {
                if entry.hash & mask != idx as u64 & mask {
                    return Err(IndexError::Corruption("entry stored in the wrong bucket"));
                }
            }
        }
        let mut entries = 0;
        for (bucket, count) in self.buckets.iter().zip(referenced) {
            if count != 1usize << (self.global_depth - bucket.local_depth) {
                return Err(IndexError::Corruption(
                    "bucket referenced by the wrong number of slots",
                ));
            }
            entries += bucket.entries.len();
        }
        if entries != self.len {
            return Err(IndexError::Corruption("entry count out of sync"));
        }
        Ok(())
    }

    fn bucket_for(&self, hash: u64) -> BucketId {
        self.directory[(hash & low_bits(self.global_depth)) as usize]
    }

    fn can_split(&self, bucket_id: BucketId, hash: u64) -> bool {
        let bucket = &self.buckets[bucket_id.0];
        if bucket.local_depth >= MAX_GLOBAL_DEPTH {
            return false;
        }
        bucket.entries.iter().any(|entry| entry.hash != hash)
    }

    fn split_bucket(&mut self, bucket_id: BucketId) {
        let local_depth = self.buckets[bucket_id.0].local_depth + 1;
        if local_depth > self.global_depth {
            self.grow_directory();
        }
        let split_bit = 1u64 << (local_depth - 1);
        let capacity = self.bucket_capacity;
        let old = &mut self.buckets[bucket_id.0];
        old.local_depth = local_depth;
        let (stay, moved): (Vec<_>, Vec<_>) = std::mem::take(&mut old.entries)
            .into_iter()
            .partition(|entry| entry.hash & split_bit == 0);
        old.entries = stay;
        old.entries.reserve(capacity.saturating_sub(old.entries.len()));

        let new_id = BucketId(self.buckets.len());
        let moved_count = moved.len();
        self.buckets.push(Bucket {
            local_depth,
            entries: moved,
        });
        for (idx, slot) in self.directory.iter_mut().enumerate() {
            if *slot == bucket_id && (idx as u64) & split_bit != 0 {
                *slot = new_id;
            }
        }
        trace!(
            bucket = bucket_id.0,
            new_bucket = new_id.0,
            local_depth,
            moved = moved_count,
            "hash.split_bucket"
        );
    }

    fn grow_directory(&mut self) {
        // Mirror every slot before any bucket is repointed.
        self.directory.extend_from_within(..);
        self.global_depth += 1;
        debug!(
            global_depth = self.global_depth,
            slots = self.directory.len(),
            "hash.grow_directory"
        );
    }
}

fn low_bits(depth: u32) -> u64 {
    if depth >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}
