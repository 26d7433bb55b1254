use crate::common::bucket::{self, Table, MAX_LOAD_FACTOR};
use crate::Set;

use std::{
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

/// A thread-safe chained hash set protected by a single mutex.
///
/// Every operation, including the rehash, runs in one critical section under
/// the same lock, so the set is trivially deadlock-free and linearizes each
/// operation at the moment the lock is held. Throughput does not scale with
/// threads; this variant exists as the simplest correct concurrent design
/// and as a baseline for the striped ones.
///
/// An insert releases the lock before checking the resize policy and then
/// re-acquires it for the rehash, re-checking the policy under the lock:
/// of two racing inserts that both saw the load factor exceeded, only the
/// first to re-acquire performs the rehash.
pub struct CoarseHashSet<T, S = RandomState> {
    table: Mutex<Table<T>>,
    /// Bucket count of `table`, readable without the lock.
    capacity: AtomicUsize,
    len: AtomicUsize,
    build_hasher: S,
}

impl<T> CoarseHashSet<T, RandomState>
where
    T: Eq + Hash,
{
    /// Creates a set with `capacity` initial buckets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, RandomState::default())
    }
}

impl<T, S> CoarseHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    /// Creates a set with `capacity` initial buckets, hashing elements with
    /// `build_hasher`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_hasher(capacity: usize, build_hasher: S) -> Self {
        assert!(capacity > 0);

        Self {
            table: Mutex::new(Table::with_capacity(capacity)),
            capacity: AtomicUsize::new(capacity),
            len: AtomicUsize::new(0),
            build_hasher,
        }
    }

    /// The current number of buckets.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    fn hash(&self, value: &T) -> u64 {
        bucket::hash_one(&self.build_hasher, value)
    }

    fn needs_resize(&self) -> bool {
        self.len.load(Ordering::SeqCst) / self.capacity.load(Ordering::SeqCst) > MAX_LOAD_FACTOR
    }

    fn resize(&self) {
        let mut table = self.table.lock();

        // Re-check under the lock: a racing insert may have already grown
        // the table, in which case this trigger is stale.
        if self.len.load(Ordering::SeqCst) / table.len() <= MAX_LOAD_FACTOR {
            return;
        }

        let old_capacity = table.len();
        table.grow(&self.build_hasher);
        self.capacity.store(table.len(), Ordering::SeqCst);
        log::trace!(
            "coarse set resized from {} to {} buckets",
            old_capacity,
            table.len()
        );
    }
}

impl<T, S> Set<T> for CoarseHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn insert(&self, value: T) -> bool {
        let hash = self.hash(&value);
        let added = {
            let mut table = self.table.lock();
            let index = table.bucket_index(hash);
            if bucket::insert_into(table.bucket_mut(index), value) {
                self.len.fetch_add(1, Ordering::SeqCst);
                true
            } else {
                false
            }
        };

        if added && self.needs_resize() {
            self.resize();
        }
        added
    }

    fn remove(&self, value: &T) -> bool {
        let hash = self.hash(value);
        let mut table = self.table.lock();

        let index = table.bucket_index(hash);
        if bucket::remove_from(table.bucket_mut(index), value) {
            self.len.fetch_sub(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn contains(&self, value: &T) -> bool {
        let hash = self.hash(value);
        let mut table = self.table.lock();

        let index = table.bucket_index(hash);
        table.bucket_mut(index).contains(value)
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }
}

impl<T, S> fmt::Debug for CoarseHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoarseHashSet")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
