use crate::common::bucket::{self, Table, MAX_LOAD_FACTOR};
use crate::common::stripes::StripeArray;
use crate::Set;

use std::{
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    sync::atomic::{AtomicUsize, Ordering},
};

use crossbeam_epoch::{self as epoch, Atomic, Owned};

/// A thread-safe chained hash set with a fixed array of stripe locks.
///
/// The set starts with one stripe per bucket; the stripe count then stays
/// put while the bucket count doubles on every resize, so stripe `i` guards
/// all buckets congruent to `i` modulo the stripe count. Operations on
/// elements that hash to different stripes proceed in parallel.
///
/// A resize acquires every stripe in index order, which both serializes
/// resizers against each other and waits out all in-flight single-stripe
/// operations. Because single-stripe operations hold at most one stripe and
/// the global acquisition is uniformly ordered, no deadlock is possible.
///
/// The bucket table is published through an epoch-managed pointer: readers
/// pin the epoch, lock their stripe and then load the table, and a replaced
/// (drained) table is reclaimed only after all pinned threads move on.
pub struct StripedHashSet<T, S = RandomState> {
    table: Atomic<Table<T>>,
    stripes: StripeArray,
    /// Bucket count of the current table, readable without any stripe.
    capacity: AtomicUsize,
    len: AtomicUsize,
    build_hasher: S,
}

unsafe impl<T, S> Send for StripedHashSet<T, S>
where
    T: Send,
    S: Send,
{
}

unsafe impl<T, S> Sync for StripedHashSet<T, S>
where
    T: Send + Sync,
    S: Sync,
{
}

impl<T> StripedHashSet<T, RandomState>
where
    T: Eq + Hash,
{
    /// Creates a set with `capacity` initial buckets and as many stripes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, RandomState::default())
    }
}

impl<T, S> StripedHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    /// Creates a set with `capacity` initial buckets and as many stripes,
    /// hashing elements with `build_hasher`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_hasher(capacity: usize, build_hasher: S) -> Self {
        assert!(capacity > 0);

        Self {
            table: Atomic::new(Table::with_capacity(capacity)),
            stripes: StripeArray::new(capacity),
            capacity: AtomicUsize::new(capacity),
            len: AtomicUsize::new(0),
            build_hasher,
        }
    }

    /// The current number of buckets.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn num_stripes(&self) -> usize {
        self.stripes.len()
    }

    fn hash(&self, value: &T) -> u64 {
        bucket::hash_one(&self.build_hasher, value)
    }

    /// Grows the table to `2 * old_capacity`, where `old_capacity` is the
    /// bucket count the caller observed when the load-factor policy fired.
    /// Passing the observation in keeps a stale trigger from doubling the
    /// table twice: if the capacity moved on since, the re-check below
    /// turns this call into a no-op.
    fn resize(&self, old_capacity: usize) {
        // Take every stripe in index order. This waits for in-flight
        // single-stripe operations to depart and blocks new ones.
        let guards = self.stripes.lock_all();

        if self.capacity.load(Ordering::SeqCst) != old_capacity {
            // Some other thread already grew the table.
            return;
        }

        let guard = epoch::pin();
        let old_ptr = self.table.load(Ordering::SeqCst, &guard);
        let old_table = unsafe { old_ptr.deref() };

        let new_capacity = old_capacity * 2;
        let mut new_table = Table::with_capacity(new_capacity);
        // Safety: all stripes are held, so no other thread can touch any
        // bucket of the old table.
        unsafe { old_table.rehash_into(&mut new_table, &self.build_hasher) };

        self.table.store(Owned::new(new_table), Ordering::SeqCst);
        self.capacity.store(new_capacity, Ordering::SeqCst);
        // The old table is drained; free its allocation once every thread
        // pinned before the swap has moved on.
        unsafe { guard.defer_destroy(old_ptr) };

        drop(guards);
        log::trace!(
            "striped set resized from {} to {} buckets",
            old_capacity,
            new_capacity
        );
    }
}

impl<T, S> Set<T> for StripedHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn insert(&self, value: T) -> bool {
        let hash = self.hash(&value);
        let added = {
            let guard = epoch::pin();
            let _stripe = self.stripes.lock_for(hash);
            // A held stripe blocks any resizer (which must take every
            // stripe), so this load observes the current table and the
            // table cannot be swapped out underneath us.
            let table = unsafe { self.table.load(Ordering::SeqCst, &guard).deref() };
            let index = table.bucket_index(hash);
            // Safety: we hold the stripe that guards bucket `index`.
            let bucket = unsafe { table.bucket_unchecked_mut(index) };
            if bucket::insert_into(bucket, value) {
                self.len.fetch_add(1, Ordering::SeqCst);
                true
            } else {
                false
            }
        };

        if added {
            let capacity = self.capacity.load(Ordering::SeqCst);
            if self.len.load(Ordering::SeqCst) / capacity > MAX_LOAD_FACTOR {
                self.resize(capacity);
            }
        }
        added
    }

    fn remove(&self, value: &T) -> bool {
        let hash = self.hash(value);
        let guard = epoch::pin();
        let _stripe = self.stripes.lock_for(hash);
        let table = unsafe { self.table.load(Ordering::SeqCst, &guard).deref() };

        let index = table.bucket_index(hash);
        // Safety: we hold the stripe that guards bucket `index`.
        let bucket = unsafe { table.bucket_unchecked_mut(index) };
        if bucket::remove_from(bucket, value) {
            self.len.fetch_sub(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn contains(&self, value: &T) -> bool {
        let hash = self.hash(value);
        let guard = epoch::pin();
        let _stripe = self.stripes.lock_for(hash);
        let table = unsafe { self.table.load(Ordering::SeqCst, &guard).deref() };

        let index = table.bucket_index(hash);
        // Safety: we hold the stripe that guards bucket `index`.
        unsafe { table.bucket_unchecked(index) }.contains(value)
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }
}

impl<T, S> Drop for StripedHashSet<T, S> {
    fn drop(&mut self) {
        // `&mut self` means no other thread still holds a guard into the
        // table, so it can be dropped in place of the epoch collector.
        unsafe {
            let table = self.table.load(Ordering::Relaxed, epoch::unprotected());
            if !table.is_null() {
                drop(table.into_owned());
            }
        }
    }
}

impl<T, S> fmt::Debug for StripedHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripedHashSet")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
