use crate::common::bucket::{self, Table, MAX_LOAD_FACTOR};
use crate::common::owner_token::OwnerToken;
use crate::common::stripes::StripeArray;
use crate::Set;

use std::{
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    sync::atomic::{AtomicUsize, Ordering},
};

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned};
use crossbeam_utils::Backoff;
use parking_lot::MutexGuard;

/// A thread-safe chained hash set whose stripe array grows with the table.
///
/// The striped variant keeps its lock array at the initial size forever, so
/// after a few doublings many buckets share each stripe. This variant
/// *refines* the striping instead: every resize installs a fresh stripe
/// array as long as the new table, keeping one stripe per bucket at all
/// externally observable points.
///
/// Replacing the stripe array creates a second coordination problem on top
/// of the table swap: a thread may pick its stripe from one array and, by
/// the time the lock is granted, find that a resizer has already swapped in
/// another. Two mechanisms resolve this:
///
/// - An **owner token**, a `(thread, mark)` pair under a single atomic word.
///   A resizer claims it with one compare-and-swap; while it is marked,
///   other threads neither lock stripes nor trust locks they just obtained.
/// - An **optimistic acquire**: lock the stripe picked from a snapshot of
///   the stripe array, then validate that no foreign resize is marked and
///   the array has not been replaced. On validation failure, unlock and
///   retry from the top.
///
/// Once `acquire` returns, any resizer must wait for that holder to release
/// (its quiesce pass blocks on the held stripe), so validated operations run
/// against a stable table. Old stripe arrays and drained tables are
/// reclaimed through the epoch collector once all snapshotting threads have
/// unpinned, so a validation-failed unlock can never touch freed memory.
pub struct RefinableHashSet<T, S = RandomState> {
    table: Atomic<Table<T>>,
    stripes: Atomic<StripeArray>,
    owner: OwnerToken,
    /// Bucket count of the current table, readable without any stripe.
    capacity: AtomicUsize,
    len: AtomicUsize,
    build_hasher: S,
}

unsafe impl<T, S> Send for RefinableHashSet<T, S>
where
    T: Send,
    S: Send,
{
}

unsafe impl<T, S> Sync for RefinableHashSet<T, S>
where
    T: Send + Sync,
    S: Sync,
{
}

impl<T> RefinableHashSet<T, RandomState>
where
    T: Eq + Hash,
{
    /// Creates a set with `capacity` initial buckets and one stripe per
    /// bucket.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, RandomState::default())
    }
}

impl<T, S> RefinableHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    /// Creates a set with `capacity` initial buckets and one stripe per
    /// bucket, hashing elements with `build_hasher`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_hasher(capacity: usize, build_hasher: S) -> Self {
        assert!(capacity > 0);

        Self {
            table: Atomic::new(Table::with_capacity(capacity)),
            stripes: Atomic::new(StripeArray::new(capacity)),
            owner: OwnerToken::new(),
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
        let guard = epoch::pin();
        unsafe { self.stripes.load(Ordering::SeqCst, &guard).deref() }.len()
    }

    fn hash(&self, value: &T) -> u64 {
        bucket::hash_one(&self.build_hasher, value)
    }

    /// Locks the stripe for `hash` on the current stripe array.
    ///
    /// Optimistic with validation: lock first against a snapshot, then
    /// confirm that no other thread has a resize marked and that the stripe
    /// array was not replaced while we were blocking on the lock. Either
    /// condition means the lock we hold may not exclude anyone, so it is
    /// released and the whole sequence restarts.
    fn acquire<'g>(&self, hash: u64, guard: &'g Guard) -> MutexGuard<'g, ()> {
        let backoff = Backoff::new();
        loop {
            // Wait out a resize owned by another thread before touching the
            // stripes at all.
            while self.owner.is_held_by_other() {
                backoff.snooze();
            }

            let stripes_ptr = self.stripes.load(Ordering::SeqCst, guard);
            let stripes = unsafe { stripes_ptr.deref() };
            let stripe = stripes.lock_for(hash);

            if !self.owner.is_held_by_other()
                && self.stripes.load(Ordering::SeqCst, guard) == stripes_ptr
            {
                // The lock is on the live stripe array and no resize can
                // now replace it until we release.
                return stripe;
            }

            drop(stripe);
            backoff.spin();
        }
    }

    /// Grows the table and the stripe array to `2 * old_capacity`, where
    /// `old_capacity` is the bucket count the caller observed when the
    /// load-factor policy fired. A stale observation turns this into a
    /// no-op rather than a second doubling.
    fn resize(&self, old_capacity: usize) {
        // Single-winner: whoever claims the token performs the resize. A
        // loser just returns; its trigger is satisfied by the winner.
        if !self.owner.try_acquire() {
            return;
        }

        if self.capacity.load(Ordering::SeqCst) != old_capacity {
            // A resize completed between the policy check and the claim.
            self.owner.release();
            return;
        }

        let guard = epoch::pin();

        // From here on no new holder can validate: anyone entering
        // `acquire` sees the mark and spins. Quiescing drains the holders
        // that validated before the claim.
        let stripes_ptr = self.stripes.load(Ordering::SeqCst, &guard);
        unsafe { stripes_ptr.deref() }.quiesce();

        let new_capacity = old_capacity * 2;

        // Install the refined stripe array first; the table follows while
        // the mark still bars every other thread.
        self.stripes
            .store(Owned::new(StripeArray::new(new_capacity)), Ordering::SeqCst);
        unsafe { guard.defer_destroy(stripes_ptr) };

        let old_ptr = self.table.load(Ordering::SeqCst, &guard);
        let old_table = unsafe { old_ptr.deref() };
        let mut new_table = Table::with_capacity(new_capacity);
        // Safety: every pre-claim holder has departed and post-claim
        // threads spin on the mark, so this thread is alone in the table.
        unsafe { old_table.rehash_into(&mut new_table, &self.build_hasher) };

        self.table.store(Owned::new(new_table), Ordering::SeqCst);
        self.capacity.store(new_capacity, Ordering::SeqCst);
        unsafe { guard.defer_destroy(old_ptr) };

        self.owner.release();
        log::trace!(
            "refinable set resized from {} to {} buckets and stripes",
            old_capacity,
            new_capacity
        );
    }
}

impl<T, S> Set<T> for RefinableHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn insert(&self, value: T) -> bool {
        let hash = self.hash(&value);
        let added = {
            let guard = epoch::pin();
            let _stripe = self.acquire(hash, &guard);
            // A validated stripe blocks the resizer's quiesce pass, so the
            // table cannot be replaced until we release.
            let table = unsafe { self.table.load(Ordering::SeqCst, &guard).deref() };
            let index = table.bucket_index(hash);
            // Safety: the validated stripe guards bucket `index`.
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
        let _stripe = self.acquire(hash, &guard);
        let table = unsafe { self.table.load(Ordering::SeqCst, &guard).deref() };

        let index = table.bucket_index(hash);
        // Safety: the validated stripe guards bucket `index`.
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
        let _stripe = self.acquire(hash, &guard);
        let table = unsafe { self.table.load(Ordering::SeqCst, &guard).deref() };

        let index = table.bucket_index(hash);
        // Safety: the validated stripe guards bucket `index`.
        unsafe { table.bucket_unchecked(index) }.contains(value)
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }
}

impl<T, S> Drop for RefinableHashSet<T, S> {
    fn drop(&mut self) {
        // `&mut self` means no thread is pinned inside this set any more,
        // so both arrays can be dropped in place of the epoch collector.
        unsafe {
            let guard = epoch::unprotected();
            let table = self.table.load(Ordering::Relaxed, guard);
            if !table.is_null() {
                drop(table.into_owned());
            }
            let stripes = self.stripes.load(Ordering::Relaxed, guard);
            if !stripes.is_null() {
                drop(stripes.into_owned());
            }
        }
    }
}

impl<T, S> fmt::Debug for RefinableHashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefinableHashSet")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
