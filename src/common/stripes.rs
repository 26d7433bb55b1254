use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

/// An array of stripe locks. Stripe `i` guards every bucket whose index is
/// congruent to `i` modulo the stripe count; because the table only ever
/// doubles, the stripe count always divides the bucket count and the stripe
/// for an element can be computed from its hash alone.
///
/// Each mutex is cache-padded so that unrelated stripes do not bounce the
/// same line between cores.
pub(crate) struct StripeArray {
    locks: Box<[CachePadded<Mutex<()>>]>,
}

impl StripeArray {
    pub(crate) fn new(len: usize) -> Self {
        assert!(len > 0);

        let mut locks = Vec::with_capacity(len);
        for _ in 0..len {
            locks.push(CachePadded::new(Mutex::new(())));
        }

        Self {
            locks: locks.into_boxed_slice(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }

    /// Locks the stripe for `hash`.
    pub(crate) fn lock_for(&self, hash: u64) -> MutexGuard<'_, ()> {
        self.locks[(hash % self.locks.len() as u64) as usize].lock()
    }

    /// Locks every stripe in index order and returns the guards. The uniform
    /// order makes concurrent full acquisitions deadlock-free.
    pub(crate) fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        self.locks.iter().map(|lock| lock.lock()).collect()
    }

    /// Acquires and immediately releases every stripe in index order,
    /// waiting out all in-flight holders. Only meaningful when the caller
    /// has already barred new holders from validating.
    pub(crate) fn quiesce(&self) {
        for lock in self.locks.iter() {
            drop(lock.lock());
        }
    }
}
