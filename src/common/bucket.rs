use std::{
    cell::UnsafeCell,
    hash::{BuildHasher, Hash, Hasher},
};

use smallvec::SmallVec;

/// Resize once the element count divided by the bucket count exceeds this.
pub(crate) const MAX_LOAD_FACTOR: usize = 4;

/// A collision chain. The inline capacity matches the load-factor limit, so
/// a bucket of a well-distributed table rarely spills to the heap.
pub(crate) type Bucket<T> = SmallVec<[T; 4]>;

/// A fixed-length array of buckets.
///
/// The buckets sit behind `UnsafeCell` because the concurrent variants guard
/// them with locks that live *outside* the table (a stripe array, or a single
/// coarse mutex held through `&mut`). The safe accessors require `&mut self`;
/// the unsafe ones shift the exclusivity argument to the caller's lock
/// discipline.
pub(crate) struct Table<T> {
    buckets: Box<[UnsafeCell<Bucket<T>>]>,
}

impl<T> Table<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0);

        let mut buckets = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            buckets.push(UnsafeCell::new(Bucket::new()));
        }

        Self {
            buckets: buckets.into_boxed_slice(),
        }
    }

    /// The number of buckets.
    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn bucket_index(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    pub(crate) fn bucket_mut(&mut self, index: usize) -> &mut Bucket<T> {
        self.buckets[index].get_mut()
    }

    /// # Safety
    ///
    /// The caller must hold the lock that guards bucket `index`, and no
    /// mutable access to that bucket may exist for the lifetime of the
    /// returned reference.
    pub(crate) unsafe fn bucket_unchecked(&self, index: usize) -> &Bucket<T> {
        &*self.buckets[index].get()
    }

    /// # Safety
    ///
    /// The caller must hold the lock that guards bucket `index`; the lock
    /// discipline makes this the only live reference to the bucket.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn bucket_unchecked_mut(&self, index: usize) -> &mut Bucket<T> {
        &mut *self.buckets[index].get()
    }
}

impl<T: Hash> Table<T> {
    /// Replaces `self` with a table of twice as many buckets, rehashing
    /// every element.
    pub(crate) fn grow<S: BuildHasher>(&mut self, build_hasher: &S) {
        let mut doubled = Table::with_capacity(self.len() * 2);
        // `&mut self` gives exclusive access to every bucket.
        unsafe { self.rehash_into(&mut doubled, build_hasher) };
        *self = doubled;
    }

    /// Moves every element into `target`, leaving all of `self`'s buckets
    /// empty.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to every bucket of `self`:
    /// either through `&mut self`, or by holding every stripe, or by having
    /// quiesced all stripe holders while barring new ones.
    pub(crate) unsafe fn rehash_into<S: BuildHasher>(&self, target: &mut Table<T>, build_hasher: &S) {
        for cell in self.buckets.iter() {
            let bucket = &mut *cell.get();
            for value in bucket.drain(..) {
                let index = target.bucket_index(hash_one(build_hasher, &value));
                target.bucket_mut(index).push(value);
            }
        }
    }
}

/// Hashes a single value with a fresh hasher from `build_hasher`.
pub(crate) fn hash_one<T, S>(build_hasher: &S, value: &T) -> u64
where
    T: Hash + ?Sized,
    S: BuildHasher,
{
    let mut hasher = build_hasher.build_hasher();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Appends `value` to `bucket` unless an equal element is already present.
pub(crate) fn insert_into<T: Eq>(bucket: &mut Bucket<T>, value: T) -> bool {
    if bucket.iter().any(|x| x == &value) {
        return false;
    }
    bucket.push(value);
    true
}

/// Removes the element equal to `value`, if any. Chain order is not
/// observable, so the hole is filled from the tail.
pub(crate) fn remove_from<T: Eq>(bucket: &mut Bucket<T>, value: &T) -> bool {
    match bucket.iter().position(|x| x == value) {
        Some(index) => {
            bucket.swap_remove(index);
            true
        }
        None => false,
    }
}
