use crate::common::bucket::{self, Table, MAX_LOAD_FACTOR};
use crate::Set;

use std::{
    cell::{Cell, RefCell},
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
};

/// A chained hash set that is _not_ thread-safe.
///
/// This is the sequential baseline of the family: a plain bucket array, a
/// duplicate scan on insert, and an in-place rehash to twice the bucket
/// count whenever the load factor exceeds 4. It performs no synchronization
/// whatsoever and is `!Sync` by construction, so the compiler rejects any
/// attempt to share it across threads. Use one of the [`sync`](crate::sync)
/// variants for concurrent access.
///
/// Interior mutability (a `RefCell` around the table) lets it implement the
/// same `&self`-based [`Set`] contract as the concurrent variants, which is
/// what makes it usable as their correctness reference in tests.
///
/// # Examples
///
/// ```rust
/// use chainset::{unsync::HashSet, Set};
///
/// let set = HashSet::new(4);
/// assert!(set.insert("amber"));
/// assert!(!set.insert("amber"));
/// assert!(set.contains(&"amber"));
/// assert!(set.remove(&"amber"));
/// assert!(set.is_empty());
/// ```
pub struct HashSet<T, S = RandomState> {
    table: RefCell<Table<T>>,
    len: Cell<usize>,
    build_hasher: S,
}

impl<T> HashSet<T, RandomState>
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

impl<T, S> HashSet<T, S>
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
            table: RefCell::new(Table::with_capacity(capacity)),
            len: Cell::new(0),
            build_hasher,
        }
    }

    /// The current number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.borrow().len()
    }

    fn hash(&self, value: &T) -> u64 {
        bucket::hash_one(&self.build_hasher, value)
    }
}

impl<T, S> Set<T> for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn insert(&self, value: T) -> bool {
        let hash = self.hash(&value);
        let mut table = self.table.borrow_mut();

        let index = table.bucket_index(hash);
        if !bucket::insert_into(table.bucket_mut(index), value) {
            return false;
        }
        self.len.set(self.len.get() + 1);

        if self.len.get() / table.len() > MAX_LOAD_FACTOR {
            table.grow(&self.build_hasher);
        }
        true
    }

    fn remove(&self, value: &T) -> bool {
        let hash = self.hash(value);
        let mut table = self.table.borrow_mut();

        let index = table.bucket_index(hash);
        if bucket::remove_from(table.bucket_mut(index), value) {
            self.len.set(self.len.get() - 1);
            true
        } else {
            false
        }
    }

    fn contains(&self, value: &T) -> bool {
        let hash = self.hash(value);
        // The exclusive borrow sidesteps any unsafe bucket access; there is
        // only one thread to contend with.
        let mut table = self.table.borrow_mut();

        let index = table.bucket_index(hash);
        table.bucket_mut(index).contains(value)
    }

    fn len(&self) -> usize {
        self.len.get()
    }
}

impl<T, S> fmt::Debug for HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashSet")
            .field("len", &self.len.get())
            .field("capacity", &self.capacity())
            .finish()
    }
}
