#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

//! A family of concurrent closed-addressing (chained) hash sets.
//!
//! All variants store elements in collision chains ("buckets") selected by
//! `hash(e) mod B`, where `B` is the current bucket count, and double the
//! table whenever the load factor `n / B` exceeds 4. They differ only in how
//! readers, writers and resizers synchronize:
//!
//! - [`unsync::HashSet`] — no synchronization at all. The single-threaded
//!   baseline and the correctness reference for the concurrent variants.
//! - [`sync::CoarseHashSet`] — one global mutex serializes every operation
//!   and the resize.
//! - [`sync::StripedHashSet`] — a fixed array of stripe locks, each guarding
//!   the buckets that map to it. The stripe count never changes, so the lock
//!   array is cheap but contention grows with the table.
//! - [`sync::RefinableHashSet`] — the stripe array itself is replaced on
//!   every resize, keeping one stripe per bucket. Resizes are coordinated
//!   through an atomic owner token and an optimistic lock-then-validate
//!   acquire.
//!
//! `insert`, `remove` and `contains` are linearizable on every thread-safe
//! variant. `len` on the striped and refinable variants is an atomically
//! loaded snapshot rather than a linearization-point quantity; see the trait
//! documentation.
//!
//! # Example
//!
//! ```rust
//! use chainset::{sync::StripedHashSet, Set};
//! use std::sync::Arc;
//!
//! let set = Arc::new(StripedHashSet::new(16));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let set = Arc::clone(&set);
//!         std::thread::spawn(move || {
//!             for i in (t * 100)..(t * 100 + 100) {
//!                 assert!(set.insert(i));
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! assert_eq!(set.len(), 400);
//! assert!(set.contains(&123));
//! ```
//!
//! # Hashing
//!
//! Each set is generic over a [`BuildHasher`](std::hash::BuildHasher) and
//! defaults to the standard library's `RandomState`. Use the `with_hasher`
//! constructors to supply a different provider, e.g. `ahash` for small keys,
//! or a degenerate hasher in tests to force collision chains.

mod common;
pub mod sync;
pub mod unsync;

/// The operations shared by every set variant.
///
/// All methods take `&self`; the thread-safe implementors rely on locks and
/// atomics internally, while [`unsync::HashSet`] uses single-threaded
/// interior mutability and is `!Sync` by construction.
///
/// Implementations are linearizable with respect to a sequential set: any
/// concurrent history of `insert` / `remove` / `contains` calls is
/// equivalent to some total order that respects real-time precedence. The
/// one deliberate exception is [`len`](Set::len) on the striped and
/// refinable variants, which reports an atomically loaded snapshot of the
/// element count without acquiring any stripe.
pub trait Set<T> {
    /// Adds `value` to the set.
    ///
    /// Returns `true` if `value` was absent, and `false` otherwise.
    fn insert(&self, value: T) -> bool;

    /// Removes `value` from the set.
    ///
    /// Returns `true` if `value` was present, and `false` otherwise.
    fn remove(&self, value: &T) -> bool;

    /// Returns `true` if `value` is present in the set.
    fn contains(&self, value: &T) -> bool;

    /// Returns the number of elements in the set.
    fn len(&self) -> usize;

    /// Returns `true` if the set holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
