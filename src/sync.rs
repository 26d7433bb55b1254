//! Thread-safe hash set variants, ordered by how fine their locking is:
//! one global mutex, a fixed stripe array, and a stripe array that grows
//! with the table.

mod coarse;
mod refinable;
mod striped;

pub use coarse::CoarseHashSet;
pub use refinable::RefinableHashSet;
pub use striped::StripedHashSet;
