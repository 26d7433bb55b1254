//! The shared set contract, exercised uniformly across all four variants.

use chainset::Set;
use paste::paste;

fn basic_contract(set: &impl Set<u64>) {
    assert!(set.is_empty());

    assert!(set.insert(1));
    assert!(!set.insert(1));
    assert!(set.contains(&1));
    assert!(set.remove(&1));
    assert!(!set.contains(&1));
    assert_eq!(set.len(), 0);
}

fn duplicate_laws(set: &impl Set<u64>) {
    // Add; Add yields (true, false) and a single increment.
    assert!(set.insert(7));
    assert!(!set.insert(7));
    assert_eq!(set.len(), 1);

    // Add; Remove returns to the prior membership state.
    assert!(set.insert(8));
    assert!(set.remove(&8));
    assert!(set.contains(&7));
    assert!(!set.contains(&8));
    assert_eq!(set.len(), 1);

    // Remove; Remove on an absent element yields (false, false).
    assert!(!set.remove(&9));
    assert!(!set.remove(&9));
}

fn membership_across_growth(set: &impl Set<u64>, n: u64) {
    for value in 0..n {
        assert!(set.insert(value));
    }
    assert_eq!(set.len(), n as usize);

    for value in 0..n {
        assert!(set.contains(&value));
    }
    assert!(!set.contains(&n));

    for value in (0..n).step_by(2) {
        assert!(set.remove(&value));
    }
    assert_eq!(set.len(), n as usize / 2);
    for value in 0..n {
        assert_eq!(set.contains(&value), value % 2 == 1);
    }
}

macro_rules! contract_tests {
    ($name:ident, $set:ty, $set_ctor:path) => {
        paste! {
            #[test]
            fn [<$name _basic_contract>]() {
                basic_contract(&<$set>::new(4));
            }

            #[test]
            fn [<$name _duplicate_laws>]() {
                duplicate_laws(&<$set>::new(4));
            }

            #[test]
            fn [<$name _membership_across_growth>]() {
                membership_across_growth(&<$set>::new(2), 1000);
            }

            #[test]
            fn [<$name _capacity_one_end_to_end>]() {
                let set = <$set>::new(1);
                assert_eq!(set.capacity(), 1);

                // The 5th distinct element pushes the load factor past 4.
                for value in 0..5u64 {
                    assert!(set.insert(value));
                }

                assert!(set.capacity() >= 2);
                assert_eq!(set.len(), 5);
                for value in 0..5u64 {
                    assert!(set.contains(&value));
                }
            }

            #[test]
            fn [<$name _repeated_resizes_track_growth>]() {
                let set = <$set>::new(1);
                let n = 500u64;

                for value in 0..n {
                    assert!(set.insert(value));
                }

                assert_eq!(set.len(), n as usize);
                assert!(set.capacity() >= n as usize / 5);
            }

            #[test]
            fn [<$name _works_with_ahash>]() {
                // The hasher type is inferred, so the constructor is named
                // without the default `RandomState` parameter.
                let set = $set_ctor(4, ahash::RandomState::new());
                for value in 0..100u64 {
                    assert!(set.insert(value));
                }
                assert_eq!(set.len(), 100);
                assert!(set.contains(&42u64));
            }
        }
    };
}

contract_tests!(
    unsync_set,
    chainset::unsync::HashSet<u64>,
    chainset::unsync::HashSet::with_hasher
);
contract_tests!(
    coarse_set,
    chainset::sync::CoarseHashSet<u64>,
    chainset::sync::CoarseHashSet::with_hasher
);
contract_tests!(
    striped_set,
    chainset::sync::StripedHashSet<u64>,
    chainset::sync::StripedHashSet::with_hasher
);
contract_tests!(
    refinable_set,
    chainset::sync::RefinableHashSet<u64>,
    chainset::sync::RefinableHashSet::with_hasher
);
