//! Proptest generators for property-based testing.

use proptest::prelude::*;
use rand::Rng;
use setrecon_core::Element;
use setrecon_sync::SetDifference;

/// Two sets built from a shared core plus elements unique to each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPair {
    pub shared: Vec<u64>,
    pub client_only: Vec<u64>,
    pub server_only: Vec<u64>,
}

fn sorted_elements(values: &[u64]) -> Vec<Element> {
    let mut out: Vec<Element> = values.iter().map(|&v| Element::from_u64(v)).collect();
    out.sort();
    out
}

impl SetPair {
    /// Split distinct values into the three groups, taking the unique
    /// elements from the end.
    fn from_pool(mut pool: Vec<u64>, client_unique: usize, server_unique: usize) -> Self {
        let a = client_unique.min(pool.len());
        let client_only = pool.split_off(pool.len() - a);
        let b = server_unique.min(pool.len());
        let server_only = pool.split_off(pool.len() - b);
        Self {
            shared: pool,
            client_only,
            server_only,
        }
    }

    /// Sample a pair of `bits`-bit sets with exactly the requested sizes.
    pub fn random<R: Rng>(
        rng: &mut R,
        bits: u32,
        shared: usize,
        client_unique: usize,
        server_unique: usize,
    ) -> Self {
        let total = shared + client_unique + server_unique;
        let limit = if bits >= 64 { u64::MAX } else { 1u64 << bits };
        assert!(total as u64 <= limit, "domain too small for {} distinct values", total);
        let mut seen = std::collections::BTreeSet::new();
        while seen.len() < total {
            seen.insert(rng.gen_range(0..limit));
        }
        let mut pool: Vec<u64> = seen.into_iter().collect();
        // Unique groups come from the tail; shuffle so they are not the largest values.
        for i in (1..pool.len()).rev() {
            pool.swap(i, rng.gen_range(0..=i));
        }
        Self::from_pool(pool, client_unique, server_unique)
    }

    pub fn client(&self) -> Vec<u64> {
        [&self.shared[..], &self.client_only[..]].concat()
    }

    pub fn server(&self) -> Vec<u64> {
        [&self.shared[..], &self.server_only[..]].concat()
    }

    /// Size of the symmetric difference.
    pub fn difference(&self) -> usize {
        self.client_only.len() + self.server_only.len()
    }

    /// The sorted difference as the client should report it.
    pub fn client_view(&self) -> SetDifference {
        SetDifference {
            mine_not_theirs: sorted_elements(&self.client_only),
            theirs_not_mine: sorted_elements(&self.server_only),
        }
    }

    /// The sorted difference as the server should report it.
    pub fn server_view(&self) -> SetDifference {
        SetDifference {
            mine_not_theirs: sorted_elements(&self.server_only),
            theirs_not_mine: sorted_elements(&self.client_only),
        }
    }
}

/// Set pairs over `bits`-bit values with up to `max_shared` shared elements
/// and up to `max_unique` unique elements per side.
pub fn set_pair(bits: u32, max_shared: usize, max_unique: usize) -> impl Strategy<Value = SetPair> {
    let limit = if bits >= 64 { u64::MAX } else { 1u64 << bits };
    // Shuffled so the unique groups are not always the largest values.
    let pool = prop::collection::btree_set(0..limit, 0..=max_shared + 2 * max_unique)
        .prop_map(|set| set.into_iter().collect::<Vec<u64>>())
        .prop_shuffle();
    (pool, 0..=max_unique, 0..=max_unique)
        .prop_map(|(pool, a, b)| SetPair::from_pool(pool, a, b))
}

impl Arbitrary for SetPair {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        set_pair(16, 40, 6).boxed()
    }
}

/// Element lists with repeats drawn from a small alphabet.
pub fn multiset(max_len: usize, alphabet: u64) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0..alphabet, 0..=max_len)
}

/// Arbitrary byte-string elements, for hashed engines.
pub fn byte_elements(max_len: usize, max_count: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..=max_len), 0..=max_count)
        .prop_map(|set| set.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    proptest! {
        #[test]
        fn test_groups_are_disjoint(pair: SetPair) {
            let client = pair.client();
            for v in &pair.server_only {
                prop_assert!(!client.contains(v));
            }
            prop_assert!(pair.client_only.len() <= 6);
            prop_assert!(pair.server_only.len() <= 6);
        }

        #[test]
        fn test_views_mirror(pair in set_pair(12, 10, 4)) {
            let c = pair.client_view();
            let s = pair.server_view();
            prop_assert_eq!(c.mine_not_theirs, s.theirs_not_mine);
            prop_assert_eq!(c.theirs_not_mine, s.mine_not_theirs);
        }
    }

    #[test]
    fn test_unique_values_interleave_with_shared() {
        let mut runner = TestRunner::deterministic();
        let strategy = set_pair(16, 30, 4);
        let interleaved = (0..64).any(|_| {
            let pair = strategy.new_tree(&mut runner).unwrap().current();
            let max_shared = pair.shared.iter().max();
            let min_unique = pair.client_only.iter().chain(&pair.server_only).min();
            matches!((max_shared, min_unique), (Some(s), Some(u)) if u < s)
        });
        assert!(interleaved);
    }

    #[test]
    fn test_random_pair_sizes() {
        let mut rng = StdRng::seed_from_u64(7);
        let pair = SetPair::random(&mut rng, 20, 100, 5, 3);
        assert_eq!(pair.shared.len(), 100);
        assert_eq!(pair.difference(), 8);
        assert_eq!(pair.client().len(), 105);
    }
}
