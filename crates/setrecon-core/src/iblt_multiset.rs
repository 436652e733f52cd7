//! IBLT variant that tracks multiplicities.
//!
//! XOR cannot tell a key inserted twice from one never inserted, so this
//! table keeps signed sums of keys and values and a checksum accumulated
//! modulo [`LARGE_PRIME`]. A cell is pure when its contents are `count`
//! copies of one key.

use num::{BigInt, BigUint, Integer, Zero};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::iblt::{
    bucket_indices, check_shape, check_value_size, key_checksum, scaled_size, InvertibleTable,
    PeelOutcome,
};

/// Modulus for accumulated key checksums.
pub const LARGE_PRIME: u64 = 982_451_653;

fn checksum(key: &BigUint) -> i128 {
    (key_checksum(key) % LARGE_PRIME) as i128
}

fn mod_prime(v: i128) -> u64 {
    v.rem_euclid(LARGE_PRIME as i128) as u64
}

/// One cell of the multiset table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisetCell {
    pub count: i64,
    pub key_sum: BigInt,
    pub key_check: u64,
    pub value_sum: BigInt,
}

impl MultisetCell {
    /// The single key and value this cell holds `count` copies of, if any.
    pub fn pure_entry(&self) -> Option<(BigUint, BigUint)> {
        if self.count == 0 {
            return None;
        }
        let count = BigInt::from(self.count);
        if !self.key_sum.is_multiple_of(&count) || !self.value_sum.is_multiple_of(&count) {
            return None;
        }
        let key = (&self.key_sum / &count).to_biguint()?;
        let value = (&self.value_sum / &count).to_biguint()?;
        let expected = mod_prime(self.count as i128 * checksum(&key));
        (expected == self.key_check).then_some((key, value))
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.key_sum.is_zero() && self.key_check == 0 && self.value_sum.is_zero()
    }
}

/// Sum-combining IBLT for multisets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbltMultiset {
    cells: Vec<MultisetCell>,
    value_size: u64,
}

impl IbltMultiset {
    /// Create an empty table with headroom of 2x `expected_entries`.
    pub fn new(expected_entries: usize, value_size: u64) -> Self {
        Self {
            cells: vec![MultisetCell::default(); scaled_size(expected_entries, 2, 1)],
            value_size,
        }
    }

    pub fn cells(&self) -> &[MultisetCell] {
        &self.cells
    }

    fn apply(&mut self, key: &BigUint, value: &BigUint, delta: i64) {
        let check = checksum(key);
        let d = BigInt::from(delta);
        let key_term = &d * BigInt::from(key.clone());
        let value_term = &d * BigInt::from(value.clone());
        for idx in bucket_indices(self.cells.len(), key) {
            let cell = &mut self.cells[idx];
            cell.count += delta;
            cell.key_sum += &key_term;
            cell.key_check = mod_prime(cell.key_check as i128 + delta as i128 * check);
            cell.value_sum += &value_term;
        }
    }
}

impl InvertibleTable for IbltMultiset {
    const COUNTS_MULTIPLICITY: bool = true;

    fn with_capacity(expected_entries: usize, value_size: u64) -> Self {
        Self::new(expected_entries, value_size)
    }

    fn insert(&mut self, key: &BigUint, value: &BigUint) -> Result<()> {
        check_value_size(value, self.value_size)?;
        self.apply(key, value, 1);
        Ok(())
    }

    fn erase(&mut self, key: &BigUint, value: &BigUint) -> Result<()> {
        check_value_size(value, self.value_size)?;
        self.apply(key, value, -1);
        Ok(())
    }

    fn subtract_assign(&mut self, other: &Self) -> Result<()> {
        check_shape(
            (self.table_size(), self.value_size),
            (other.table_size(), other.value_size),
        )?;
        for (mine, theirs) in self.cells.iter_mut().zip(&other.cells) {
            mine.count -= theirs.count;
            mine.key_sum -= &theirs.key_sum;
            mine.key_check = mod_prime(mine.key_check as i128 - theirs.key_check as i128);
            mine.value_sum -= &theirs.value_sum;
        }
        Ok(())
    }

    /// Peel one occurrence at a time, so a key with net multiplicity `n`
    /// is reported `|n|` times.
    fn list_entries(&mut self) -> PeelOutcome {
        let mut outcome = PeelOutcome::default();
        loop {
            let mut progressed = false;
            for i in 0..self.cells.len() {
                let Some((key, value)) = self.cells[i].pure_entry() else {
                    continue;
                };
                let sign = self.cells[i].count.signum();
                self.apply(&key, &value, -sign);
                if sign > 0 {
                    outcome.positive.push((key, value));
                } else {
                    outcome.negative.push((key, value));
                }
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        outcome.complete = self.cells.iter().all(MultisetCell::is_empty);
        if !outcome.complete {
            tracing::debug!(
                recovered = outcome.positive.len() + outcome.negative.len(),
                "multiset peeling stalled before the table drained"
            );
        }
        outcome
    }

    fn table_size(&self) -> usize {
        self.cells.len()
    }

    fn value_size(&self) -> u64 {
        self.value_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_duplicates_are_counted() {
        let mut a = IbltMultiset::new(10, 32);
        let mut b = IbltMultiset::new(10, 32);
        for _ in 0..3 {
            a.insert(&big(9), &big(9)).unwrap();
        }
        b.insert(&big(9), &big(9)).unwrap();
        b.insert(&big(4), &big(4)).unwrap();

        let mut diff = a.subtract(&b).unwrap();
        let outcome = diff.list_entries();
        assert!(outcome.complete);
        assert_eq!(outcome.positive, vec![(big(9), big(9)), (big(9), big(9))]);
        assert_eq!(outcome.negative, vec![(big(4), big(4))]);
    }

    #[test]
    fn test_size_is_doubled() {
        assert_eq!(IbltMultiset::new(10, 8).table_size(), 20);
    }

    #[test]
    fn test_insert_then_erase_restores_cells() {
        let mut t = IbltMultiset::new(8, 16);
        t.insert(&big(3), &big(3)).unwrap();
        let before = t.clone();
        t.insert(&big(3), &big(3)).unwrap();
        t.erase(&big(3), &big(3)).unwrap();
        assert_eq!(t, before);
    }

    #[test]
    fn test_erase_without_insert_is_negative() {
        let mut t = IbltMultiset::new(8, 16);
        t.erase(&big(12), &big(12)).unwrap();
        assert!(t.cells().iter().any(|c| c.count < 0));
        let outcome = t.list_entries();
        assert_eq!(outcome.negative, vec![(big(12), big(12))]);
    }

    #[test]
    fn test_cbor_roundtrip_preserves_contents() {
        let mut t = IbltMultiset::new(4, 16);
        t.insert(&big(1), &big(1)).unwrap();
        t.erase(&big(2), &big(2)).unwrap();
        assert_eq!(IbltMultiset::from_cbor(&t.to_cbor().unwrap()).unwrap(), t);
    }
}
