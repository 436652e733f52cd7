//! Invertible Bloom Lookup Tables.
//!
//! A table of `N_HASH`-way partitioned cells supporting insertion, erasure,
//! cell-wise subtraction and recovery of the net contents by peeling. The
//! set variant here combines keys with XOR; see [`crate::iblt_multiset`]
//! for the variant that tracks multiplicities.
//!
//! Cell updates are commutative group operations, so a table's state is
//! independent of the order its insertions and erasures were applied in.

use num::{BigUint, Zero};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::hash::{hash_u64, BUCKET_DOMAIN, CHECK_DOMAIN};

/// Number of cells each key maps to, one per table partition.
pub const N_HASH: usize = 4;

/// Seed for the key checksum hash.
pub const N_HASHCHECK: u64 = 11;

/// A recovered `(key, value)` pair.
pub type Entry = (BigUint, BigUint);

/// Result of peeling a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeelOutcome {
    /// Entries with net positive presence (inserted into the minuend).
    pub positive: Vec<Entry>,
    /// Entries with net negative presence (inserted into the subtrahend).
    pub negative: Vec<Entry>,
    /// True when the table drained completely.
    pub complete: bool,
}

/// Result of a point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(BigUint),
    Absent,
    /// The table is too full to decide.
    Unknown,
}

/// Operations shared by the set and multiset tables.
pub trait InvertibleTable:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Whether repeated insertions of one key are distinguishable.
    const COUNTS_MULTIPLICITY: bool;

    /// Create an empty table sized for `expected_entries` net differences.
    fn with_capacity(expected_entries: usize, value_size: u64) -> Self;

    fn insert(&mut self, key: &BigUint, value: &BigUint) -> Result<()>;

    /// Remove a previously inserted pair.
    ///
    /// No membership check is made: erasing a pair that was never inserted
    /// leaves the table describing a negative occurrence of it. Callers
    /// track membership themselves.
    fn erase(&mut self, key: &BigUint, value: &BigUint) -> Result<()>;

    /// Cell-wise `self -= other`. Both tables must share size and value size.
    fn subtract_assign(&mut self, other: &Self) -> Result<()>;

    /// Peel the table, consuming its contents.
    fn list_entries(&mut self) -> PeelOutcome;

    /// Number of cells.
    fn table_size(&self) -> usize;

    /// Maximum value width in bits.
    fn value_size(&self) -> u64;

    /// `self - other` as a new table.
    fn subtract(&self, other: &Self) -> Result<Self> {
        let mut out = self.clone();
        out.subtract_assign(other)?;
        Ok(out)
    }

    /// Encode as CBOR.
    fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR.
    fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let table: Self =
            ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        if table.table_size() == 0 || table.table_size() % N_HASH != 0 {
            return Err(CoreError::DecodingError(format!(
                "table size {} is not a positive multiple of {}",
                table.table_size(),
                N_HASH
            )));
        }
        Ok(table)
    }
}

/// Cell count for a table of `expected` entries scaled by `num/den`,
/// rounded up to a multiple of [`N_HASH`].
pub(crate) fn scaled_size(expected: usize, num: usize, den: usize) -> usize {
    let raw = (expected * num + den - 1) / den;
    let rounded = (raw + N_HASH - 1) / N_HASH * N_HASH;
    rounded.max(N_HASH)
}

/// The cell indices `key` maps to, one in each partition.
pub(crate) fn bucket_indices(table_size: usize, key: &BigUint) -> [usize; N_HASH] {
    let per = (table_size / N_HASH).max(1) as u64;
    let bytes = key.to_bytes_be();
    let mut out = [0usize; N_HASH];
    for (i, slot) in out.iter_mut().enumerate() {
        let h = hash_u64(BUCKET_DOMAIN, i as u64, &bytes);
        *slot = i * per as usize + (h % per) as usize;
    }
    out
}

pub(crate) fn key_checksum(key: &BigUint) -> u64 {
    hash_u64(CHECK_DOMAIN, N_HASHCHECK, &key.to_bytes_be())
}

pub(crate) fn check_value_size(value: &BigUint, value_size: u64) -> Result<()> {
    if value.bits() > value_size {
        return Err(CoreError::ValueTooLarge {
            bits: value.bits(),
            max: value_size,
        });
    }
    Ok(())
}

pub(crate) fn check_shape(
    lhs: (usize, u64),
    rhs: (usize, u64),
) -> Result<()> {
    if lhs.0 != rhs.0 {
        return Err(CoreError::TableMismatch(format!(
            "table sizes differ: {} vs {}",
            lhs.0, rhs.0
        )));
    }
    if lhs.1 != rhs.1 {
        return Err(CoreError::TableMismatch(format!(
            "value sizes differ: {} vs {}",
            lhs.1, rhs.1
        )));
    }
    Ok(())
}

/// One cell of the set table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub count: i64,
    pub key_sum: BigUint,
    pub key_check: u64,
    pub value_sum: BigUint,
}

impl Cell {
    /// Exactly one net key is present.
    pub fn is_pure(&self) -> bool {
        (self.count == 1 || self.count == -1) && self.key_check == key_checksum(&self.key_sum)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.key_sum.is_zero() && self.key_check == 0 && self.value_sum.is_zero()
    }
}

/// XOR-combining IBLT for sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iblt {
    cells: Vec<Cell>,
    value_size: u64,
}

impl Iblt {
    /// Create an empty table with headroom of 1.5x `expected_entries`.
    pub fn new(expected_entries: usize, value_size: u64) -> Self {
        Self {
            cells: vec![Cell::default(); scaled_size(expected_entries, 3, 2)],
            value_size,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn apply(&mut self, key: &BigUint, value: &BigUint, delta: i64) {
        let check = key_checksum(key);
        for idx in bucket_indices(self.cells.len(), key) {
            let cell = &mut self.cells[idx];
            cell.count += delta;
            cell.key_sum ^= key;
            cell.key_check ^= check;
            cell.value_sum ^= value;
        }
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: &BigUint) -> Lookup {
        for idx in bucket_indices(self.cells.len(), key) {
            let cell = &self.cells[idx];
            if cell.is_empty() {
                return Lookup::Absent;
            }
            if cell.is_pure() && &cell.key_sum == key {
                return Lookup::Found(cell.value_sum.clone());
            }
        }

        let mut scratch = self.clone();
        let outcome = scratch.list_entries();
        if let Some((_, v)) = outcome.positive.iter().find(|(k, _)| k == key) {
            return Lookup::Found(v.clone());
        }
        if outcome.complete {
            Lookup::Absent
        } else {
            Lookup::Unknown
        }
    }
}

impl InvertibleTable for Iblt {
    const COUNTS_MULTIPLICITY: bool = false;

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
            mine.key_sum ^= &theirs.key_sum;
            mine.key_check ^= theirs.key_check;
            mine.value_sum ^= &theirs.value_sum;
        }
        Ok(())
    }

    fn list_entries(&mut self) -> PeelOutcome {
        let mut outcome = PeelOutcome::default();
        loop {
            let mut progressed = false;
            for i in 0..self.cells.len() {
                if !self.cells[i].is_pure() {
                    continue;
                }
                let Cell {
                    count,
                    key_sum,
                    value_sum,
                    ..
                } = self.cells[i].clone();
                self.apply(&key_sum, &value_sum, -count);
                if count == 1 {
                    outcome.positive.push((key_sum, value_sum));
                } else {
                    outcome.negative.push((key_sum, value_sum));
                }
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        outcome.complete = self.cells.iter().all(Cell::is_empty);
        if !outcome.complete {
            tracing::debug!(
                recovered = outcome.positive.len() + outcome.negative.len(),
                "peeling stalled before the table drained"
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
