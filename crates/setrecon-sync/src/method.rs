//! The synchronization method contract shared by every engine.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use setrecon_channel::Channel;
use setrecon_core::Element;

use crate::error::Result;

/// Flag byte: the step failed.
pub const SYNC_FAIL_FLAG: u8 = 0;
/// Flag byte: the step succeeded.
pub const SYNC_OK_FLAG: u8 = 1;
/// Flag byte: the sender holds elements at this point of the protocol.
pub const SYNC_SOME_INFO: u8 = 2;
/// Flag byte: the sender holds nothing at this point of the protocol.
pub const SYNC_NO_INFO: u8 = 3;

/// Wire identifier of an engine type, sent first in every parameter handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProtocolId {
    CpiSync = 1,
    CpiSyncHalfRound = 2,
    InteractiveCpiSync = 6,
    FullSync = 9,
    IbltSync = 10,
    IbltSyncHalfRound = 11,
    IbltSyncMultiset = 12,
    ProbCpiSync = 13,
}

impl ProtocolId {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::CpiSync),
            2 => Some(Self::CpiSyncHalfRound),
            6 => Some(Self::InteractiveCpiSync),
            9 => Some(Self::FullSync),
            10 => Some(Self::IbltSync),
            11 => Some(Self::IbltSyncHalfRound),
            12 => Some(Self::IbltSyncMultiset),
            13 => Some(Self::ProbCpiSync),
            _ => None,
        }
    }
}

/// The two output lists of a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDifference {
    /// Elements held locally that the peer lacks.
    pub mine_not_theirs: Vec<Element>,
    /// Elements the peer holds that are missing locally.
    pub theirs_not_mine: Vec<Element>,
}

impl SetDifference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.mine_not_theirs.is_empty() && self.theirs_not_mine.is_empty()
    }

    /// Total number of differing elements.
    pub fn len(&self) -> usize {
        self.mine_not_theirs.len() + self.theirs_not_mine.len()
    }

    pub fn extend(&mut self, other: SetDifference) {
        self.mine_not_theirs.extend(other.mine_not_theirs);
        self.theirs_not_mine.extend(other.theirs_not_mine);
    }

    /// Sort both lists, for order-insensitive comparison.
    pub fn sorted(mut self) -> Self {
        self.mine_not_theirs.sort();
        self.theirs_not_mine.sort();
        self
    }
}

/// A set reconciliation engine.
///
/// Engines own their element store. `sync_client` and `sync_server` run the
/// two roles of one protocol session over a channel and append what they
/// learn to `diff`; they never modify the store themselves.
#[async_trait]
pub trait SyncMethod: Send {
    /// Add an element to the local store.
    fn add_elem(&mut self, element: Element) -> Result<()>;

    /// Remove one occurrence of an element from the local store.
    fn del_elem(&mut self, element: &Element) -> Result<()>;

    /// Run the client role.
    async fn sync_client(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference)
        -> Result<()>;

    /// Run the server role.
    async fn sync_server(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference)
        -> Result<()>;

    /// Human readable description including parameters.
    fn name(&self) -> String;

    fn protocol_id(&self) -> ProtocolId;

    /// Number of stored elements, counting repeats.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the stored elements.
    fn elements(&self) -> Vec<Element>;
}

/// A multiset of elements.
#[derive(Debug, Clone, Default)]
pub(crate) struct ElementBag {
    counts: BTreeMap<Element, usize>,
    len: usize,
}

impl ElementBag {
    pub fn insert(&mut self, element: Element) {
        *self.counts.entry(element).or_insert(0) += 1;
        self.len += 1;
    }

    /// Remove one occurrence. Returns false if none was present.
    pub fn remove(&mut self, element: &Element) -> bool {
        match self.counts.get_mut(element) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                self.counts.remove(element);
            }
            None => return false,
        }
        self.len -= 1;
        true
    }

    pub fn contains(&self, element: &Element) -> bool {
        self.counts.contains_key(element)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// All occurrences in ascending order.
    pub fn to_vec(&self) -> Vec<Element> {
        self.counts
            .iter()
            .flat_map(|(e, &n)| std::iter::repeat(e.clone()).take(n))
            .collect()
    }
}

/// Multiset difference of two element lists.
pub fn multiset_difference(mine: &[Element], theirs: &[Element]) -> SetDifference {
    let mut net: BTreeMap<&Element, i64> = BTreeMap::new();
    for e in mine {
        *net.entry(e).or_insert(0) += 1;
    }
    for e in theirs {
        *net.entry(e).or_insert(0) -= 1;
    }

    let mut diff = SetDifference::new();
    for (e, n) in net {
        let copies = std::iter::repeat(e.clone()).take(n.unsigned_abs() as usize);
        if n > 0 {
            diff.mine_not_theirs.extend(copies);
        } else {
            diff.theirs_not_mine.extend(copies);
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elems(values: &[u64]) -> Vec<Element> {
        values.iter().map(|&v| Element::from_u64(v)).collect()
    }

    #[test]
    fn test_protocol_id_bytes() {
        for id in [
            ProtocolId::CpiSync,
            ProtocolId::CpiSyncHalfRound,
            ProtocolId::InteractiveCpiSync,
            ProtocolId::FullSync,
            ProtocolId::IbltSync,
            ProtocolId::IbltSyncHalfRound,
            ProtocolId::IbltSyncMultiset,
            ProtocolId::ProbCpiSync,
        ] {
            assert_eq!(ProtocolId::from_byte(id.as_byte()), Some(id));
        }
        assert_eq!(ProtocolId::InteractiveCpiSync.as_byte(), 6);
        assert_eq!(ProtocolId::from_byte(0), None);
    }

    #[test]
    fn test_multiset_difference_counts_repeats() {
        let diff = multiset_difference(&elems(&[1, 1, 1, 2, 3]), &elems(&[1, 3, 4, 4]));
        assert_eq!(diff.mine_not_theirs, elems(&[1, 1, 2]));
        assert_eq!(diff.theirs_not_mine, elems(&[4, 4]));
    }

    #[test]
    fn test_bag_remove() {
        let mut bag = ElementBag::default();
        bag.insert(Element::from_u64(5));
        bag.insert(Element::from_u64(5));
        assert_eq!(bag.len(), 2);
        assert!(bag.remove(&Element::from_u64(5)));
        assert!(bag.contains(&Element::from_u64(5)));
        assert!(bag.remove(&Element::from_u64(5)));
        assert!(!bag.remove(&Element::from_u64(5)));
        assert_eq!(bag.len(), 0);
    }
}
