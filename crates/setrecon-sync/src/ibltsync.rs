//! Reconciliation by exchanging an invertible Bloom lookup table.
//!
//! Each element is stored as the pair `(h(e), e)`. The client sends its
//! table; the server subtracts its own and peels the result. Positive
//! entries are the client's extras, negative entries the server's.

use async_trait::async_trait;
use num::BigUint;
use serde::{Deserialize, Serialize};
use setrecon_channel::{Channel, ChannelExt};
use setrecon_core::hash::{hash_to_bits, ELEMENT_DOMAIN};
use setrecon_core::{Element, Entry, Iblt, IbltMultiset, InvertibleTable};

use crate::error::{Result, SyncError};
use crate::handshake::{recv_sync_params, send_sync_params, SyncParams};
use crate::method::{ElementBag, ProtocolId, SetDifference, SyncMethod, SYNC_FAIL_FLAG, SYNC_OK_FLAG};

/// Width of the key hash stored alongside each element.
const KEY_BITS: u32 = 64;

/// Configuration for an [`IbltSync`] engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IbltSyncConfig {
    /// Differences the table is sized to recover.
    pub expected_diff: usize,
    /// Maximum element width in bits.
    pub elem_bits: u64,
    /// Client sends only; the server alone learns the differences.
    pub one_way: bool,
}

impl Default for IbltSyncConfig {
    fn default() -> Self {
        Self {
            expected_diff: 64,
            elem_bits: 64,
            one_way: false,
        }
    }
}

/// IBLT sync over either table flavour.
#[derive(Debug, Clone)]
pub struct IbltSync<T: InvertibleTable> {
    config: IbltSyncConfig,
    table: T,
    bag: ElementBag,
}

/// Set reconciliation. Duplicate insertions are rejected.
pub type IbltSetSync = IbltSync<Iblt>;

/// Multiset reconciliation.
pub type IbltMultisetSync = IbltSync<IbltMultiset>;

fn key_of(element: &Element) -> BigUint {
    hash_to_bits(ELEMENT_DOMAIN, &element.to_bytes(), KEY_BITS)
}

fn to_elements(entries: Vec<Entry>) -> Vec<Element> {
    let mut out: Vec<Element> = entries
        .into_iter()
        .map(|(_, value)| Element::from_biguint(value))
        .collect();
    out.sort();
    out
}

impl<T: InvertibleTable> IbltSync<T> {
    pub fn new(config: &IbltSyncConfig) -> Result<Self> {
        if config.expected_diff == 0 || config.elem_bits == 0 {
            return Err(SyncError::InvalidConfig(
                "expected_diff and elem_bits must be positive".into(),
            ));
        }
        if config.one_way && T::COUNTS_MULTIPLICITY {
            return Err(SyncError::InvalidConfig(
                "one-way sync is not available for multisets".into(),
            ));
        }
        Ok(Self {
            config: config.clone(),
            table: T::with_capacity(config.expected_diff, config.elem_bits),
            bag: ElementBag::default(),
        })
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    fn sync_params(&self) -> SyncParams {
        let protocol = if T::COUNTS_MULTIPLICITY {
            ProtocolId::IbltSyncMultiset
        } else if self.config.one_way {
            ProtocolId::IbltSyncHalfRound
        } else {
            ProtocolId::IbltSync
        };
        SyncParams::new(protocol)
            .with("table_size", self.table.table_size() as u64)
            .with("value_size", self.table.value_size())
    }
}

#[async_trait]
impl<T: InvertibleTable> SyncMethod for IbltSync<T> {
    fn add_elem(&mut self, element: Element) -> Result<()> {
        if !T::COUNTS_MULTIPLICITY && self.bag.contains(&element) {
            return Err(SyncError::CapacityExceeded(format!(
                "element {} is already present",
                element
            )));
        }
        self.table.insert(&key_of(&element), element.as_biguint())?;
        self.bag.insert(element);
        Ok(())
    }

    fn del_elem(&mut self, element: &Element) -> Result<()> {
        if !self.bag.contains(element) {
            return Err(SyncError::NotFound(element.clone()));
        }
        self.table.erase(&key_of(element), element.as_biguint())?;
        self.bag.remove(element);
        Ok(())
    }

    async fn sync_client(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference) -> Result<()> {
        let one_way = self.config.one_way;
        send_sync_params(chan, &self.sync_params(), one_way).await?;
        let encoded = self.table.to_cbor()?;
        tracing::debug!(bytes = encoded.len(), "sending IBLT");
        chan.send_blob(&encoded).await?;
        if one_way {
            return Ok(());
        }

        let complete = match chan.recv_u8().await? {
            SYNC_OK_FLAG => true,
            SYNC_FAIL_FLAG => false,
            other => {
                return Err(SyncError::Protocol(format!(
                    "unexpected IBLT completion flag {}",
                    other
                )))
            }
        };
        let theirs = chan.recv_elements().await?;
        let mine = chan.recv_elements().await?;
        let recovered = mine.len() + theirs.len();
        diff.mine_not_theirs.extend(mine);
        diff.theirs_not_mine.extend(theirs);

        if !complete {
            tracing::warn!(recovered, "peer could not fully peel the IBLT difference");
            return Err(SyncError::PeelIncomplete { recovered });
        }
        tracing::info!(recovered, "IBLT client reconciled");
        Ok(())
    }

    async fn sync_server(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference) -> Result<()> {
        let one_way = self.config.one_way;
        recv_sync_params(chan, &self.sync_params(), one_way).await?;
        let encoded = chan.recv_blob().await?;
        let peer = T::from_cbor(&encoded)?;

        let outcome = peer.subtract(&self.table)?.list_entries();
        let theirs = to_elements(outcome.positive);
        let mine = to_elements(outcome.negative);

        if !one_way {
            chan.send_u8(if outcome.complete { SYNC_OK_FLAG } else { SYNC_FAIL_FLAG })
                .await?;
            chan.send_elements(&mine).await?;
            chan.send_elements(&theirs).await?;
        }

        let recovered = mine.len() + theirs.len();
        diff.mine_not_theirs.extend(mine);
        diff.theirs_not_mine.extend(theirs);

        if !outcome.complete {
            tracing::warn!(recovered, "IBLT difference did not peel completely");
            return Err(SyncError::PeelIncomplete { recovered });
        }
        tracing::info!(recovered, "IBLT server reconciled");
        Ok(())
    }

    fn name(&self) -> String {
        format!(
            "IBLTSync{} (expected_diff={}, elem_bits={}, cells={}{})",
            if T::COUNTS_MULTIPLICITY { " multiset" } else { "" },
            self.config.expected_diff,
            self.config.elem_bits,
            self.table.table_size(),
            if self.config.one_way { ", one-way" } else { "" }
        )
    }

    fn protocol_id(&self) -> ProtocolId {
        self.sync_params().protocol
    }

    fn len(&self) -> usize {
        self.bag.len()
    }

    fn elements(&self) -> Vec<Element> {
        self.bag.to_vec()
    }
}
