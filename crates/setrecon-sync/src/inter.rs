//! Interactive CPISync over a p-ary partition tree.
//!
//! The key space `[0, 2^bits)` is split recursively into `p_factor` equal
//! intervals. Every node runs a CPISync instance bounded by `max_diff` over
//! the elements whose key falls in its interval. The peers walk the tree
//! depth first in lockstep; a node whose CPISync fails is split and its
//! children are visited instead. Children are materialized only when a
//! node first fails and are kept for later syncs.

use std::sync::Arc;

use async_trait::async_trait;
use num::{BigUint, One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use setrecon_channel::{Channel, ChannelExt};
use setrecon_core::hash::{hash_to_bits, PARTITION_DOMAIN};
use setrecon_core::Element;

use crate::cpisync::{CpiParams, CpiSync};
use crate::error::{Result, SyncError};
use crate::handshake::{recv_modulus, recv_sync_params, send_modulus, send_sync_params, SyncParams};
use crate::method::{
    multiset_difference, ProtocolId, SetDifference, SyncMethod, SYNC_NO_INFO, SYNC_SOME_INFO,
};

/// Configuration for an [`InterCpiSync`] engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterCpiSyncConfig {
    /// Difference bound of each node's CPISync.
    pub max_diff: usize,
    /// Bits per element key.
    pub bits: u32,
    /// Overall tolerated failure exponent. Each node gets a tighter share.
    pub epsilon: u32,
    /// Children per split.
    pub p_factor: usize,
    pub hashed: bool,
}

impl Default for InterCpiSyncConfig {
    fn default() -> Self {
        Self {
            max_diff: 8,
            bits: 32,
            epsilon: 8,
            p_factor: 2,
            hashed: false,
        }
    }
}

/// Per node epsilon so that the union bound over every node the walk can
/// visit stays within `2^-epsilon`.
///
/// The walk visits at most `1 + 2^bits * p / max_diff * ceil(bits / log2 p)` nodes.
fn node_epsilon(config: &InterCpiSyncConfig) -> u32 {
    let p = config.p_factor as f64;
    let depth = (config.bits as f64 / p.log2()).ceil();
    let x = config.bits as f64 + p.log2() - (config.max_diff as f64).log2() + depth.log2();
    let log_nodes = if x > 52.0 { x } else { x.exp2().ln_1p() / std::f64::consts::LN_2 };
    (config.epsilon as f64 + log_nodes).ceil() as u32
}

#[derive(Debug, Clone)]
struct TreeNode {
    cpi: CpiSync,
    begin: BigUint,
    end: BigUint,
    children: Option<Vec<usize>>,
}

/// Interactive CPISync engine.
#[derive(Debug, Clone)]
pub struct InterCpiSync {
    config: InterCpiSyncConfig,
    node_params: Arc<CpiParams>,
    key_max: BigUint,
    /// Node arena. The root is always at index 0.
    nodes: Vec<TreeNode>,
    free: Vec<usize>,
    last_visits: usize,
}

impl InterCpiSync {
    pub fn new(config: &InterCpiSyncConfig) -> Result<Self> {
        if config.p_factor < 2 {
            return Err(SyncError::InvalidConfig(format!(
                "p_factor must be at least 2, got {}",
                config.p_factor
            )));
        }
        let node_params = Arc::new(CpiParams::derive(
            config.max_diff,
            config.bits,
            node_epsilon(config),
            None,
            config.hashed,
            false,
        )?);
        let key_max = BigUint::one() << config.bits;
        let root = TreeNode {
            cpi: CpiSync::with_params(Arc::clone(&node_params), false, false),
            begin: BigUint::zero(),
            end: key_max.clone(),
            children: None,
        };
        tracing::debug!(
            node_epsilon = node_params.epsilon,
            modulus = %node_params.field.modulus(),
            "partition tree configured"
        );
        Ok(Self {
            config: config.clone(),
            node_params,
            key_max,
            nodes: vec![root],
            free: Vec::new(),
            last_visits: 0,
        })
    }

    /// Tree nodes visited by the most recent sync.
    pub fn last_visits(&self) -> usize {
        self.last_visits
    }

    /// Parameters of the CPISync run at every node.
    pub fn node_params(&self) -> &CpiParams {
        &self.node_params
    }

    fn sync_params(&self) -> SyncParams {
        SyncParams::new(ProtocolId::InteractiveCpiSync)
            .with("max_diff", self.config.max_diff as u64)
            .with("bits", self.config.bits as u64)
            .with("epsilon", self.config.epsilon as u64)
            .with("p_factor", self.config.p_factor as u64)
    }

    fn partition_key(&self, element: &Element) -> Result<BigUint> {
        if self.config.hashed {
            return Ok(hash_to_bits(PARTITION_DOMAIN, &element.to_bytes(), self.config.bits));
        }
        if element.as_biguint() >= &self.key_max {
            return Err(SyncError::CapacityExceeded(format!(
                "element {} does not fit in {} bits",
                element, self.config.bits
            )));
        }
        Ok(element.as_biguint().clone())
    }

    fn step(&self, idx: usize) -> BigUint {
        let node = &self.nodes[idx];
        let step = (&node.end - &node.begin) / self.config.p_factor;
        if step.is_zero() {
            BigUint::one()
        } else {
            step
        }
    }

    fn child_slot(&self, idx: usize, key: &BigUint) -> usize {
        let offset = (key - &self.nodes[idx].begin) / self.step(idx);
        offset
            .to_usize()
            .map_or(self.config.p_factor - 1, |s| s.min(self.config.p_factor - 1))
    }

    fn is_leaf_interval(&self, idx: usize) -> bool {
        let node = &self.nodes[idx];
        &node.end - &node.begin <= BigUint::one()
    }

    /// Materialized child of `idx` that `key` falls in.
    fn next_child(&self, idx: usize, key: &BigUint) -> Option<usize> {
        self.nodes[idx]
            .children
            .as_ref()
            .map(|children| children[self.child_slot(idx, key)])
    }

    fn alloc(&mut self, node: TreeNode) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Children of `idx`, creating and populating them on first use.
    fn split(&mut self, idx: usize) -> Result<Vec<usize>> {
        if let Some(children) = &self.nodes[idx].children {
            return Ok(children.clone());
        }

        let step = self.step(idx);
        let (begin, end) = (self.nodes[idx].begin.clone(), self.nodes[idx].end.clone());
        let p = self.config.p_factor;
        let mut children = Vec::with_capacity(p);
        for i in 0..p {
            let lo = (&begin + &step * i).min(end.clone());
            let hi = if i + 1 == p {
                end.clone()
            } else {
                (&begin + &step * (i + 1)).min(end.clone())
            };
            children.push(self.alloc(TreeNode {
                cpi: CpiSync::with_params(Arc::clone(&self.node_params), false, false),
                begin: lo,
                end: hi,
                children: None,
            }));
        }

        for element in self.nodes[idx].cpi.elements() {
            let key = self.partition_key(&element)?;
            let child = children[self.child_slot(idx, &key)];
            self.nodes[child].cpi.add_elem(element)?;
        }
        tracing::trace!(node = idx, "split partition node");
        self.nodes[idx].children = Some(children.clone());
        Ok(children)
    }

    /// Return the subtree below `idx` to the free list.
    fn release_children(&mut self, idx: usize) {
        let mut stack = self.nodes[idx].children.take().unwrap_or_default();
        while let Some(child) = stack.pop() {
            if let Some(grandchildren) = self.nodes[child].children.take() {
                stack.extend(grandchildren);
            }
            self.free.push(child);
        }
    }

    async fn exchange_presence(&self, chan: &mut dyn Channel, idx: usize) -> Result<(bool, bool)> {
        let mine = !self.nodes[idx].cpi.is_empty();
        chan.send_u8(if mine { SYNC_SOME_INFO } else { SYNC_NO_INFO })
            .await?;
        let theirs = match chan.recv_u8().await? {
            SYNC_SOME_INFO => true,
            SYNC_NO_INFO => false,
            other => {
                return Err(SyncError::Protocol(format!(
                    "unexpected presence flag {}",
                    other
                )))
            }
        };
        Ok((mine, theirs))
    }

    async fn walk(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference, client: bool) -> Result<()> {
        let mut stack = vec![0usize];
        let mut visits = 0;

        while let Some(idx) = stack.pop() {
            visits += 1;
            let (mine, theirs) = self.exchange_presence(chan, idx).await?;
            match (mine, theirs) {
                (false, false) => {}
                (true, false) => {
                    let elements = self.nodes[idx].cpi.elements();
                    chan.send_elements(&elements).await?;
                    diff.mine_not_theirs.extend(elements);
                }
                (false, true) => {
                    let elements = chan.recv_elements().await?;
                    diff.theirs_not_mine.extend(elements);
                }
                (true, true) if self.is_leaf_interval(idx) => {
                    let mine = self.nodes[idx].cpi.elements();
                    let theirs = if client {
                        chan.send_elements(&mine).await?;
                        chan.recv_elements().await?
                    } else {
                        let theirs = chan.recv_elements().await?;
                        chan.send_elements(&mine).await?;
                        theirs
                    };
                    diff.extend(multiset_difference(&mine, &theirs));
                }
                (true, true) => {
                    let mut node_diff = SetDifference::new();
                    let node = &mut self.nodes[idx].cpi;
                    let outcome = if client {
                        node.reconcile_client(chan, &mut node_diff).await
                    } else {
                        node.reconcile_server(chan, &mut node_diff).await
                    };
                    match outcome {
                        Ok(()) => diff.extend(node_diff),
                        Err(e) if e.is_reconciliation_failure() => {
                            tracing::debug!(node = idx, "node reconciliation failed, splitting: {}", e);
                            let children = self.split(idx)?;
                            stack.extend(children.into_iter().rev());
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        self.last_visits = visits;
        tracing::info!(
            visits,
            mine = diff.mine_not_theirs.len(),
            theirs = diff.theirs_not_mine.len(),
            "InterCPISync {} reconciled",
            if client { "client" } else { "server" }
        );
        Ok(())
    }
}

#[async_trait]
impl SyncMethod for InterCpiSync {
    fn add_elem(&mut self, element: Element) -> Result<()> {
        let key = self.partition_key(&element)?;
        self.nodes[0].cpi.add_elem(element.clone())?;
        let mut idx = 0;
        while let Some(child) = self.next_child(idx, &key) {
            self.nodes[child].cpi.add_elem(element.clone())?;
            idx = child;
        }
        Ok(())
    }

    fn del_elem(&mut self, element: &Element) -> Result<()> {
        let key = self.partition_key(element)?;
        self.nodes[0].cpi.del_elem(element)?;
        let mut idx = 0;
        loop {
            let next = self.next_child(idx, &key);
            if self.nodes[idx].cpi.is_empty() {
                self.release_children(idx);
                break;
            }
            match next {
                Some(child) => {
                    self.nodes[child].cpi.del_elem(element)?;
                    idx = child;
                }
                None => break,
            }
        }
        Ok(())
    }

    async fn sync_client(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference) -> Result<()> {
        let params = Arc::clone(&self.node_params);
        send_modulus(chan, &params.field, false).await?;
        send_sync_params(chan, &self.sync_params(), false).await?;
        self.walk(chan, diff, true).await
    }

    async fn sync_server(&mut self, chan: &mut dyn Channel, diff: &mut SetDifference) -> Result<()> {
        let params = Arc::clone(&self.node_params);
        recv_modulus(chan, &params.field, false).await?;
        recv_sync_params(chan, &self.sync_params(), false).await?;
        self.walk(chan, diff, false).await
    }

    fn name(&self) -> String {
        format!(
            "InterCPISync (max_diff={}, bits={}, epsilon={}, p_factor={}{})",
            self.config.max_diff,
            self.config.bits,
            self.config.epsilon,
            self.config.p_factor,
            if self.config.hashed { ", hashed" } else { "" }
        )
    }

    fn protocol_id(&self) -> ProtocolId {
        ProtocolId::InteractiveCpiSync
    }

    fn len(&self) -> usize {
        self.nodes[0].cpi.len()
    }

    fn elements(&self) -> Vec<Element> {
        self.nodes[0].cpi.elements()
    }
}
