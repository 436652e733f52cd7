//! Characteristic polynomial interpolation sync.
//!
//! Each side keeps the values of its set's characteristic polynomial
//! `chi(x) = prod (x - h(e))` at fixed sample points above the element
//! domain, updated incrementally on every insert and delete. The client
//! ships its evaluations; the server divides them by its own, interpolates
//! the reduced ratio `P/Q`, and reads the unique elements of each side off
//! the roots. Extra redundant points verify the result before it is
//! accepted.
//!
//! ## Message Flow
//!
//! ```text
//! Client                                   Server
//!   |-------- modulus ----------------------->|
//!   |<------- ok/fail ------------------------|
//!   |-------- id, max_diff, bits, epsilon --->|
//!   |<------- ok/fail ------------------------|
//!   |-------- set size, evaluations --------->|
//!   |<------- fail ---------------------------|  (probabilistic only,
//!   |-------- more evaluations -------------->|   repeated)
//!   |<------- ok, roots(server), roots(client)|
//!   |-------- client elements --------------->|  (hashed only)
//!   |<------- server elements ----------------|
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use num::{BigUint, One};
use serde::{Deserialize, Serialize};
use setrecon_channel::{Channel, ChannelExt};
use setrecon_core::hash::{hash_to_bits, ELEMENT_DOMAIN};
use setrecon_core::{find_roots, interpolate_rational, Element, PrimeField};

use crate::arena::ElementArena;
use crate::error::{Result, SyncError};
use crate::handshake::{recv_modulus, recv_sync_params, send_modulus, send_sync_params, SyncParams};
use crate::method::{ProtocolId, SetDifference, SyncMethod, SYNC_FAIL_FLAG, SYNC_OK_FLAG};

/// Stride of the secondary hash that resolves slot collisions in hashed mode.
const COLLISION_STRIDE: u64 = 101;

/// Configuration for a [`CpiSync`] engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpiSyncConfig {
    /// Upper bound on the number of differences one sync can resolve.
    pub max_diff: usize,
    /// Bits per element in the hash domain.
    pub bits: u32,
    /// Negative log2 of the tolerated failure probability.
    pub epsilon: u32,
    /// Number of verification points. Derived from `epsilon` when unset.
    pub redundancy: Option<usize>,
    /// Map elements through a domain hash instead of using them directly.
    pub hashed: bool,
    /// Start from a difference bound of one and double it on failure.
    pub probabilistic: bool,
    /// Client sends only; the server alone learns the differences.
    pub one_way: bool,
}

impl Default for CpiSyncConfig {
    fn default() -> Self {
        Self {
            max_diff: 16,
            bits: 32,
            epsilon: 8,
            redundancy: None,
            hashed: false,
            probabilistic: false,
            one_way: false,
        }
    }
}

/// Parameters derived once per configuration and shared by engines that
/// must agree on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpiParams {
    pub max_diff: usize,
    /// Effective bit length of the hash domain, after inflation in hashed mode.
    pub bit_len: u32,
    /// Epsilon advertised in the handshake.
    pub epsilon: u32,
    pub redundancy: usize,
    pub hashed: bool,
    /// `2^bit_len`, one past the largest hash domain value.
    pub data_max: BigUint,
    pub field: PrimeField,
    /// `data_max + 1 ..= data_max + max_diff + redundancy`.
    pub sample_points: Vec<BigUint>,
}

/// Bit length that keeps hash collisions among `2^bits` elements below
/// `2^-epsilon`.
fn inflated_bits(bits: u32, epsilon: f64) -> u32 {
    let tail = (-(epsilon + 1.0)).exp2();
    let log_term = if tail > 0.0 {
        (-1.0 / (-tail).ln_1p()).log2()
    } else {
        epsilon + 1.0
    };
    (2.0 * bits as f64 + log_term - 1.0).ceil() as u32
}

impl CpiParams {
    pub fn derive(
        max_diff: usize,
        bits: u32,
        epsilon: u32,
        redundancy: Option<usize>,
        hashed: bool,
        probabilistic: bool,
    ) -> Result<Self> {
        if bits < 2 {
            return Err(SyncError::InvalidConfig(format!(
                "bits must be at least 2, got {}",
                bits
            )));
        }
        if max_diff == 0 {
            return Err(SyncError::InvalidConfig("max_diff must be positive".into()));
        }
        if bits < 64 && max_diff as u128 > 1u128 << bits {
            return Err(SyncError::InvalidConfig(format!(
                "max_diff {} exceeds the 2^{} element domain",
                max_diff, bits
            )));
        }

        let mut working_epsilon = epsilon as f64;
        if probabilistic {
            // Doubling makes up to log2(bits) attempts, each with its own error budget.
            working_epsilon += (bits as f64).log2().ceil();
        }
        let bit_len = if hashed {
            let inflated = inflated_bits(bits, working_epsilon);
            working_epsilon += 1.0;
            inflated
        } else {
            bits
        };

        let (redundancy, advertised) = match redundancy {
            Some(k) if k > 0 => (k, (k as u64 * bit_len as u64).min(u32::MAX as u64) as u32),
            _ => (
                ((working_epsilon / bit_len as f64).ceil() as usize).max(1),
                epsilon,
            ),
        };

        let data_max = BigUint::one() << bit_len;
        // The modulus must exceed the last sample point so no point reduces to zero.
        let field =
            PrimeField::first_prime_at_least(&(&data_max + max_diff + redundancy + 1u32));
        let sample_points = (0..max_diff + redundancy)
            .map(|i| &data_max + i + 1u32)
            .collect();

        Ok(Self {
            max_diff,
            bit_len,
            epsilon: advertised,
            redundancy,
            hashed,
            data_max,
            field,
            sample_points,
        })
    }

    pub fn from_config(config: &CpiSyncConfig) -> Result<Self> {
        Self::derive(
            config.max_diff,
            config.bits,
            config.epsilon,
            config.redundancy,
            config.hashed,
            config.probabilistic,
        )
    }
}

/// A CPISync engine and its element store.
#[derive(Debug, Clone)]
pub struct CpiSync {
    params: Arc<CpiParams>,
    probabilistic: bool,
    one_way: bool,
    arena: ElementArena,
    /// Hash domain value to arena index.
    by_slot: BTreeMap<BigUint, usize>,
    /// Hash domain values occupied by each element, most recent last.
    slots_of: BTreeMap<Element, Vec<BigUint>>,
    /// `chi(sample_points[i])` over the current store.
    evals: Vec<BigUint>,
}

impl CpiSync {
    /// Create an empty engine.
    pub fn new(config: &CpiSyncConfig) -> Result<Self> {
        if config.one_way && (config.hashed || config.probabilistic) {
            return Err(SyncError::InvalidConfig(
                "one-way sync supports neither hashing nor probabilistic retry".into(),
            ));
        }
        let params = CpiParams::from_config(config)?;
        Ok(Self::with_params(
            Arc::new(params),
            config.probabilistic,
            config.one_way,
        ))
    }

    pub(crate) fn with_params(params: Arc<CpiParams>, probabilistic: bool, one_way: bool) -> Self {
        let evals = vec![BigUint::one(); params.sample_points.len()];
        Self {
            params,
            probabilistic,
            one_way,
            arena: ElementArena::default(),
            by_slot: BTreeMap::new(),
            slots_of: BTreeMap::new(),
            evals,
        }
    }

    pub fn params(&self) -> &CpiParams {
        &self.params
    }

    /// Current evaluations of the characteristic polynomial.
    pub fn evaluations(&self) -> &[BigUint] {
        &self.evals
    }

    pub(crate) fn sync_params(&self) -> SyncParams {
        let protocol = if self.one_way {
            ProtocolId::CpiSyncHalfRound
        } else if self.probabilistic {
            ProtocolId::ProbCpiSync
        } else {
            ProtocolId::CpiSync
        };
        SyncParams::new(protocol)
            .with("max_diff", self.params.max_diff as u64)
            .with("bits", self.params.bit_len as u64)
            .with("epsilon", self.params.epsilon as u64)
    }

    fn domain_value(&self, element: &Element) -> Result<BigUint> {
        let p = &self.params;
        if p.hashed {
            return Ok(hash_to_bits(ELEMENT_DOMAIN, &element.to_bytes(), p.bit_len));
        }
        if element.bits() > p.bit_len as u64 {
            return Err(SyncError::CapacityExceeded(format!(
                "element {} does not fit in {} bits",
                element, p.bit_len
            )));
        }
        Ok(element.as_biguint().clone())
    }

    /// First free slot along `base, base + 101, base + 202, ...` modulo the domain.
    fn free_slot(&self, base: &BigUint) -> BigUint {
        let mut slot = base.clone();
        let mut step = 0u64;
        while self.by_slot.contains_key(&slot) {
            step += 1;
            slot = (base + BigUint::from(COLLISION_STRIDE) * step) % &self.params.data_max;
        }
        slot
    }

    /// Multiply every evaluation by `(s_i - slot)`, or divide when `remove` is set.
    fn update_evals(&mut self, slot: &BigUint, remove: bool) -> Result<()> {
        let field = &self.params.field;
        let factors = self
            .params
            .sample_points
            .iter()
            .map(|s| {
                let f = field.sub(s, slot);
                if remove {
                    field.inv(&f)
                } else {
                    Ok(f)
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (eval, factor) in self.evals.iter_mut().zip(&factors) {
            *eval = field.mul(eval, factor);
        }
        Ok(())
    }

    fn lookup_all(&self, slots: &[BigUint]) -> Option<Vec<Element>> {
        slots
            .iter()
            .map(|s| self.by_slot.get(s).and_then(|&i| self.arena.get(i)).cloned())
            .collect()
    }

    /// Run the client role without a handshake.
    pub(crate) async fn reconcile_client(
        &mut self,
        chan: &mut dyn Channel,
        diff: &mut SetDifference,
    ) -> Result<()> {
        let params = Arc::clone(&self.params);
        let field = &params.field;
        let k = params.redundancy;
        let max = params.max_diff;
        let mut curr = if self.probabilistic { 1 } else { max };

        chan.send_u64(self.len() as u64).await?;
        chan.send_field_vec(field, &self.evals[..curr + k]).await?;
        if self.one_way {
            return Ok(());
        }

        loop {
            match chan.recv_u8().await? {
                SYNC_OK_FLAG => break,
                SYNC_FAIL_FLAG => {
                    if !self.probabilistic || curr >= max {
                        return Err(SyncError::InterpolationFailure(format!(
                            "server could not reconcile within {} differences",
                            curr
                        )));
                    }
                    let extra = curr.min(max - curr);
                    tracing::debug!(curr_diff = curr, extra, "sending more evaluations");
                    chan.send_field_vec(field, &self.evals[curr + k..curr + k + extra])
                        .await?;
                    curr += extra;
                }
                other => {
                    return Err(SyncError::Protocol(format!(
                        "unexpected flag {} while awaiting reconciliation result",
                        other
                    )))
                }
            }
        }

        let theirs_slots = chan.recv_field_vec(field).await?;
        let mine_slots = chan.recv_field_vec(field).await?;

        // The server has already committed to this result, so a bad slot is
        // a protocol violation rather than a failed attempt.
        let Some(mine) = self.lookup_all(&mine_slots) else {
            if params.hashed {
                // The server is waiting for our elements; closing unblocks it.
                chan.close().await?;
            }
            return Err(SyncError::Protocol(
                "server reported local elements that are not in the store".into(),
            ));
        };

        let theirs = if params.hashed {
            chan.send_elements(&mine).await?;
            let theirs = chan.recv_elements().await?;
            ensure_count(&theirs, theirs_slots.len())?;
            theirs
        } else {
            theirs_slots.into_iter().map(Element::from_biguint).collect()
        };

        tracing::info!(
            mine = mine.len(),
            theirs = theirs.len(),
            curr_diff = curr,
            "CPISync client reconciled"
        );
        diff.mine_not_theirs.extend(mine);
        diff.theirs_not_mine.extend(theirs);
        Ok(())
    }

    /// Run the server role without a handshake.
    pub(crate) async fn reconcile_server(
        &mut self,
        chan: &mut dyn Channel,
        diff: &mut SetDifference,
    ) -> Result<()> {
        let params = Arc::clone(&self.params);
        let field = &params.field;
        let k = params.redundancy;
        let max = params.max_diff;
        let mut curr = if self.probabilistic { 1 } else { max };

        let other_size = chan.recv_u64().await?;
        let mut other_evals = chan.recv_field_vec(field).await?;

        let (mine_slots, mine, theirs_slots) = loop {
            if other_evals.len() != curr + k {
                return Err(SyncError::Protocol(format!(
                    "expected {} evaluations, received {}",
                    curr + k,
                    other_evals.len()
                )));
            }
            let outcome = self
                .attempt(other_size, &other_evals, curr)
                .and_then(|(mine_slots, theirs_slots)| {
                    let mine = self.lookup_all(&mine_slots).ok_or_else(|| {
                        SyncError::ChecksumMismatch(
                            "interpolated root missing from the store".into(),
                        )
                    })?;
                    Ok((mine_slots, mine, theirs_slots))
                });
            match outcome {
                Ok(found) => break found,
                Err(e) if e.is_reconciliation_failure() => {
                    if !self.one_way {
                        chan.send_u8(SYNC_FAIL_FLAG).await?;
                    }
                    if self.one_way || !self.probabilistic || curr >= max {
                        tracing::warn!(curr_diff = curr, "CPISync reconciliation failed: {}", e);
                        return Err(e);
                    }
                    tracing::debug!(curr_diff = curr, "attempt failed, doubling: {}", e);
                    let extra = chan.recv_field_vec(field).await?;
                    curr += extra.len();
                    other_evals.extend(extra);
                }
                Err(e) => return Err(e),
            }
        };

        if !self.one_way {
            chan.send_u8(SYNC_OK_FLAG).await?;
            chan.send_field_vec(field, &mine_slots).await?;
            chan.send_field_vec(field, &theirs_slots).await?;
        }

        let theirs = if params.hashed {
            let theirs = chan.recv_elements().await?;
            ensure_count(&theirs, theirs_slots.len())?;
            chan.send_elements(&mine).await?;
            theirs
        } else {
            theirs_slots.into_iter().map(Element::from_biguint).collect()
        };

        tracing::info!(
            mine = mine.len(),
            theirs = theirs.len(),
            curr_diff = curr,
            "CPISync server reconciled"
        );
        diff.mine_not_theirs.extend(mine);
        diff.theirs_not_mine.extend(theirs);
        Ok(())
    }

    /// Recover `(mine, theirs)` hash domain values from the peer's evaluations,
    /// using `curr` points for interpolation and the next `redundancy` for
    /// verification.
    fn attempt(
        &self,
        other_size: u64,
        other_evals: &[BigUint],
        curr: usize,
    ) -> Result<(Vec<BigUint>, Vec<BigUint>)> {
        let p = &self.params;
        let field = &p.field;

        let (mine, theirs) = if other_size == 0 {
            (self.by_slot.keys().cloned().collect::<Vec<_>>(), Vec::new())
        } else {
            let ratios = other_evals[..curr]
                .iter()
                .zip(&self.evals)
                .map(|(theirs, mine)| field.div(theirs, mine))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let rf = interpolate_rational(
                field,
                &p.sample_points[..curr],
                &ratios,
                other_size,
                self.len() as u64,
            )?;
            let theirs = find_roots(&rf.numerator, field)?;
            let mine = find_roots(&rf.denominator, field)?;
            (mine, theirs)
        };

        for j in 0..p.redundancy {
            let idx = curr + j;
            let s = &p.sample_points[idx];
            let lhs = theirs
                .iter()
                .fold(self.evals[idx].clone(), |acc, r| field.mul(&acc, &field.sub(s, r)));
            let rhs = mine
                .iter()
                .fold(other_evals[idx].clone(), |acc, r| field.mul(&acc, &field.sub(s, r)));
            if lhs != rhs {
                return Err(SyncError::ChecksumMismatch(format!(
                    "redundant sample point {} disagrees",
                    j
                )));
            }
        }

        if mine.iter().any(|h| !self.by_slot.contains_key(h)) {
            return Err(SyncError::ChecksumMismatch(
                "interpolated root is not a stored element".into(),
            ));
        }
        if theirs.iter().any(|h| h >= &p.data_max) {
            return Err(SyncError::ChecksumMismatch(
                "interpolated root lies outside the element domain".into(),
            ));
        }
        Ok((mine, theirs))
    }
}

fn ensure_count(received: &[Element], expected: usize) -> Result<()> {
    if received.len() != expected {
        return Err(SyncError::Protocol(format!(
            "expected {} translated elements, received {}",
            expected,
            received.len()
        )));
    }
    Ok(())
}

#[async_trait]
impl SyncMethod for CpiSync {
    fn add_elem(&mut self, element: Element) -> Result<()> {
        if BigUint::from(self.len()) >= self.params.data_max {
            return Err(SyncError::CapacityExceeded(format!(
                "all 2^{} hash slots are occupied",
                self.params.bit_len
            )));
        }
        let base = self.domain_value(&element)?;
        let slot = if self.params.hashed {
            self.free_slot(&base)
        } else if self.by_slot.contains_key(&base) {
            return Err(SyncError::CapacityExceeded(format!(
                "element {} is already present",
                element
            )));
        } else {
            base
        };

        self.update_evals(&slot, false)?;
        let idx = self.arena.insert(element.clone());
        self.by_slot.insert(slot.clone(), idx);
        self.slots_of.entry(element).or_default().push(slot);
        Ok(())
    }

    fn del_elem(&mut self, element: &Element) -> Result<()> {
        let slot = self
            .slots_of
            .get(element)
            .and_then(|slots| slots.last())
            .cloned()
            .ok_or_else(|| SyncError::NotFound(element.clone()))?;

        self.update_evals(&slot, true)?;
        if let Some(slots) = self.slots_of.get_mut(element) {
            slots.pop();
            if slots.is_empty() {
                self.slots_of.remove(element);
            }
        }
        if let Some(idx) = self.by_slot.remove(&slot) {
            self.arena.remove(idx);
        }
        Ok(())
    }

    async fn sync_client(
        &mut self,
        chan: &mut dyn Channel,
        diff: &mut SetDifference,
    ) -> Result<()> {
        let params = Arc::clone(&self.params);
        send_modulus(chan, &params.field, self.one_way).await?;
        send_sync_params(chan, &self.sync_params(), self.one_way).await?;
        self.reconcile_client(chan, diff).await
    }

    async fn sync_server(
        &mut self,
        chan: &mut dyn Channel,
        diff: &mut SetDifference,
    ) -> Result<()> {
        let params = Arc::clone(&self.params);
        recv_modulus(chan, &params.field, self.one_way).await?;
        recv_sync_params(chan, &self.sync_params(), self.one_way).await?;
        self.reconcile_server(chan, diff).await
    }

    fn name(&self) -> String {
        let p = &self.params;
        let mut name = format!(
            "CPISync (max_diff={}, bits={}, epsilon={}, redundancy={}, modulus={})",
            p.max_diff,
            p.bit_len,
            p.epsilon,
            p.redundancy,
            p.field.modulus()
        );
        if p.hashed {
            name.push_str(" hashed");
        }
        if self.probabilistic {
            name.push_str(" probabilistic");
        }
        if self.one_way {
            name.push_str(" one-way");
        }
        name
    }

    fn protocol_id(&self) -> ProtocolId {
        self.sync_params().protocol
    }

    fn len(&self) -> usize {
        self.arena.len()
    }

    fn elements(&self) -> Vec<Element> {
        self.by_slot
            .values()
            .filter_map(|&i| self.arena.get(i).cloned())
            .collect()
    }
}
