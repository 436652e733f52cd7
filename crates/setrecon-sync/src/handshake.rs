//! Parameter and modulus handshakes.
//!
//! The sender transmits its configuration and, unless the sync is one-way,
//! waits for an ok/fail verdict. The receiver compares against its own
//! configuration and answers. Both sides fail with
//! [`SyncError::ParameterMismatch`] on disagreement.

use setrecon_channel::{Channel, ChannelExt};
use setrecon_core::PrimeField;

use crate::error::{Result, SyncError};
use crate::method::{ProtocolId, SYNC_FAIL_FLAG, SYNC_OK_FLAG};

/// A protocol id followed by named scalar parameters, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncParams {
    pub protocol: ProtocolId,
    pub values: Vec<(&'static str, u64)>,
}

impl SyncParams {
    pub fn new(protocol: ProtocolId) -> Self {
        Self {
            protocol,
            values: Vec::new(),
        }
    }

    /// Append a named parameter.
    pub fn with(mut self, name: &'static str, value: u64) -> Self {
        self.values.push((name, value));
        self
    }
}

async fn await_verdict(chan: &mut dyn Channel, what: &str) -> Result<()> {
    match chan.recv_u8().await? {
        SYNC_OK_FLAG => Ok(()),
        SYNC_FAIL_FLAG => {
            tracing::warn!("peer rejected our {}", what);
            Err(SyncError::ParameterMismatch(format!("peer rejected {}", what)))
        }
        other => Err(SyncError::Protocol(format!(
            "unexpected verdict byte {} for {}",
            other, what
        ))),
    }
}

async fn reject(chan: &mut dyn Channel, one_way: bool, reason: String) -> Result<()> {
    tracing::warn!("handshake mismatch: {}", reason);
    if !one_way {
        chan.send_u8(SYNC_FAIL_FLAG).await?;
    }
    Err(SyncError::ParameterMismatch(reason))
}

/// Send our parameters and wait for the verdict.
pub async fn send_sync_params(
    chan: &mut dyn Channel,
    params: &SyncParams,
    one_way: bool,
) -> Result<()> {
    chan.send_u8(params.protocol.as_byte()).await?;
    for (_, value) in &params.values {
        chan.send_u64(*value).await?;
    }
    if one_way {
        return Ok(());
    }
    await_verdict(chan, "sync parameters").await
}

/// Receive the peer's parameters and check them against `expected`.
pub async fn recv_sync_params(
    chan: &mut dyn Channel,
    expected: &SyncParams,
    one_way: bool,
) -> Result<()> {
    let id = chan.recv_u8().await?;
    if id != expected.protocol.as_byte() {
        let theirs = ProtocolId::from_byte(id)
            .map(|p| format!("{:?}", p))
            .unwrap_or_else(|| format!("unknown id {}", id));
        return reject(
            chan,
            one_way,
            format!("protocol {} does not match local {:?}", theirs, expected.protocol),
        )
        .await;
    }

    let mut mismatches = Vec::new();
    for (name, local) in &expected.values {
        let peer = chan.recv_u64().await?;
        if peer != *local {
            mismatches.push(format!("{}: local={}, peer={}", name, local, peer));
        }
    }
    if !mismatches.is_empty() {
        return reject(chan, one_way, mismatches.join(", ")).await;
    }

    if !one_way {
        chan.send_u8(SYNC_OK_FLAG).await?;
    }
    Ok(())
}

/// Send the field modulus so the peer can confirm element widths agree.
pub async fn send_modulus(chan: &mut dyn Channel, field: &PrimeField, one_way: bool) -> Result<()> {
    chan.send_biguint(field.modulus()).await?;
    if one_way {
        return Ok(());
    }
    await_verdict(chan, "field modulus").await
}

pub async fn recv_modulus(chan: &mut dyn Channel, field: &PrimeField, one_way: bool) -> Result<()> {
    let peer = chan.recv_biguint().await?;
    if &peer != field.modulus() {
        return reject(
            chan,
            one_way,
            format!("field modulus: local={}, peer={}", field.modulus(), peer),
        )
        .await;
    }
    if !one_way {
        chan.send_u8(SYNC_OK_FLAG).await?;
    }
    Ok(())
}
