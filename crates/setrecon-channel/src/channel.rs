//! The channel abstraction.
//!
//! A channel is a reliable, ordered byte stream between exactly two peers.
//! Reconciliation protocols are written against this trait; typed framing
//! lives in [`crate::codec`].

use async_trait::async_trait;

use crate::error::Result;

/// A bidirectional byte stream to one peer.
///
/// Reads block until the requested number of bytes has arrived. Closing the
/// channel from either side makes the other side's pending and future reads
/// fail with [`crate::ChannelError::Closed`].
#[async_trait]
pub trait Channel: Send {
    /// Send all of `bytes`.
    async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive exactly `len` bytes.
    async fn recv_bytes(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Close the sending half. Further sends fail.
    async fn close(&mut self) -> Result<()>;

    /// A human readable name for the remote end.
    fn peer_name(&self) -> String;

    /// Total bytes sent so far.
    fn bytes_sent(&self) -> u64;

    /// Total bytes received so far.
    fn bytes_received(&self) -> u64;
}
