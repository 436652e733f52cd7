//! In-memory duplex channel for tests and same-process pairing.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::channel::Channel;
use crate::codec::limits::MEMORY_CHANNEL_DEPTH;
use crate::error::{ChannelError, Result};

/// One end of an in-memory byte pipe.
pub struct MemoryChannel {
    name: String,
    sender: Option<mpsc::Sender<Bytes>>,
    receiver: mpsc::Receiver<Bytes>,
    buffer: BytesMut,
    sent: u64,
    received: u64,
}

impl MemoryChannel {
    /// Create a connected pair of channels.
    pub fn pair() -> (Self, Self) {
        Self::pair_named("memory-a", "memory-b")
    }

    /// Create a connected pair; each end reports the other's name as its peer.
    pub fn pair_named(a: &str, b: &str) -> (Self, Self) {
        let (tx_ab, rx_ab) = mpsc::channel(MEMORY_CHANNEL_DEPTH);
        let (tx_ba, rx_ba) = mpsc::channel(MEMORY_CHANNEL_DEPTH);
        let end_a = Self::new(b, tx_ab, rx_ba);
        let end_b = Self::new(a, tx_ba, rx_ab);
        (end_a, end_b)
    }

    fn new(peer: &str, sender: mpsc::Sender<Bytes>, receiver: mpsc::Receiver<Bytes>) -> Self {
        Self {
            name: peer.to_string(),
            sender: Some(sender),
            receiver,
            buffer: BytesMut::new(),
            sent: 0,
            received: 0,
        }
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(ChannelError::Closed)?;
        sender
            .send(Bytes::copy_from_slice(bytes))
            .await
            .map_err(|_| ChannelError::Closed)?;
        self.sent += bytes.len() as u64;
        Ok(())
    }

    async fn recv_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        while self.buffer.len() < len {
            match self.receiver.recv().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => return Err(ChannelError::Closed),
            }
        }
        self.received += len as u64;
        Ok(self.buffer.split_to(len).to_vec())
    }

    async fn close(&mut self) -> Result<()> {
        self.sender = None;
        Ok(())
    }

    fn peer_name(&self) -> String {
        self.name.clone()
    }

    fn bytes_sent(&self) -> u64 {
        self.sent
    }

    fn bytes_received(&self) -> u64 {
        self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_span_chunks() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.send_bytes(b"he").await.unwrap();
        a.send_bytes(b"llo").await.unwrap();
        assert_eq!(b.recv_bytes(4).await.unwrap(), b"hell".to_vec());
        assert_eq!(b.recv_bytes(1).await.unwrap(), b"o".to_vec());
    }

    #[tokio::test]
    async fn test_close_fails_waiting_peer() {
        let (mut a, mut b) = MemoryChannel::pair();
        let reader = tokio::spawn(async move { b.recv_bytes(1).await });
        a.close().await.unwrap();
        assert!(matches!(reader.await.unwrap(), Err(ChannelError::Closed)));
        assert!(matches!(a.send_bytes(b"x").await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_fails() {
        let (mut a, b) = MemoryChannel::pair();
        drop(b);
        assert!(matches!(a.send_bytes(b"x").await, Err(ChannelError::Closed)));
    }

    #[test]
    fn test_peer_names() {
        let (a, b) = MemoryChannel::pair_named("client", "server");
        assert_eq!(a.peer_name(), "server");
        assert_eq!(b.peer_name(), "client");
    }
}
