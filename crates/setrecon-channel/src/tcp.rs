//! TCP channel with bounded connect retry.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::channel::Channel;
use crate::error::{ChannelError, Result};

/// Retry policy for outgoing connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Delay after the first failure. Doubles on each further failure.
    pub initial_backoff: Duration,
    /// Ceiling for the delay between attempts.
    pub max_backoff: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// A channel over a TCP stream.
pub struct TcpChannel {
    stream: TcpStream,
    peer: String,
    sent: u64,
    received: u64,
}

impl TcpChannel {
    /// Wrap an established stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        Self {
            stream,
            peer,
            sent: 0,
            received: 0,
        }
    }

    /// Connect to `addr`, retrying with exponential backoff.
    pub async fn connect(addr: &str, config: &ConnectConfig) -> Result<Self> {
        let attempts = config.max_attempts.max(1);
        let mut backoff = config.initial_backoff;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    tracing::debug!(addr, attempt, "connected");
                    return Ok(Self::from_stream(stream));
                }
                Err(e) => {
                    tracing::debug!(addr, attempt, error = %e, "connect attempt failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(config.max_backoff);
                    }
                }
            }
        }

        tracing::warn!("giving up on {} after {} attempts", addr, attempts);
        Err(ChannelError::ConnectFailed {
            addr: addr.to_string(),
            attempts,
            reason: last_error,
        })
    }

    /// Bind a listener for incoming channels.
    pub async fn listen(addr: &str) -> Result<TcpListener> {
        Ok(TcpListener::bind(addr).await?)
    }

    /// Accept the next incoming channel.
    pub async fn accept(listener: &TcpListener) -> Result<Self> {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::debug!(%peer, "accepted connection");
        Ok(Self::from_stream(stream))
    }
}

#[async_trait]
impl Channel for TcpChannel {
    async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.sent += bytes.len() as u64;
        Ok(())
    }

    async fn recv_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        match self.stream.read_exact(&mut buf).await {
            Ok(_) => {
                self.received += len as u64;
                Ok(buf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ChannelError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn peer_name(&self) -> String {
        self.peer.clone()
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
    use crate::codec::ChannelExt;

    #[tokio::test]
    async fn test_tcp_roundtrip() {
        let listener = TcpChannel::listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let mut chan = TcpChannel::accept(&listener).await.unwrap();
            let v = chan.recv_u64().await.unwrap();
            chan.send_u64(v + 1).await.unwrap();
        });

        let mut client = TcpChannel::connect(&addr, &ConnectConfig::default())
            .await
            .unwrap();
        client.send_u64(41).await.unwrap();
        assert_eq!(client.recv_u64().await.unwrap(), 42);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_gives_up() {
        // Bind then drop to find a port with no listener.
        let listener = TcpChannel::listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let config = ConnectConfig {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        match TcpChannel::connect(&addr, &config).await {
            Err(ChannelError::ConnectFailed { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected ConnectFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_peer_shutdown_reads_as_closed() {
        let listener = TcpChannel::listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let mut chan = TcpChannel::accept(&listener).await.unwrap();
            chan.close().await.unwrap();
            chan
        });
        let mut client = TcpChannel::connect(&addr, &ConnectConfig::default())
            .await
            .unwrap();
        assert!(matches!(client.recv_u8().await, Err(ChannelError::Closed)));
        drop(server.await.unwrap());
    }
}
