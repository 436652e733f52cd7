//! # Set Reconciliation Channels
//!
//! Reliable, ordered byte streams between two peers, with typed framing for
//! the values reconciliation protocols exchange.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use setrecon_channel::{ChannelExt, MemoryChannel};
//!
//! async fn example() {
//!     let (mut client, mut server) = MemoryChannel::pair();
//!     client.send_u64(7).await.unwrap();
//!     assert_eq!(server.recv_u64().await.unwrap(), 7);
//! }
//! ```
//!
//! ## Implementations
//!
//! - [`MemoryChannel`] - in-process pair built on tokio channels
//! - [`TcpChannel`] - TCP stream with bounded connect retry

pub mod channel;
pub mod codec;
pub mod error;
pub mod memory;
pub mod tcp;

pub use channel::Channel;
pub use codec::{limits, ChannelExt};
pub use error::{ChannelError, Result};
pub use memory::MemoryChannel;
pub use tcp::{ConnectConfig, TcpChannel};
