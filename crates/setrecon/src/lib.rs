//! # Setrecon
//!
//! Set reconciliation between two peers, with communication close to the
//! size of the difference rather than the size of the sets.
//!
//! ## Overview
//!
//! - **Core**: elements, prime field and polynomial arithmetic, IBLTs
//! - **Channel**: the byte stream every protocol runs over (in-memory or TCP)
//! - **Sync**: CPISync, interactive CPISync, IBLT sync and full sync
//!
//! [`Engine`] wraps any of the engines behind one type and is built from an
//! [`EngineConfig`], which loads from JSON.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use setrecon::{Engine, EngineConfig, SyncMethod};
//! use setrecon::channel::ConnectConfig;
//! use setrecon::core::Element;
//!
//! async fn example() -> setrecon::Result<()> {
//!     let config = EngineConfig::from_json_str(r#"{"cpi_sync": {"bits": 16, "max_diff": 8}}"#)?;
//!     let mut engine = Engine::from_config(&config)?;
//!     engine.add_elem(Element::from_u64(42))?;
//!
//!     let diff = engine
//!         .connect_and_sync("127.0.0.1:7070", &ConnectConfig::default())
//!         .await?;
//!     println!("peer has {} elements we lack", diff.theirs_not_mine.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `setrecon::core` - elements, arithmetic and tables
//! - `setrecon::channel` - channels and wire codec
//! - `setrecon::sync` - the reconciliation engines

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;

pub use setrecon_channel as channel;
pub use setrecon_core as core;
pub use setrecon_sync as sync;

pub use config::{EngineConfig, FullSyncConfig, NodeConfig};
pub use engine::Engine;
pub use error::{ConfigError, Error, Result};
pub use logging::LogConfig;

pub use setrecon_sync::{ProtocolId, SetDifference, SyncError, SyncMethod};
