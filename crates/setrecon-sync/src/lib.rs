//! # Setrecon Sync
//!
//! Set reconciliation protocols between two peers.
//!
//! ## Overview
//!
//! Every protocol implements [`SyncMethod`]: the engine owns an element
//! store, and a session runs one engine as client and another as server
//! over a [`setrecon_channel::Channel`]. Both sides end up with the same
//! difference, seen from their own perspective.
//!
//! - [`CpiSync`]: characteristic polynomial interpolation, with hashed,
//!   probabilistic and one-way variants
//! - [`InterCpiSync`]: CPISync over a recursive partition of the key space
//! - [`IbltSetSync`] and [`IbltMultisetSync`]: invertible Bloom lookup tables
//! - [`FullSync`]: ships the whole set
//!
//! ## Usage
//!
//! ```rust,no_run
//! use setrecon_channel::MemoryChannel;
//! use setrecon_core::Element;
//! use setrecon_sync::{CpiSync, CpiSyncConfig, SetDifference, SyncMethod};
//!
//! async fn example() -> setrecon_sync::Result<()> {
//!     let config = CpiSyncConfig { bits: 8, max_diff: 4, ..Default::default() };
//!     let mut alice = CpiSync::new(&config)?;
//!     let mut bob = CpiSync::new(&config)?;
//!     for v in [1, 2, 3] {
//!         alice.add_elem(Element::from_u64(v))?;
//!     }
//!     for v in [2, 3, 4] {
//!         bob.add_elem(Element::from_u64(v))?;
//!     }
//!
//!     let (mut a, mut b) = MemoryChannel::pair();
//!     let (mut da, mut db) = (SetDifference::new(), SetDifference::new());
//!     let (ra, rb) = tokio::join!(
//!         alice.sync_client(&mut a, &mut da),
//!         bob.sync_server(&mut b, &mut db),
//!     );
//!     ra?;
//!     rb?;
//!     Ok(())
//! }
//! ```

mod arena;
pub mod cpisync;
pub mod error;
pub mod fullsync;
pub mod handshake;
pub mod ibltsync;
pub mod inter;
pub mod method;

pub use cpisync::{CpiParams, CpiSync, CpiSyncConfig};
pub use error::{Result, SyncError};
pub use fullsync::FullSync;
pub use handshake::SyncParams;
pub use ibltsync::{IbltMultisetSync, IbltSetSync, IbltSync, IbltSyncConfig};
pub use inter::{InterCpiSync, InterCpiSyncConfig};
pub use method::{
    multiset_difference, ProtocolId, SetDifference, SyncMethod, SYNC_FAIL_FLAG, SYNC_NO_INFO,
    SYNC_OK_FLAG, SYNC_SOME_INFO,
};

#[cfg(test)]
pub(crate) mod test_util {
    use setrecon_channel::MemoryChannel;
    use setrecon_core::Element;

    use crate::error::Result;
    use crate::method::{SetDifference, SyncMethod};

    /// Sorted elements for the given integers.
    pub fn elems(values: &[u64]) -> Vec<Element> {
        let mut out: Vec<Element> = values.iter().map(|&v| Element::from_u64(v)).collect();
        out.sort();
        out
    }

    /// Run one session. Each side drops its channel end when it finishes,
    /// so a failing peer never leaves the other blocked.
    pub async fn run_pair<C, S>(
        client: &mut C,
        server: &mut S,
    ) -> (Result<SetDifference>, Result<SetDifference>)
    where
        C: SyncMethod,
        S: SyncMethod,
    {
        let (mut a, mut b) = MemoryChannel::pair();
        let client_side = async move {
            let mut diff = SetDifference::new();
            let result = client.sync_client(&mut a, &mut diff).await;
            drop(a);
            result.map(|_| diff.sorted())
        };
        let server_side = async move {
            let mut diff = SetDifference::new();
            let result = server.sync_server(&mut b, &mut diff).await;
            drop(b);
            result.map(|_| diff.sorted())
        };
        tokio::join!(client_side, server_side)
    }
}
