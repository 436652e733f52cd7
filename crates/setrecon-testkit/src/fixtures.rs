//! Test fixtures and helpers.
//!
//! Run two engines against each other without any network.

use setrecon_channel::{Channel, MemoryChannel};
use setrecon_core::Element;
use setrecon_sync::{Result, SetDifference, SyncMethod};

/// What each side of a session learned.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Client result, with both lists sorted.
    pub client: Result<SetDifference>,
    /// Server result, with both lists sorted.
    pub server: Result<SetDifference>,
    pub client_bytes_sent: u64,
    pub server_bytes_sent: u64,
}

/// Add `values` to `engine`, panicking on rejection.
pub fn populated<M: SyncMethod>(mut engine: M, values: &[u64]) -> M {
    for &v in values {
        if let Err(e) = engine.add_elem(Element::from_u64(v)) {
            panic!("failed to add {}: {}", v, e);
        }
    }
    engine
}

/// Run one session over an in-memory pair.
///
/// Each side drops its channel end when it finishes, so a peer that fails
/// early unblocks the other instead of hanging the test.
pub async fn run_pair<C, S>(client: &mut C, server: &mut S) -> SessionOutcome
where
    C: SyncMethod,
    S: SyncMethod,
{
    let (a, b) = MemoryChannel::pair_named("client", "server");
    let client_side = async move {
        let mut chan = a;
        let mut diff = SetDifference::new();
        let result = client.sync_client(&mut chan, &mut diff).await;
        (result.map(|_| diff.sorted()), chan.bytes_sent())
    };
    let server_side = async move {
        let mut chan = b;
        let mut diff = SetDifference::new();
        let result = server.sync_server(&mut chan, &mut diff).await;
        (result.map(|_| diff.sorted()), chan.bytes_sent())
    };
    let ((client, client_bytes_sent), (server, server_bytes_sent)) =
        tokio::join!(client_side, server_side);
    SessionOutcome {
        client,
        server,
        client_bytes_sent,
        server_bytes_sent,
    }
}

/// [`run_pair`] on a fresh current-thread runtime, for synchronous property tests.
pub fn run_pair_blocking<C, S>(client: &mut C, server: &mut S) -> SessionOutcome
where
    C: SyncMethod,
    S: SyncMethod,
{
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(e) => panic!("failed to build test runtime: {}", e),
    };
    runtime.block_on(run_pair(client, server))
}
