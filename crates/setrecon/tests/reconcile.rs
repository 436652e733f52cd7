//! End-to-end reconciliation through the facade.

use std::io::Write;

use setrecon::channel::{Channel, ConnectConfig, MemoryChannel, TcpChannel};
use setrecon::core::Element;
use setrecon::sync::{CpiSyncConfig, IbltSyncConfig, InterCpiSyncConfig};
use setrecon::{Engine, EngineConfig, SetDifference, SyncError, SyncMethod};

fn elems(values: &[u64]) -> Vec<Element> {
    let mut out: Vec<Element> = values.iter().map(|&v| Element::from_u64(v)).collect();
    out.sort();
    out
}

fn engine(config: &EngineConfig, values: impl IntoIterator<Item = u64>) -> Engine {
    let mut engine = Engine::from_config(config).unwrap();
    engine.extend(values.into_iter().map(Element::from_u64)).unwrap();
    engine
}

struct Outcome {
    client: Result<SetDifference, SyncError>,
    server: Result<SetDifference, SyncError>,
    client_sent: u64,
}

async fn session(client: &mut Engine, server: &mut Engine) -> Outcome {
    let (a, b) = MemoryChannel::pair();
    let client_side = async move {
        let mut a = a;
        let mut diff = SetDifference::new();
        let result = client.sync_client(&mut a, &mut diff).await;
        (result.map(|_| diff.sorted()), a.bytes_sent())
    };
    let server_side = async move {
        let mut b = b;
        let mut diff = SetDifference::new();
        server.sync_server(&mut b, &mut diff).await.map(|_| diff.sorted())
    };
    let ((client, client_sent), server) = tokio::join!(client_side, server_side);
    Outcome {
        client,
        server,
        client_sent,
    }
}

#[tokio::test]
async fn cpisync_small_sets_from_json() -> anyhow::Result<()> {
    let config = EngineConfig::from_json_str(
        r#"{"cpi_sync": {"max_diff": 4, "bits": 8, "epsilon": 8}}"#,
    )?;
    let mut alice = engine(&config, [1, 2, 3]);
    let mut bob = engine(&config, [2, 3, 4]);

    let outcome = session(&mut alice, &mut bob).await;
    let client = outcome.client?;
    let server = outcome.server?;
    assert_eq!(client.mine_not_theirs, elems(&[1]));
    assert_eq!(client.theirs_not_mine, elems(&[4]));
    assert_eq!(server.mine_not_theirs, elems(&[4]));
    assert_eq!(server.theirs_not_mine, elems(&[1]));
    Ok(())
}

#[tokio::test]
async fn mismatched_bits_fail_on_both_sides() {
    let eight = EngineConfig::CpiSync(CpiSyncConfig {
        max_diff: 4,
        bits: 8,
        ..CpiSyncConfig::default()
    });
    let nine = EngineConfig::CpiSync(CpiSyncConfig {
        max_diff: 4,
        bits: 9,
        ..CpiSyncConfig::default()
    });
    let mut alice = engine(&eight, [1, 2]);
    let mut bob = engine(&nine, [1, 2]);

    let outcome = session(&mut alice, &mut bob).await;
    assert!(matches!(outcome.client, Err(SyncError::ParameterMismatch(_))));
    assert!(matches!(outcome.server, Err(SyncError::ParameterMismatch(_))));
}

#[tokio::test]
async fn different_engine_kinds_refuse_each_other() {
    let cpi = EngineConfig::CpiSync(CpiSyncConfig::default());
    let iblt = EngineConfig::IbltSync(IbltSyncConfig::default());
    let mut alice = engine(&iblt, [1]);
    let mut bob = engine(&cpi, [1]);
    let outcome = session(&mut alice, &mut bob).await;
    assert!(outcome.client.is_err());
    assert!(outcome.server.is_err());
}

#[tokio::test]
async fn every_engine_finds_the_same_difference() -> anyhow::Result<()> {
    let configs = [
        EngineConfig::CpiSync(CpiSyncConfig {
            max_diff: 16,
            bits: 24,
            ..CpiSyncConfig::default()
        }),
        EngineConfig::CpiSync(CpiSyncConfig {
            max_diff: 16,
            bits: 24,
            probabilistic: true,
            ..CpiSyncConfig::default()
        }),
        EngineConfig::CpiSync(CpiSyncConfig {
            max_diff: 16,
            bits: 24,
            hashed: true,
            ..CpiSyncConfig::default()
        }),
        EngineConfig::InterCpiSync(InterCpiSyncConfig {
            max_diff: 4,
            bits: 24,
            ..InterCpiSyncConfig::default()
        }),
        EngineConfig::IbltSync(IbltSyncConfig::default()),
        EngineConfig::IbltMultisetSync(IbltSyncConfig::default()),
        EngineConfig::FullSync(Default::default()),
    ];

    let shared: Vec<u64> = (0..200).map(|v| v * 37 + 5).collect();
    let alice_only = [1_000_001, 1_000_002, 1_000_003, 1_000_004, 1_000_005];
    let bob_only = [2_000_001, 2_000_002, 2_000_003];

    for config in &configs {
        let mut alice = engine(config, shared.iter().copied().chain(alice_only));
        let mut bob = engine(config, shared.iter().copied().chain(bob_only));
        let outcome = session(&mut alice, &mut bob).await;
        let client = outcome.client?;
        assert_eq!(client.mine_not_theirs, elems(&alice_only), "{}", alice.name());
        assert_eq!(client.theirs_not_mine, elems(&bob_only), "{}", alice.name());
        assert_eq!(outcome.server?.mine_not_theirs, elems(&bob_only));
    }
    Ok(())
}

#[tokio::test]
async fn cpisync_sends_less_than_full_sync() -> anyhow::Result<()> {
    let cpi = EngineConfig::CpiSync(CpiSyncConfig {
        max_diff: 8,
        bits: 32,
        ..CpiSyncConfig::default()
    });
    let full = EngineConfig::FullSync(Default::default());
    let shared: Vec<u64> = (0..2000).collect();

    let mut sent = Vec::new();
    for config in [&cpi, &full] {
        let mut alice = engine(config, shared.iter().copied().chain([5_000_000]));
        let mut bob = engine(config, shared.iter().copied().chain([6_000_000]));
        let outcome = session(&mut alice, &mut bob).await;
        assert_eq!(outcome.client?.len(), 2);
        sent.push(outcome.client_sent);
    }
    assert!(sent[0] * 10 < sent[1], "cpisync {} vs full {}", sent[0], sent[1]);
    Ok(())
}

#[tokio::test]
async fn interactive_sync_resolves_beyond_node_bound() -> anyhow::Result<()> {
    let config = EngineConfig::InterCpiSync(InterCpiSyncConfig {
        max_diff: 2,
        bits: 20,
        p_factor: 4,
        ..InterCpiSyncConfig::default()
    });
    let mut alice = engine(&config, (0..40).map(|v| v * 997));
    let mut bob = engine(&config, (10..50).map(|v| v * 997));
    let outcome = session(&mut alice, &mut bob).await;
    let client = outcome.client?;
    assert_eq!(client.mine_not_theirs.len(), 10);
    assert_eq!(client.theirs_not_mine.len(), 10);
    Ok(())
}

#[tokio::test]
async fn dropped_peer_is_a_transport_error() {
    let mut alice = engine(&EngineConfig::default(), [1, 2, 3]);
    let (mut a, b) = MemoryChannel::pair();
    drop(b);
    let mut diff = SetDifference::new();
    let result = alice.sync_client(&mut a, &mut diff).await;
    assert!(matches!(result, Err(SyncError::Transport(_))));
    assert!(diff.is_empty());
}

#[tokio::test]
async fn sync_over_tcp() -> anyhow::Result<()> {
    let config = EngineConfig::CpiSync(CpiSyncConfig {
        max_diff: 8,
        bits: 16,
        ..CpiSyncConfig::default()
    });
    let mut alice = engine(&config, [10, 20, 30, 40]);
    let mut bob = engine(&config, [20, 30, 50]);

    let listener = TcpChannel::listen("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let connect = ConnectConfig::default();
    let (server, client) = tokio::join!(
        bob.accept_and_sync(&listener),
        alice.connect_and_sync(&addr, &connect),
    );
    let client = client?;
    assert_eq!(client.mine_not_theirs, elems(&[10, 40]));
    assert_eq!(client.theirs_not_mine, elems(&[50]));
    let mut server = server?;
    server.mine_not_theirs.sort();
    assert_eq!(server.mine_not_theirs, elems(&[50]));
    Ok(())
}

#[tokio::test]
async fn engine_config_from_file() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{"inter_cpi_sync": {{"max_diff": 4, "bits": 16, "p_factor": 2}}}}"#
    )?;
    let config = EngineConfig::from_json_path(file.path())?;
    let engine = Engine::from_config(&config)?;
    assert_eq!(engine.protocol_id(), setrecon::ProtocolId::InteractiveCpiSync);
    assert!(engine.is_empty());
    Ok(())
}

#[test]
fn invalid_engine_parameters_rejected() {
    let config = EngineConfig::CpiSync(CpiSyncConfig {
        max_diff: 0,
        ..CpiSyncConfig::default()
    });
    assert!(matches!(
        Engine::from_config(&config),
        Err(SyncError::InvalidConfig(_))
    ));
}
