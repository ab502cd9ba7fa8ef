//! `peerlink echo`: connection, topology and negotiation end to end.

use std::sync::Arc;

use eyre::{Result, WrapErr, eyre};
use futures::io::{AsyncReadExt, AsyncWriteExt};
use libp2p::identity::{Keypair, ed25519};
use peerlink_net_connection::{Connection, MuxedStream};
use peerlink_net_peer_store::PeerStore;
use peerlink_net_primitives::{
    ConnectionSummary, Direction, Multiaddr, PeerId, Timeline, unix_timestamp_millis,
};
use peerlink_net_topology::{MulticodecTopology, Topology, TopologyHandler};
use peerlink_net_memory::{MemoryMuxer, MemoryRegistrar};
use tracing::{info, warn};

use crate::cli::EchoArgs;
use crate::config::DemoConfig;

/// Logs topology callbacks.
struct LoggingHandler;

impl TopologyHandler for LoggingHandler {
    fn on_connect(&self, peer: &PeerId, connection: &ConnectionSummary) {
        info!(target: "peerlink", %peer, connection = %connection.id, "topology: peer connected");
    }

    fn on_disconnect(&self, peer: &PeerId) {
        info!(target: "peerlink", %peer, "topology: peer disconnected");
    }
}

fn ephemeral_peer_id() -> Result<PeerId> {
    let secret = ed25519::SecretKey::try_from_bytes(rand::random::<[u8; 32]>())
        .map_err(|e| eyre!("failed to derive key: {e}"))?;
    Ok(Keypair::from(ed25519::Keypair::from(secret))
        .public()
        .to_peer_id())
}

pub(crate) async fn run(config: DemoConfig, args: &EchoArgs) -> Result<()> {
    let local = ephemeral_peer_id()?;
    let remote = ephemeral_peer_id()?;
    let remote_addr: Multiaddr = "/memory/1".parse().wrap_err("invalid remote address")?;

    let registrar = Arc::new(MemoryRegistrar::default());
    let topology = MulticodecTopology::new(
        config.topology,
        config.echo.protocols.iter().cloned(),
        LoggingHandler,
    )?;
    let subscription = topology.attach(registrar.clone());

    registrar
        .peer_store
        .set_protocols(remote, config.echo.remote_protocols.clone())?;

    let muxer = MemoryMuxer::with_config(
        config.echo.remote_protocols.iter().cloned(),
        config.multistream.clone(),
    );
    let now = unix_timestamp_millis();
    let connection = Connection::builder()
        .local_peer(local)
        .remote_peer(remote)
        .expected_remote_peer(remote)
        .remote_addr(remote_addr)
        .direction(Direction::Outbound)
        .timeline(Timeline::new(now).with_upgraded(now))
        .multiplexer("/memory-mux/1.0.0")
        .encryption("/plaintext/2.0.0")
        .tag("demo")
        .capabilities(muxer)
        .build()?;
    registrar.connections.add(connection.summary());
    info!(target: "peerlink", id = %connection.id(), %remote, "connection open");

    let result = exchange_and_close(&connection, &config.echo.protocols, args).await;

    println!(
        "tracked peers: {} (min {}, max {})",
        topology.peers().len(),
        topology.min(),
        topology.max(),
    );
    if !subscription.detach().await {
        warn!(target: "peerlink", "topology event task did not exit cleanly");
    }
    result
}

/// Round-trip `args.message` over `args.streams` streams, then close the
/// connection whether or not the exchange succeeded.
async fn exchange_and_close(
    connection: &Connection<MemoryMuxer>,
    protocols: &[String],
    args: &EchoArgs,
) -> Result<()> {
    let exchanged = exchange(connection, protocols, args).await;
    println!(
        "live streams: {}, registered streams: {}",
        connection.streams().len(),
        connection.registered_stream_count()
    );

    let closed = connection.close().await;
    let stat = connection.stat();
    println!("connection {} {} after {:?}", connection.id(), stat.status, stat.timeline);

    exchanged?;
    closed.wrap_err("failed to close connection")
}

async fn exchange(
    connection: &Connection<MemoryMuxer>,
    protocols: &[String],
    args: &EchoArgs,
) -> Result<()> {
    for n in 0..args.streams {
        let mut negotiated = connection
            .new_stream(protocols.to_vec())
            .await
            .wrap_err("failed to open stream")?;

        let message = args.message.as_bytes();
        negotiated.stream.write_all(message).await?;
        negotiated.stream.flush().await?;

        let mut reply = vec![0u8; message.len()];
        negotiated.stream.read_exact(&mut reply).await?;
        println!(
            "stream {n} [{}] {}: {}",
            negotiated.stream.id(),
            negotiated.protocol,
            String::from_utf8_lossy(&reply)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use peerlink_net_primitives::Status;

    use super::*;

    fn connection(remote_protocols: &[&str]) -> Connection<MemoryMuxer> {
        Connection::builder()
            .local_peer(ephemeral_peer_id().unwrap())
            .remote_peer(ephemeral_peer_id().unwrap())
            .remote_addr("/memory/1".parse().unwrap())
            .direction(Direction::Outbound)
            .capabilities(MemoryMuxer::new(remote_protocols.iter().copied()))
            .build()
            .unwrap()
    }

    fn args(streams: usize) -> EchoArgs {
        EchoArgs {
            protocols: Vec::new(),
            remote_protocols: Vec::new(),
            message: "ping".to_string(),
            streams,
        }
    }

    #[tokio::test]
    async fn test_exchange_closes_connection() {
        let connection = connection(&["/echo/1.0.0"]);
        let protocols = vec!["/echo/1.0.0".to_string()];

        exchange_and_close(&connection, &protocols, &args(2))
            .await
            .unwrap();
        assert_eq!(connection.status(), Status::Closed);
        assert_eq!(connection.registered_stream_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_exchange_still_closes_connection() {
        let connection = connection(&["/ping/1.0.0"]);
        let protocols = vec!["/echo/1.0.0".to_string()];

        let result = exchange_and_close(&connection, &protocols, &args(1)).await;
        assert!(result.is_err());
        assert_eq!(connection.status(), Status::Closed);
        assert!(connection.timeline().close.is_some());
    }
}
