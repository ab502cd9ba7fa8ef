use std::sync::Arc;
use std::time::Duration;

use peerlink_net_peer_store::PeerStore;
use peerlink_net_primitives::{ConnectionId, ConnectionSummary, Direction, Status};
use peerlink_net_topology::{MulticodecTopology, Topology};

use crate::peers::{test_addr, test_peer_id};
use crate::{MemoryRegistrar, RecordingHandler};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
const SETTLE: Duration = Duration::from_millis(50);

/// Produces fresh multicodec topologies for [`topology_suite`].
pub trait TopologyFactory {
    /// A topology tracking exactly `multicodec` that reports to `handler`.
    fn topology(
        &self,
        multicodec: &str,
        handler: Arc<RecordingHandler>,
    ) -> MulticodecTopology<Arc<RecordingHandler>>;
}

impl<F> TopologyFactory for F
where
    F: Fn(&str, Arc<RecordingHandler>) -> MulticodecTopology<Arc<RecordingHandler>>,
{
    fn topology(
        &self,
        multicodec: &str,
        handler: Arc<RecordingHandler>,
    ) -> MulticodecTopology<Arc<RecordingHandler>> {
        self(multicodec, handler)
    }
}

/// Properties every [`Topology`] holds regardless of its inputs.
pub fn topology_properties<T: Topology>(topology: &T) {
    assert!(topology.min() <= topology.max());

    let peers = topology.peers();
    for peer in &peers {
        assert!(topology.is_tracked(peer));
    }
}

/// Run the event-driven topology scenarios against `factory`.
///
/// Must run on a tokio runtime; each scenario attaches to its own
/// [`MemoryRegistrar`].
pub async fn topology_suite<F: TopologyFactory>(factory: &F) {
    tracks_and_disconnects(factory).await;
    connects_once_with_live_connection(factory).await;
    connects_on_peer_connect(factory).await;
    reconciles_on_attach(factory).await;
    detach_stops_processing(factory).await;
}

const CODEC: &str = "/echo/1.0.0";

fn codecs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn open_connection(remote: u8) -> ConnectionSummary {
    ConnectionSummary {
        id: ConnectionId::from(format!("compliance-{remote}")),
        local_peer: test_peer_id(0),
        remote_peer: test_peer_id(remote),
        remote_addr: test_addr(remote.into()),
        direction: Direction::Inbound,
        status: Status::Open,
    }
}

/// Poll `condition` until it holds or the event timeout passes.
async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    if tokio::time::timeout(EVENT_TIMEOUT, wait).await.is_err() {
        panic!("timed out waiting for {what}");
    }
}

async fn tracks_and_disconnects<F: TopologyFactory>(factory: &F) {
    let registrar = Arc::new(MemoryRegistrar::default());
    let handler = Arc::new(RecordingHandler::default());
    let topology = factory.topology(CODEC, handler.clone());
    let subscription = topology.attach(registrar.clone());
    let peer = test_peer_id(1);

    registrar
        .peer_store
        .set_protocols(peer, codecs(&[CODEC]))
        .unwrap_or_else(|e| panic!("{e}"));
    eventually("peer to be tracked", || topology.peers().len() == 1).await;
    topology_properties(&topology);

    registrar
        .peer_store
        .set_protocols(peer, Vec::new())
        .unwrap_or_else(|e| panic!("{e}"));
    eventually("on_disconnect", || handler.disconnects() == vec![peer]).await;
    assert!(topology.peers().is_empty());

    tokio::time::sleep(SETTLE).await;
    assert_eq!(handler.disconnects().len(), 1);
    assert!(subscription.detach().await);
}

async fn connects_once_with_live_connection<F: TopologyFactory>(factory: &F) {
    let registrar = Arc::new(MemoryRegistrar::default());
    let handler = Arc::new(RecordingHandler::default());
    let topology = factory.topology(CODEC, handler.clone());
    let subscription = topology.attach(registrar.clone());
    let peer = test_peer_id(2);

    registrar.connections.insert_silently(open_connection(2));
    registrar
        .peer_store
        .set_protocols(peer, codecs(&[CODEC]))
        .unwrap_or_else(|e| panic!("{e}"));
    eventually("on_connect", || handler.connects() == vec![peer]).await;

    // Still matching: stays tracked without another callback.
    registrar
        .peer_store
        .add_protocols(peer, codecs(&["/other/1.0.0"]))
        .unwrap_or_else(|e| panic!("{e}"));
    tokio::time::sleep(SETTLE).await;
    assert_eq!(handler.connects(), vec![peer]);
    assert!(topology.is_tracked(&peer));
    assert!(subscription.detach().await);
}

async fn connects_on_peer_connect<F: TopologyFactory>(factory: &F) {
    let registrar = Arc::new(MemoryRegistrar::default());
    let handler = Arc::new(RecordingHandler::default());
    let topology = factory.topology(CODEC, handler.clone());
    let subscription = topology.attach(registrar.clone());
    let peer = test_peer_id(3);

    registrar
        .peer_store
        .set_protocols(peer, codecs(&[CODEC]))
        .unwrap_or_else(|e| panic!("{e}"));
    eventually("peer to be tracked", || topology.is_tracked(&peer)).await;
    assert!(handler.connects().is_empty());

    let connection = open_connection(3);
    registrar.connections.add(connection.clone());
    eventually("on_connect", || handler.connects() == vec![peer]).await;
    assert_eq!(handler.connect_ids(), vec![connection.id]);

    // Peers without a tracked protocol are ignored.
    registrar.connections.add(open_connection(4));
    tokio::time::sleep(SETTLE).await;
    assert!(!topology.is_tracked(&test_peer_id(4)));
    assert_eq!(handler.connects().len(), 1);
    assert!(subscription.detach().await);
}

async fn reconciles_on_attach<F: TopologyFactory>(factory: &F) {
    let registrar = Arc::new(MemoryRegistrar::default());
    registrar
        .peer_store
        .set_protocols(test_peer_id(5), codecs(&[CODEC, "/other/1.0.0"]))
        .unwrap_or_else(|e| panic!("{e}"));
    registrar
        .peer_store
        .set_protocols(test_peer_id(6), codecs(&["/other/1.0.0"]))
        .unwrap_or_else(|e| panic!("{e}"));
    registrar.connections.insert_silently(open_connection(5));

    let handler = Arc::new(RecordingHandler::default());
    let topology = factory.topology(CODEC, handler.clone());
    let subscription = topology.attach(registrar.clone());

    assert!(topology.is_tracked(&test_peer_id(5)));
    assert!(!topology.is_tracked(&test_peer_id(6)));
    assert_eq!(handler.connects(), vec![test_peer_id(5)]);
    assert!(subscription.detach().await);
}

async fn detach_stops_processing<F: TopologyFactory>(factory: &F) {
    let registrar = Arc::new(MemoryRegistrar::default());
    let handler = Arc::new(RecordingHandler::default());
    let topology = factory.topology(CODEC, handler.clone());
    let subscription = topology.attach(registrar.clone());
    assert!(subscription.is_active());

    assert!(subscription.detach().await);
    registrar
        .peer_store
        .set_protocols(test_peer_id(7), codecs(&[CODEC]))
        .unwrap_or_else(|e| panic!("{e}"));
    registrar.connections.add(open_connection(7));

    tokio::time::sleep(SETTLE).await;
    assert!(topology.peers().is_empty());
    assert!(handler.connects().is_empty());
}
