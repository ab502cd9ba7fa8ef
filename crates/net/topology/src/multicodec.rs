//! Topology tracking peers by supported protocol ids.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use libp2p::PeerId;
use parking_lot::RwLock;
use peerlink_net_peer_store::{PeerRecord, PeerStoreEvent};
use peerlink_net_primitives::{ConnectionSummary, intersects};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::TopologyConfig;
use crate::error::TopologyError;
use crate::handler::TopologyHandler;
use crate::registrar::{ConnectionEvent, Registrar};
use crate::subscription::TopologySubscription;
use crate::Topology;

/// Tracks peers whose protocol list intersects a set of multicodecs.
///
/// A peer is tracked iff the last protocol list observed for it contains at
/// least one tracked multicodec. The registrar is held weakly; once it is
/// dropped lookups degrade to "no data".
///
/// Cloning yields another handle on the same tracker.
pub struct MulticodecTopology<H> {
    inner: Arc<Inner<H>>,
}

struct Inner<H> {
    config: TopologyConfig,
    multicodecs: Vec<String>,
    handler: H,
    peers: RwLock<HashSet<PeerId>>,
    registrar: RwLock<Option<Weak<dyn Registrar>>>,
}

impl<H> Clone for MulticodecTopology<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: TopologyHandler> MulticodecTopology<H> {
    pub fn new<I, S>(config: TopologyConfig, multicodecs: I, handler: H) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let multicodecs: Vec<String> = multicodecs.into_iter().map(Into::into).collect();
        if multicodecs.is_empty() {
            return Err(TopologyError::NoMulticodecs);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                multicodecs,
                handler,
                peers: RwLock::default(),
                registrar: RwLock::new(None),
            }),
        })
    }

    pub fn multicodecs(&self) -> &[String] {
        &self.inner.multicodecs
    }

    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    pub fn len(&self) -> usize {
        self.inner.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.peers.read().is_empty()
    }

    /// Whether `protocols` contains a tracked multicodec.
    pub fn matches<P: AsRef<str>>(&self, protocols: &[P]) -> bool {
        intersects(protocols, &self.inner.multicodecs)
    }

    /// Attach to `registrar` and start following its events.
    ///
    /// Subscribes to protocol changes and new connections, reconciles every
    /// peer already in the store, then spawns the event task on the current
    /// tokio runtime. Attaching again replaces the previous registrar; the old
    /// subscription keeps running until it is detached or dropped.
    pub fn attach<R: Registrar + 'static>(&self, registrar: Arc<R>) -> TopologySubscription {
        let registrar: Arc<dyn Registrar> = registrar;
        *self.inner.registrar.write() = Some(Arc::downgrade(&registrar));

        let peer_events = registrar.peer_store().subscribe();
        let connection_events = registrar.connection_manager().subscribe();

        debug!(target: "topology", multicodecs = ?self.inner.multicodecs, "attaching to registrar");
        self.reconcile(&*registrar);

        let token = CancellationToken::new();
        let handle = tokio::spawn(
            EventLoop {
                topology: self.clone(),
                registrar: Arc::downgrade(&registrar),
                peer_events,
                connection_events,
                token: token.clone(),
            }
            .run(),
        );

        TopologySubscription::new(token, handle)
    }

    /// Re-evaluate `records`, tracking peers that match and untracking peers
    /// that no longer do.
    ///
    /// `on_connect` fires for a peer that becomes tracked while it has a live
    /// connection; `on_disconnect` fires for a peer that stops being tracked.
    pub fn update_peers(&self, records: impl IntoIterator<Item = PeerRecord>) {
        for record in records {
            if !self.matches(&record.protocols) {
                self.untrack(&record.id);
                continue;
            }

            let newly_tracked = self.inner.peers.write().insert(record.id);
            if !newly_tracked {
                continue;
            }
            trace!(target: "topology", peer = %record.id, "peer tracked");
            self.record_size();

            if let Some(connection) = self.live_connection(&record.id) {
                self.inner.handler.on_connect(&record.id, &connection);
            }
        }
    }

    /// React to `peer` now advertising `protocols`.
    pub fn on_protocol_change(&self, peer: &PeerId, protocols: &[String]) {
        if !self.matches(protocols) {
            self.untrack(peer);
            return;
        }

        // The store is authoritative. Fall back to the reported list when the
        // record is unavailable.
        let record = self
            .with_registrar(|registrar| registrar.peer_store().get(peer).ok().flatten())
            .flatten()
            .unwrap_or_else(|| PeerRecord {
                id: *peer,
                protocols: protocols.to_vec(),
                addresses: Vec::new(),
            });
        self.update_peers([record]);
    }

    /// React to a new connection.
    ///
    /// If the remote peer supports a tracked multicodec it is tracked and
    /// `on_connect` fires, whether or not it was already tracked.
    pub fn on_peer_connect(&self, connection: &ConnectionSummary) {
        let peer = connection.remote_peer;
        let protocols = self
            .with_registrar(|registrar| registrar.peer_store().protocols(&peer).ok())
            .flatten()
            .unwrap_or_default();

        if !self.matches(&protocols) {
            return;
        }

        if self.inner.peers.write().insert(peer) {
            trace!(target: "topology", %peer, "peer tracked on connect");
            self.record_size();
        }
        self.inner.handler.on_connect(&peer, connection);
    }

    fn reconcile(&self, registrar: &dyn Registrar) {
        match registrar.peer_store().peers() {
            Ok(records) => self.update_peers(records),
            Err(e) => warn!(target: "topology", error = %e, "failed to load peers for reconciliation"),
        }
    }

    /// Stop tracking `peer`, firing `on_disconnect` if it was tracked.
    fn untrack(&self, peer: &PeerId) {
        if self.inner.peers.write().remove(peer) {
            trace!(target: "topology", %peer, "peer untracked");
            self.record_size();
            self.inner.handler.on_disconnect(peer);
        }
    }

    fn live_connection(&self, peer: &PeerId) -> Option<ConnectionSummary> {
        self.with_registrar(|registrar| {
            registrar
                .connection_manager()
                .connections(peer)
                .into_iter()
                .find(|connection| connection.status.is_open())
        })
        .flatten()
    }

    fn with_registrar<T>(&self, f: impl FnOnce(&dyn Registrar) -> T) -> Option<T> {
        let registrar = self.inner.registrar.read().as_ref()?.upgrade()?;
        Some(f(&*registrar))
    }

    fn record_size(&self) {
        let len = self.len();
        ::metrics::gauge!(
            "peerlink_topology_peers",
            "multicodecs" => self.inner.multicodecs.join(",")
        )
        .set(len as f64);
    }
}

impl<H: TopologyHandler> Topology for MulticodecTopology<H> {
    fn min(&self) -> usize {
        self.inner.config.min
    }

    fn max(&self) -> usize {
        self.inner.config.max
    }

    fn peers(&self) -> HashSet<PeerId> {
        self.inner.peers.read().clone()
    }

    fn is_tracked(&self, peer: &PeerId) -> bool {
        self.inner.peers.read().contains(peer)
    }
}

impl<H> std::fmt::Debug for MulticodecTopology<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MulticodecTopology")
            .field("config", &self.inner.config)
            .field("multicodecs", &self.inner.multicodecs)
            .field("peers", &self.inner.peers.read().len())
            .finish()
    }
}

struct EventLoop<H> {
    topology: MulticodecTopology<H>,
    registrar: Weak<dyn Registrar>,
    peer_events: broadcast::Receiver<PeerStoreEvent>,
    connection_events: broadcast::Receiver<ConnectionEvent>,
    token: CancellationToken,
}

impl<H: TopologyHandler> EventLoop<H> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.token.cancelled() => break,

                event = self.peer_events.recv() => match event {
                    Ok(PeerStoreEvent::ProtocolsChanged { peer_id, protocols, .. }) => {
                        self.topology.on_protocol_change(&peer_id, &protocols);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: "topology", skipped, "peer store events lagged, reconciling");
                        let Some(registrar) = self.registrar.upgrade() else { break };
                        self.topology.reconcile(&*registrar);
                    }
                    Err(RecvError::Closed) => break,
                },

                event = self.connection_events.recv() => match event {
                    Ok(ConnectionEvent::PeerConnected(connection)) => {
                        self.topology.on_peer_connect(&connection);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: "topology", skipped, "connection events lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!(target: "topology", "topology event loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use peerlink_net_peer_store::{MemoryPeerStore, PeerStore};
    use peerlink_net_primitives::{ConnectionId, Direction, Status};

    use super::*;
    use crate::registrar::ConnectionManager;

    fn peer(n: u8) -> PeerId {
        let key = libp2p::identity::ed25519::SecretKey::try_from_bytes([n; 32]).unwrap();
        libp2p::identity::Keypair::from(libp2p::identity::ed25519::Keypair::from(key))
            .public()
            .to_peer_id()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn summary(remote: PeerId, status: Status) -> ConnectionSummary {
        ConnectionSummary {
            id: ConnectionId::from("c1"),
            local_peer: peer(100),
            remote_peer: remote,
            remote_addr: "/ip4/127.0.0.1/tcp/4001".parse().unwrap(),
            direction: Direction::Outbound,
            status,
        }
    }

    #[derive(Default)]
    struct Recorder {
        connects: Mutex<Vec<PeerId>>,
        disconnects: Mutex<Vec<PeerId>>,
    }

    impl TopologyHandler for Recorder {
        fn on_connect(&self, peer: &PeerId, _connection: &ConnectionSummary) {
            self.connects.lock().push(*peer);
        }

        fn on_disconnect(&self, peer: &PeerId) {
            self.disconnects.lock().push(*peer);
        }
    }

    struct Connections {
        live: Mutex<Vec<ConnectionSummary>>,
        events: broadcast::Sender<ConnectionEvent>,
    }

    impl Default for Connections {
        fn default() -> Self {
            Self {
                live: Mutex::default(),
                events: broadcast::channel(16).0,
            }
        }
    }

    impl ConnectionManager for Connections {
        fn connections(&self, peer: &PeerId) -> Vec<ConnectionSummary> {
            self.live
                .lock()
                .iter()
                .filter(|c| &c.remote_peer == peer)
                .cloned()
                .collect()
        }

        fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
            self.events.subscribe()
        }
    }

    #[derive(Default)]
    struct TestRegistrar {
        store: MemoryPeerStore,
        connections: Connections,
    }

    impl Registrar for TestRegistrar {
        fn peer_store(&self) -> &dyn PeerStore {
            &self.store
        }

        fn connection_manager(&self) -> &dyn ConnectionManager {
            &self.connections
        }
    }

    fn topology() -> (MulticodecTopology<Arc<Recorder>>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let topology =
            MulticodecTopology::new(TopologyConfig::default(), ["/echo/1.0.0"], recorder.clone())
                .unwrap();
        (topology, recorder)
    }

    #[test]
    fn test_requires_multicodecs() {
        let result = MulticodecTopology::new(TopologyConfig::default(), Vec::<String>::new(), ());
        assert_matches!(result, Err(TopologyError::NoMulticodecs));
    }

    #[test]
    fn test_thresholds_are_reported() {
        let config = TopologyConfig { min: 2, max: 8 };
        let topology = MulticodecTopology::new(config, ["/a"], ()).unwrap();
        assert_eq!(topology.min(), 2);
        assert_eq!(topology.max(), 8);

        let topology = MulticodecTopology::new(TopologyConfig::default(), ["/a"], ()).unwrap();
        assert_eq!(topology.min(), 0);
        assert_eq!(topology.max(), usize::MAX);
    }

    #[test]
    fn test_update_peers_without_registrar() {
        let (topology, recorder) = topology();

        topology.update_peers([
            PeerRecord::new(peer(1)).with_protocols(["/echo/1.0.0"]),
            PeerRecord::new(peer(2)).with_protocols(["/other/1.0.0"]),
        ]);

        assert_eq!(topology.peers(), HashSet::from([peer(1)]));
        assert!(recorder.connects.lock().is_empty());
    }

    #[test]
    fn test_update_peers_untracks_with_disconnect() {
        let (topology, recorder) = topology();

        topology.update_peers([PeerRecord::new(peer(1)).with_protocols(["/echo/1.0.0"])]);
        topology.update_peers([PeerRecord::new(peer(1))]);
        topology.update_peers([PeerRecord::new(peer(1))]);

        assert!(topology.is_empty());
        assert_eq!(*recorder.disconnects.lock(), vec![peer(1)]);
    }

    #[test]
    fn test_protocol_change_without_registrar_uses_reported_list() {
        let (topology, recorder) = topology();

        topology.on_protocol_change(&peer(1), &strings(&["/echo/1.0.0"]));
        assert!(topology.is_tracked(&peer(1)));

        topology.on_protocol_change(&peer(1), &[]);
        assert!(!topology.is_tracked(&peer(1)));
        assert_eq!(*recorder.disconnects.lock(), vec![peer(1)]);
    }

    #[test]
    fn test_unknown_peer_losing_protocols_is_silent() {
        let (topology, recorder) = topology();
        topology.on_protocol_change(&peer(1), &[]);
        assert!(recorder.disconnects.lock().is_empty());
    }

    #[tokio::test]
    async fn test_attach_reconciles_known_peers() {
        let registrar = Arc::new(TestRegistrar::default());
        registrar
            .store
            .set_protocols(peer(1), strings(&["/echo/1.0.0"]))
            .unwrap();
        registrar
            .store
            .set_protocols(peer(2), strings(&["/ping/1.0.0"]))
            .unwrap();
        registrar
            .connections
            .live
            .lock()
            .push(summary(peer(1), Status::Open));

        let (topology, recorder) = topology();
        let subscription = topology.attach(registrar.clone());

        assert_eq!(topology.peers(), HashSet::from([peer(1)]));
        assert_eq!(*recorder.connects.lock(), vec![peer(1)]);
        assert!(subscription.detach().await);
    }

    #[tokio::test]
    async fn test_closed_connections_do_not_fire_connect() {
        let registrar = Arc::new(TestRegistrar::default());
        registrar
            .store
            .set_protocols(peer(1), strings(&["/echo/1.0.0"]))
            .unwrap();
        registrar
            .connections
            .live
            .lock()
            .push(summary(peer(1), Status::Closed));

        let (topology, recorder) = topology();
        let _subscription = topology.attach(registrar);

        assert!(topology.is_tracked(&peer(1)));
        assert!(recorder.connects.lock().is_empty());
    }

    #[tokio::test]
    async fn test_on_peer_connect() {
        let registrar = Arc::new(TestRegistrar::default());
        registrar
            .store
            .set_protocols(peer(1), strings(&["/echo/1.0.0"]))
            .unwrap();

        let (topology, recorder) = topology();
        let _subscription = topology.attach(registrar.clone());

        topology.on_peer_connect(&summary(peer(1), Status::Open));
        topology.on_peer_connect(&summary(peer(2), Status::Open));

        assert_eq!(topology.peers(), HashSet::from([peer(1)]));
        assert_eq!(*recorder.connects.lock(), vec![peer(1)]);
    }

    #[tokio::test]
    async fn test_dropped_registrar_degrades_to_no_match() {
        let registrar = Arc::new(TestRegistrar::default());
        registrar
            .store
            .set_protocols(peer(1), strings(&["/echo/1.0.0"]))
            .unwrap();

        let (topology, recorder) = topology();
        let subscription = topology.attach(registrar.clone());
        subscription.detach().await;
        topology.update_peers([PeerRecord::new(peer(1))]);
        drop(registrar);

        topology.on_peer_connect(&summary(peer(1), Status::Open));
        assert!(recorder.connects.lock().is_empty());
    }

    struct PanickingHandler;

    impl TopologyHandler for PanickingHandler {
        fn on_connect(&self, _peer: &PeerId, _connection: &ConnectionSummary) {
            panic!("handler failed");
        }
    }

    #[tokio::test]
    async fn test_detach_reports_failed_event_task() {
        let registrar = Arc::new(TestRegistrar::default());
        registrar
            .store
            .set_protocols(peer(1), strings(&["/echo/1.0.0"]))
            .unwrap();

        let topology =
            MulticodecTopology::new(TopologyConfig::default(), ["/echo/1.0.0"], PanickingHandler)
                .unwrap();
        let subscription = topology.attach(registrar.clone());

        registrar
            .connections
            .events
            .send(ConnectionEvent::PeerConnected(summary(peer(1), Status::Open)))
            .unwrap();
        while subscription.is_active() {
            tokio::task::yield_now().await;
        }

        assert!(!subscription.detach().await);
    }
}
