//! In-memory registrar for topologies.

use parking_lot::Mutex;
use peerlink_net_peer_store::{MemoryPeerStore, PeerStore};
use peerlink_net_primitives::{ConnectionId, ConnectionSummary, PeerId};
use peerlink_net_topology::{ConnectionEvent, ConnectionManager, Registrar, TopologyHandler};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Connection manager holding connection summaries.
#[derive(Debug)]
pub struct MemoryConnectionManager {
    connections: Mutex<Vec<ConnectionSummary>>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl Default for MemoryConnectionManager {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connections: Mutex::default(),
            events,
        }
    }
}

impl MemoryConnectionManager {
    /// Record a connection and announce it.
    pub fn add(&self, connection: ConnectionSummary) {
        self.connections.lock().push(connection.clone());
        let _ = self.events.send(ConnectionEvent::PeerConnected(connection));
    }

    /// Record a connection without announcing it.
    pub fn insert_silently(&self, connection: ConnectionSummary) {
        self.connections.lock().push(connection);
    }

    pub fn remove(&self, id: &ConnectionId) {
        self.connections.lock().retain(|c| &c.id != id);
    }
}

impl ConnectionManager for MemoryConnectionManager {
    fn connections(&self, peer: &PeerId) -> Vec<ConnectionSummary> {
        self.connections
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

/// Registrar over a [`MemoryPeerStore`] and a [`MemoryConnectionManager`].
#[derive(Debug, Default)]
pub struct MemoryRegistrar {
    pub peer_store: MemoryPeerStore,
    pub connections: MemoryConnectionManager,
}

impl Registrar for MemoryRegistrar {
    fn peer_store(&self) -> &dyn PeerStore {
        &self.peer_store
    }

    fn connection_manager(&self) -> &dyn ConnectionManager {
        &self.connections
    }
}
