//! Collaborators a topology observes.

use auto_impl::auto_impl;
use libp2p::PeerId;
use peerlink_net_peer_store::PeerStore;
use peerlink_net_primitives::ConnectionSummary;
use tokio::sync::broadcast;

/// Connection manager events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    PeerConnected(ConnectionSummary),
}

/// Source of live connections and connect notifications.
#[auto_impl(&, Box, Arc)]
pub trait ConnectionManager: Send + Sync {
    /// Connections to `peer`, in any status.
    fn connections(&self, peer: &PeerId) -> Vec<ConnectionSummary>;

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;
}

/// Access to the peer store and connection manager of a node.
#[auto_impl(&, Box, Arc)]
pub trait Registrar: Send + Sync {
    fn peer_store(&self) -> &dyn PeerStore;

    fn connection_manager(&self) -> &dyn ConnectionManager;
}
