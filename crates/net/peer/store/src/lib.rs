//! Protocol and address book for known peers.
//!
//! Only an in-memory implementation is provided. Topologies observe protocol
//! changes through [`PeerStore::subscribe`].

mod events;
mod memory;
mod record;

use auto_impl::auto_impl;
use libp2p::{Multiaddr, PeerId};
use thiserror::Error;
use tokio::sync::broadcast;

pub use events::{EventEmitter, PeerStoreEvent};
pub use memory::MemoryPeerStore;
pub use record::PeerRecord;

#[derive(Debug, Error)]
pub enum PeerStoreError {
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Peer book with auto-impl for &, Box, Arc.
///
/// Mutations that change a peer's protocol list emit
/// [`PeerStoreEvent::ProtocolsChanged`]; writes that leave the list as it was
/// emit nothing.
#[auto_impl(&, Box, Arc)]
pub trait PeerStore: Send + Sync {
    /// Every known peer.
    fn peers(&self) -> Result<Vec<PeerRecord>, PeerStoreError>;

    fn get(&self, peer: &PeerId) -> Result<Option<PeerRecord>, PeerStoreError>;

    fn contains(&self, peer: &PeerId) -> Result<bool, PeerStoreError> {
        Ok(self.get(peer)?.is_some())
    }

    /// Protocols of a known peer. Fails with [`PeerStoreError::UnknownPeer`].
    fn protocols(&self, peer: &PeerId) -> Result<Vec<String>, PeerStoreError> {
        self.get(peer)?
            .map(|record| record.protocols)
            .ok_or(PeerStoreError::UnknownPeer(*peer))
    }

    /// Replace the protocol list, creating the peer if needed.
    fn set_protocols(&self, peer: PeerId, protocols: Vec<String>) -> Result<(), PeerStoreError>;

    /// Append protocols not yet known for the peer.
    fn add_protocols(&self, peer: PeerId, protocols: Vec<String>) -> Result<(), PeerStoreError>;

    fn remove_protocols(&self, peer: &PeerId, protocols: &[String]) -> Result<(), PeerStoreError>;

    fn add_addresses(&self, peer: PeerId, addresses: Vec<Multiaddr>)
    -> Result<(), PeerStoreError>;

    /// Addresses of a known peer. Fails with [`PeerStoreError::UnknownPeer`].
    fn addresses(&self, peer: &PeerId) -> Result<Vec<Multiaddr>, PeerStoreError> {
        self.get(peer)?
            .map(|record| record.addresses)
            .ok_or(PeerStoreError::UnknownPeer(*peer))
    }

    /// Forget a peer. A peer that had protocols reports an empty list.
    fn delete(&self, peer: &PeerId) -> Result<(), PeerStoreError>;

    fn subscribe(&self) -> broadcast::Receiver<PeerStoreEvent>;
}
