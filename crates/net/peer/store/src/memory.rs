//! In-memory peer store (does not persist across restarts).

use std::collections::HashMap;

use libp2p::{Multiaddr, PeerId};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use crate::events::{EventEmitter, PeerStoreEvent};
use crate::record::PeerRecord;
use crate::{PeerStore, PeerStoreError};

/// In-memory peer store.
#[derive(Debug, Default)]
pub struct MemoryPeerStore {
    peers: RwLock<HashMap<PeerId, PeerRecord>>,
    events: EventEmitter,
}

impl MemoryPeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            peers: RwLock::default(),
            events: EventEmitter::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Apply `update` to the peer's record (created if missing) and emit an
    /// event if its protocol list changed. The event is sent after the lock is
    /// released.
    fn update_protocols(&self, peer: PeerId, update: impl FnOnce(&mut PeerRecord)) {
        let changed = {
            let mut peers = self.peers.write();
            let record = peers.entry(peer).or_insert_with(|| PeerRecord::new(peer));
            let previous = record.protocols.clone();
            update(record);
            (record.protocols != previous).then(|| (record.protocols.clone(), previous))
        };

        if let Some((protocols, previous)) = changed {
            trace!(target: "peer_store", %peer, ?protocols, "protocols changed");
            self.events.protocols_changed(peer, protocols, previous);
        }
    }
}

impl PeerStore for MemoryPeerStore {
    fn peers(&self) -> Result<Vec<PeerRecord>, PeerStoreError> {
        Ok(self.peers.read().values().cloned().collect())
    }

    fn get(&self, peer: &PeerId) -> Result<Option<PeerRecord>, PeerStoreError> {
        Ok(self.peers.read().get(peer).cloned())
    }

    fn set_protocols(&self, peer: PeerId, protocols: Vec<String>) -> Result<(), PeerStoreError> {
        self.update_protocols(peer, |record| {
            record.protocols.clear();
            record.extend_protocols(protocols);
        });
        Ok(())
    }

    fn add_protocols(&self, peer: PeerId, protocols: Vec<String>) -> Result<(), PeerStoreError> {
        self.update_protocols(peer, |record| {
            record.extend_protocols(protocols);
        });
        Ok(())
    }

    fn remove_protocols(&self, peer: &PeerId, protocols: &[String]) -> Result<(), PeerStoreError> {
        if !self.peers.read().contains_key(peer) {
            return Ok(());
        }
        self.update_protocols(*peer, |record| {
            record.protocols.retain(|p| !protocols.contains(p));
        });
        Ok(())
    }

    fn add_addresses(
        &self,
        peer: PeerId,
        addresses: Vec<Multiaddr>,
    ) -> Result<(), PeerStoreError> {
        self.peers
            .write()
            .entry(peer)
            .or_insert_with(|| PeerRecord::new(peer))
            .extend_addresses(addresses);
        Ok(())
    }

    fn delete(&self, peer: &PeerId) -> Result<(), PeerStoreError> {
        let removed = self.peers.write().remove(peer);
        if let Some(record) = removed {
            trace!(target: "peer_store", %peer, "peer deleted");
            if !record.protocols.is_empty() {
                self.events
                    .protocols_changed(*peer, Vec::new(), record.protocols);
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PeerStoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    fn peer(n: u8) -> PeerId {
        let key = libp2p::identity::ed25519::SecretKey::try_from_bytes([n; 32]).unwrap();
        libp2p::identity::Keypair::from(libp2p::identity::ed25519::Keypair::from(key))
            .public()
            .to_peer_id()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_basic() {
        let store = MemoryPeerStore::new();
        assert!(store.is_empty());

        store.set_protocols(peer(1), strings(&["/a", "/b"])).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains(&peer(1)).unwrap());
        assert_eq!(store.protocols(&peer(1)).unwrap(), strings(&["/a", "/b"]));

        store.delete(&peer(1)).unwrap();
        assert!(store.is_empty());
        assert_matches!(
            store.protocols(&peer(1)),
            Err(PeerStoreError::UnknownPeer(p)) if p == peer(1)
        );
    }

    #[test]
    fn test_add_and_remove_protocols() {
        let store = MemoryPeerStore::new();

        store.add_protocols(peer(1), strings(&["/a"])).unwrap();
        store.add_protocols(peer(1), strings(&["/b", "/a"])).unwrap();
        assert_eq!(store.protocols(&peer(1)).unwrap(), strings(&["/a", "/b"]));

        store.remove_protocols(&peer(1), &strings(&["/a"])).unwrap();
        assert_eq!(store.protocols(&peer(1)).unwrap(), strings(&["/b"]));

        // Removing from an unknown peer does not create it.
        store.remove_protocols(&peer(2), &strings(&["/a"])).unwrap();
        assert!(!store.contains(&peer(2)).unwrap());
    }

    #[test]
    fn test_addresses() {
        let store = MemoryPeerStore::new();
        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();

        store.add_addresses(peer(1), vec![addr.clone(), addr.clone()]).unwrap();
        assert_eq!(store.addresses(&peer(1)).unwrap(), vec![addr]);
        assert!(store.protocols(&peer(1)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emits_once_per_effective_change() {
        let store = MemoryPeerStore::new();
        let mut rx = store.subscribe();

        store.set_protocols(peer(1), strings(&["/a"])).unwrap();
        store.set_protocols(peer(1), strings(&["/a"])).unwrap();
        store.add_protocols(peer(1), strings(&["/a"])).unwrap();
        store.remove_protocols(&peer(1), &strings(&["/x"])).unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            PeerStoreEvent::ProtocolsChanged {
                peer_id: peer(1),
                protocols: strings(&["/a"]),
                previous: Vec::new(),
            }
        );
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_delete_reports_empty_protocols() {
        let store = MemoryPeerStore::new();
        store.set_protocols(peer(1), strings(&["/a"])).unwrap();
        let mut rx = store.subscribe();

        store.delete(&peer(1)).unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            PeerStoreEvent::ProtocolsChanged {
                peer_id: peer(1),
                protocols: Vec::new(),
                previous: strings(&["/a"]),
            }
        );

        // Deleting again is silent.
        store.delete(&peer(1)).unwrap();
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_address_only_writes_are_silent() {
        let store = MemoryPeerStore::new();
        let mut rx = store.subscribe();

        store
            .add_addresses(peer(1), vec!["/ip4/10.0.0.1/tcp/1".parse().unwrap()])
            .unwrap();
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
    }
}
