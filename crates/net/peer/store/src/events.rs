//! Peer store events and non-blocking broadcast emitter.

use libp2p::PeerId;
use tokio::sync::broadcast;

/// Peer store events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerStoreEvent {
    /// A peer's protocol list changed. Carries both the new and the previous
    /// list.
    ProtocolsChanged {
        peer_id: PeerId,
        protocols: Vec<String>,
        previous: Vec<String>,
    },
}

impl PeerStoreEvent {
    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::ProtocolsChanged { peer_id, .. } => peer_id,
        }
    }
}

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Non-blocking broadcast emitter. Slow subscribers drop events independently.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<PeerStoreEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: PeerStoreEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PeerStoreEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn protocols_changed(&self, peer_id: PeerId, protocols: Vec<String>, previous: Vec<String>) {
        self.emit(PeerStoreEvent::ProtocolsChanged {
            peer_id,
            protocols,
            previous,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(n: u8) -> PeerId {
        let key = libp2p::identity::ed25519::SecretKey::try_from_bytes([n; 32]).unwrap();
        libp2p::identity::Keypair::from(libp2p::identity::ed25519::Keypair::from(key))
            .public()
            .to_peer_id()
    }

    #[tokio::test]
    async fn test_event_emitter_multiple_subscribers() {
        let emitter = EventEmitter::default();
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();
        let peer = peer(1);

        emitter.protocols_changed(peer, vec!["/a".to_string()], Vec::new());

        for rx in [&mut rx1, &mut rx2] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.peer_id(), &peer);
        }
    }

    #[test]
    fn test_event_emitter_no_subscribers() {
        let emitter = EventEmitter::default();
        emitter.protocols_changed(peer(2), Vec::new(), Vec::new());
        assert_eq!(emitter.subscriber_count(), 0);
    }
}
