use libp2p::{Multiaddr, PeerId};
use serde::{Deserialize, Serialize};

/// What the store knows about one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: PeerId,
    /// Supported protocols, in insertion order without duplicates.
    pub protocols: Vec<String>,
    pub addresses: Vec<Multiaddr>,
}

impl PeerRecord {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            protocols: Vec::new(),
            addresses: Vec::new(),
        }
    }

    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend_protocols(protocols.into_iter().map(Into::into));
        self
    }

    pub fn supports(&self, protocol: &str) -> bool {
        self.protocols.iter().any(|p| p == protocol)
    }

    /// Append unseen protocols. Returns whether anything was added.
    pub(crate) fn extend_protocols(&mut self, protocols: impl IntoIterator<Item = String>) -> bool {
        let before = self.protocols.len();
        for protocol in protocols {
            if !self.protocols.contains(&protocol) {
                self.protocols.push(protocol);
            }
        }
        self.protocols.len() != before
    }

    pub(crate) fn extend_addresses(&mut self, addresses: impl IntoIterator<Item = Multiaddr>) {
        for addr in addresses {
            if !self.addresses.contains(&addr) {
                self.addresses.push(addr);
            }
        }
    }
}
