use libp2p::identity::{Keypair, ed25519};
use peerlink_net_connection::{Connection, ConnectionBuilder, ConnectionCapabilities};
use peerlink_net_primitives::{Direction, Multiaddr, PeerId};

/// Deterministic peer id derived from a 32-byte seed of `n`.
#[allow(clippy::expect_used)]
pub fn test_peer_id(n: u8) -> PeerId {
    let secret = ed25519::SecretKey::try_from_bytes([n; 32]).expect("any 32 bytes form a key");
    Keypair::from(ed25519::Keypair::from(secret))
        .public()
        .to_peer_id()
}

/// Loopback TCP address with port `4000 + n`.
#[allow(clippy::expect_used)]
pub fn test_addr(n: u16) -> Multiaddr {
    format!("/ip4/127.0.0.1/tcp/{}", 4000 + n)
        .parse()
        .expect("valid multiaddr")
}

/// Builder pre-filled with peer 1 dialing peer 2 at [`test_addr`]`(2)`.
pub fn test_connection<C: ConnectionCapabilities>(capabilities: C) -> ConnectionBuilder<C> {
    Connection::builder()
        .local_peer(test_peer_id(1))
        .remote_peer(test_peer_id(2))
        .local_addr(test_addr(1))
        .remote_addr(test_addr(2))
        .direction(Direction::Outbound)
        .multiplexer("/mplex/6.7.0")
        .encryption("/noise")
        .capabilities(capabilities)
}
