//! Checks performed while upgrading a raw connection.

use peerlink_net_primitives::PeerId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpgradeError {
    /// The secured channel authenticated a different peer than the one dialed.
    #[error("Unexpected peer: expected {expected}, got {actual}")]
    UnexpectedPeer { expected: PeerId, actual: PeerId },
}

/// Verify the identified remote against the peer the caller meant to reach.
///
/// Inbound upgrades have no expectation and always pass.
pub fn ensure_expected_peer(expected: Option<&PeerId>, actual: &PeerId) -> Result<(), UpgradeError> {
    match expected {
        Some(expected) if expected != actual => Err(UpgradeError::UnexpectedPeer {
            expected: *expected,
            actual: *actual,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_peer_id(n: u8) -> PeerId {
        let bytes = [n; 32];
        let key = libp2p::identity::ed25519::SecretKey::try_from_bytes(bytes).unwrap();
        let keypair =
            libp2p::identity::Keypair::from(libp2p::identity::ed25519::Keypair::from(key));
        keypair.public().to_peer_id()
    }

    #[test]
    fn test_expected_peer_matches() {
        let peer = test_peer_id(1);
        assert_eq!(ensure_expected_peer(Some(&peer), &peer), Ok(()));
        assert_eq!(ensure_expected_peer(None, &peer), Ok(()));
    }

    #[test]
    fn test_unexpected_peer() {
        let expected = test_peer_id(1);
        let actual = test_peer_id(2);
        assert_eq!(
            ensure_expected_peer(Some(&expected), &actual),
            Err(UpgradeError::UnexpectedPeer { expected, actual })
        );
    }
}
