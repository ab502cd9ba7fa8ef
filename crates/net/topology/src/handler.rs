use auto_impl::auto_impl;
use libp2p::PeerId;
use peerlink_net_primitives::ConnectionSummary;

/// Callbacks fired by a topology. Both default to no-ops.
///
/// Handlers run on the topology's event task and must not block.
#[auto_impl(Box, Arc)]
pub trait TopologyHandler: Send + Sync + 'static {
    /// A peer supporting a tracked protocol has a live connection.
    fn on_connect(&self, peer: &PeerId, connection: &ConnectionSummary) {
        let _ = (peer, connection);
    }

    /// A tracked peer stopped supporting every tracked protocol.
    fn on_disconnect(&self, peer: &PeerId) {
        let _ = peer;
    }
}

impl TopologyHandler for () {}
