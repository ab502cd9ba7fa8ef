//! A topology handler that records callbacks.

use parking_lot::Mutex;
use peerlink_net_primitives::{ConnectionId, ConnectionSummary, PeerId};
use peerlink_net_topology::TopologyHandler;

/// Topology handler that records every callback in order.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    connects: Mutex<Vec<(PeerId, ConnectionId)>>,
    disconnects: Mutex<Vec<PeerId>>,
}

impl RecordingHandler {
    pub fn connects(&self) -> Vec<PeerId> {
        self.connects.lock().iter().map(|(peer, _)| *peer).collect()
    }

    pub fn connect_ids(&self) -> Vec<ConnectionId> {
        self.connects.lock().iter().map(|(_, id)| id.clone()).collect()
    }

    pub fn disconnects(&self) -> Vec<PeerId> {
        self.disconnects.lock().clone()
    }
}

impl TopologyHandler for RecordingHandler {
    fn on_connect(&self, peer: &PeerId, connection: &ConnectionSummary) {
        self.connects.lock().push((*peer, connection.id.clone()));
    }

    fn on_disconnect(&self, peer: &PeerId) {
        self.disconnects.lock().push(*peer);
    }
}
