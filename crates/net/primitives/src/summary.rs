use serde::{Deserialize, Serialize};

use crate::{ConnectionId, Direction, Multiaddr, PeerId, Status};

/// Cheap, cloneable description of a connection, handed to observers that
/// must not hold the connection itself (topology handlers, connection
/// manager events).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub id: ConnectionId,
    pub local_peer: PeerId,
    pub remote_peer: PeerId,
    pub remote_addr: Multiaddr,
    pub direction: Direction,
    pub status: Status,
}
