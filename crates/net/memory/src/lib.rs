//! In-process collaborators for connections and topologies.
//!
//! [`MemoryMuxer`] stands in for a secured, multiplexed transport: each stream
//! is a pipe to a remote that negotiates with multistream-select and echoes
//! whatever it receives. [`MemoryRegistrar`] pairs a
//! [`MemoryPeerStore`](peerlink_net_peer_store::MemoryPeerStore) with a
//! connection manager that announces added connections.

mod muxer;
mod registrar;

pub use muxer::{MemoryMuxer, MemoryMuxerError, MemoryStream};
pub use registrar::{MemoryConnectionManager, MemoryRegistrar};
