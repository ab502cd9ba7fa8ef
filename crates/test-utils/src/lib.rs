//! Test fixtures for peerlink crates.
//!
//! - [`MockCapabilities`]: scriptable connection capabilities that count calls
//! - [`RecordingHandler`]: topology handler that records its callbacks
//! - [`compliance`]: black-box suites for connections and topologies
//!
//! The in-memory muxer and registrar from `peerlink-net-memory` are
//! re-exported for convenience.

pub mod compliance;
mod mock;
mod peers;
mod registrar;

pub use mock::{MockCapabilities, MockError, MockStream};
pub use peerlink_net_memory::{
    MemoryConnectionManager, MemoryMuxer, MemoryMuxerError, MemoryRegistrar, MemoryStream,
};
pub use peers::{test_addr, test_connection, test_peer_id};
pub use registrar::RecordingHandler;
