//! Protocol-aware peer tracking.
//!
//! A [`MulticodecTopology`] follows which known peers support at least one of
//! a set of protocol ids and tells its [`TopologyHandler`] when such peers
//! connect or stop supporting the protocols.

mod config;
mod error;
mod handler;
mod multicodec;
mod registrar;
mod subscription;

use std::collections::HashSet;

use libp2p::PeerId;

pub use config::TopologyConfig;
pub use error::TopologyError;
pub use handler::TopologyHandler;
pub use multicodec::MulticodecTopology;
pub use registrar::{ConnectionEvent, ConnectionManager, Registrar};
pub use subscription::TopologySubscription;

/// Read-only view over a peer tracker.
///
/// `min` and `max` are connection thresholds for whoever manages
/// connections; trackers report them but do not enforce them.
pub trait Topology: Send + Sync {
    fn min(&self) -> usize;

    fn max(&self) -> usize;

    /// Snapshot of the tracked peers.
    fn peers(&self) -> HashSet<PeerId>;

    fn is_tracked(&self, peer: &PeerId) -> bool {
        self.peers().contains(peer)
    }
}
