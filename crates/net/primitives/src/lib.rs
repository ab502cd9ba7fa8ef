//! Primitives shared by the peerlink connection, topology and test crates.
//!
//! Nothing here performs I/O. The types describe a connection's lifecycle
//! ([`Status`], [`Timeline`], [`ConnectionStat`]), the identifiers used to key
//! connections and streams, and the protocol lists exchanged during
//! negotiation.

mod id;
mod protocol;
mod stat;
mod status;
mod summary;
mod time;

pub use id::{ConnectionId, StreamId};
pub use protocol::{Protocols, intersects};
pub use stat::{ConnectionStat, Timeline};
pub use status::{Direction, ParseDirectionError, Status};
pub use summary::ConnectionSummary;
pub use time::unix_timestamp_millis;

pub use libp2p::{Multiaddr, PeerId};
