//! Connection lifecycle over injected muxer capabilities.
//!
//! A [`Connection`] is built by an upgrader once a raw transport connection
//! has been secured and multiplexed. It does not own the transport: the
//! upgrader hands it a [`ConnectionCapabilities`] implementation that opens
//! negotiated streams, lists live streams and closes the raw connection.
//!
//! The connection tracks its own [`Status`](peerlink_net_primitives::Status)
//! (`open -> closing -> closed`), its timeline, free-form tags, and a
//! registry of protocol metadata for the streams opened through it.

mod capabilities;
mod connection;
mod error;
mod metrics;
mod registry;
mod upgrade;

pub use capabilities::{BoxError, ConnectionCapabilities, MuxedStream, Negotiated};
pub use connection::{Connection, ConnectionBuilder};
pub use error::ConnectionError;
pub use registry::{StreamMeta, StreamMetadata};
pub use upgrade::{UpgradeError, ensure_expected_peer};
