//! Capabilities injected by the upgrader.

use async_trait::async_trait;
use peerlink_net_primitives::StreamId;

/// Boxed error returned by capability implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A stream opened on a multiplexed connection.
pub trait MuxedStream: Send + std::fmt::Debug + 'static {
    /// Identifier assigned by the multiplexer, unique within the connection.
    fn id(&self) -> StreamId;
}

/// A negotiated stream together with the protocol both sides agreed on.
#[derive(Debug)]
pub struct Negotiated<S> {
    pub stream: S,
    pub protocol: String,
}

/// Operations a [`Connection`](crate::Connection) delegates to the
/// underlying secured, multiplexed transport connection.
#[async_trait]
pub trait ConnectionCapabilities: Send + Sync + 'static {
    type Stream: MuxedStream;

    /// Open a substream and negotiate one of `protocols` on it, in order of
    /// preference.
    async fn new_stream(&self, protocols: &[String]) -> Result<Negotiated<Self::Stream>, BoxError>;

    /// Tear down the raw connection.
    async fn close(&self) -> Result<(), BoxError>;

    /// Ids of the streams the multiplexer currently considers live.
    fn streams(&self) -> Vec<StreamId>;
}
