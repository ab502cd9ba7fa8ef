//! The connection state machine.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::RwLock;
use peerlink_net_primitives::{
    ConnectionId, ConnectionStat, ConnectionSummary, Direction, Multiaddr, ParseDirectionError,
    PeerId, Protocols, Status, StreamId, Timeline, unix_timestamp_millis,
};
use tracing::{debug, trace, warn};

use crate::capabilities::{ConnectionCapabilities, MuxedStream, Negotiated};
use crate::error::ConnectionError;
use crate::metrics;
use crate::registry::{StreamMeta, StreamMetadata, StreamRegistry};
use crate::upgrade::ensure_expected_peer;

/// Outcome of the one close attempt, shared by every `close()` caller.
type CloseOutcome = Shared<BoxFuture<'static, Result<(), ConnectionError>>>;

/// A secured, multiplexed connection to a remote peer.
///
/// Status moves only forward: `open -> closing -> closed`. All methods take
/// `&self`, so a connection is usually shared behind an `Arc`.
pub struct Connection<C: ConnectionCapabilities> {
    id: ConnectionId,
    local_addr: Option<Multiaddr>,
    remote_addr: Multiaddr,
    local_peer: PeerId,
    remote_peer: PeerId,
    direction: Direction,
    multiplexer: Option<String>,
    encryption: Option<String>,

    lifecycle: Arc<Lifecycle>,
    tags: RwLock<Vec<String>>,
    registry: StreamRegistry,

    capabilities: Arc<C>,
    closing: OnceLock<CloseOutcome>,
}

/// Status and timeline, shared with the close task.
#[derive(Debug)]
struct Lifecycle {
    status: AtomicU8,
    timeline: RwLock<Timeline>,
}

impl Lifecycle {
    fn new(timeline: Timeline) -> Self {
        Self {
            status: AtomicU8::new(Status::Open as u8),
            timeline: RwLock::new(timeline),
        }
    }

    fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    fn advance(&self, status: Status) {
        self.status.fetch_max(status as u8, Ordering::AcqRel);
    }

    fn finish_close(&self) {
        {
            let mut timeline = self.timeline.write();
            timeline.close = Some(unix_timestamp_millis().max(timeline.open));
        }
        self.advance(Status::Closed);
    }
}

impl<C: ConnectionCapabilities> Connection<C> {
    pub fn builder() -> ConnectionBuilder<C> {
        ConnectionBuilder::default()
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn local_addr(&self) -> Option<&Multiaddr> {
        self.local_addr.as_ref()
    }

    pub fn remote_addr(&self) -> &Multiaddr {
        &self.remote_addr
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn remote_peer(&self) -> &PeerId {
        &self.remote_peer
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn status(&self) -> Status {
        self.lifecycle.status()
    }

    pub fn timeline(&self) -> Timeline {
        *self.lifecycle.timeline.read()
    }

    pub fn stat(&self) -> ConnectionStat {
        ConnectionStat {
            direction: self.direction,
            timeline: self.timeline(),
            multiplexer: self.multiplexer.clone(),
            encryption: self.encryption.clone(),
            status: self.status(),
        }
    }

    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            id: self.id.clone(),
            local_peer: self.local_peer,
            remote_peer: self.remote_peer,
            remote_addr: self.remote_addr.clone(),
            direction: self.direction,
            status: self.status(),
        }
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.read().clone()
    }

    /// Add a tag unless already present.
    pub fn add_tag(&self, tag: impl Into<String>) {
        let tag = tag.into();
        let mut tags = self.tags.write();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    /// Remove a tag. Returns whether it was present.
    pub fn remove_tag(&self, tag: &str) -> bool {
        let mut tags = self.tags.write();
        let before = tags.len();
        tags.retain(|t| t != tag);
        tags.len() != before
    }

    /// Live streams, as reported by the multiplexer.
    pub fn streams(&self) -> Vec<StreamId> {
        self.capabilities.streams()
    }

    /// Registered protocol and metadata of a stream.
    pub fn stream_meta(&self, id: &StreamId) -> Option<StreamMeta> {
        self.registry.get(id)
    }

    pub fn stream_protocol(&self, id: &StreamId) -> Option<String> {
        self.registry.get(id).map(|meta| meta.protocol)
    }

    pub fn has_stream(&self, id: &StreamId) -> bool {
        self.registry.contains(id)
    }

    /// Copy of every registry entry.
    pub fn registered_streams(&self) -> Vec<(StreamId, StreamMeta)> {
        self.registry.snapshot()
    }

    pub fn registered_stream_count(&self) -> usize {
        self.registry.len()
    }

    /// Open a stream and negotiate one of `protocols` on it.
    ///
    /// Accepts a single protocol id or a list in order of preference. Fails
    /// without touching the multiplexer once a close has started.
    pub async fn new_stream(
        &self,
        protocols: impl Into<Protocols>,
    ) -> Result<Negotiated<C::Stream>, ConnectionError> {
        self.new_stream_with_metadata(protocols, StreamMetadata::new())
            .await
    }

    /// Like [`Connection::new_stream`], registering `metadata` with the stream.
    pub async fn new_stream_with_metadata(
        &self,
        protocols: impl Into<Protocols>,
        metadata: StreamMetadata,
    ) -> Result<Negotiated<C::Stream>, ConnectionError> {
        match self.status() {
            Status::Open => {}
            Status::Closing => return Err(ConnectionError::ConnectionBeingClosed),
            Status::Closed => return Err(ConnectionError::ConnectionClosed),
        }

        let protocols = protocols.into();
        if protocols.is_empty() {
            return Err(ConnectionError::invalid("at least one protocol is required"));
        }

        trace!(target: "connection", id = %self.id, ?protocols, "opening stream");
        let negotiated = self
            .capabilities
            .new_stream(&protocols)
            .await
            .map_err(|e| ConnectionError::NewStream(Arc::from(e)))?;

        let stream_id = negotiated.stream.id();
        debug!(
            target: "connection",
            id = %self.id,
            stream = %stream_id,
            protocol = %negotiated.protocol,
            "stream negotiated"
        );
        self.add_stream(
            stream_id,
            StreamMeta::new(negotiated.protocol.clone()).with_metadata(metadata),
        );
        metrics::record_stream_opened(&negotiated.protocol);

        Ok(negotiated)
    }

    /// Register a stream's protocol and metadata, overwriting any previous
    /// entry. Allowed in any status.
    pub fn add_stream(&self, id: StreamId, meta: StreamMeta) {
        trace!(target: "connection", id = %self.id, stream = %id, protocol = %meta.protocol, "stream registered");
        self.registry.insert(id, meta);
    }

    /// Forget a stream. No-op if it was never registered.
    pub fn remove_stream(&self, id: &StreamId) {
        if self.registry.remove(id).is_some() {
            trace!(target: "connection", id = %self.id, stream = %id, "stream removed");
        }
    }

    /// Close the connection.
    ///
    /// The raw close capability runs at most once, on its own task, so it
    /// completes even if every caller is cancelled. Concurrent callers wait
    /// for that attempt and later callers get its outcome immediately. The
    /// connection ends up `closed` even when the raw close fails; the failure
    /// is still returned.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn close(&self) -> Result<(), ConnectionError> {
        self.closing.get_or_init(|| self.start_close()).clone().await
    }

    fn start_close(&self) -> CloseOutcome {
        self.lifecycle.advance(Status::Closing);
        debug!(target: "connection", id = %self.id, remote = %self.remote_peer, "closing connection");

        let task = tokio::spawn(close_raw(
            self.id.clone(),
            self.direction,
            self.lifecycle.clone(),
            self.capabilities.clone(),
        ));

        let lifecycle = self.lifecycle.clone();
        async move {
            task.await.unwrap_or_else(|e| {
                // The task died before recording the close.
                lifecycle.finish_close();
                Err(ConnectionError::Close(Arc::new(e)))
            })
        }
        .boxed()
        .shared()
    }
}

async fn close_raw<C: ConnectionCapabilities>(
    id: ConnectionId,
    direction: Direction,
    lifecycle: Arc<Lifecycle>,
    capabilities: Arc<C>,
) -> Result<(), ConnectionError> {
    let result = capabilities.close().await;

    lifecycle.finish_close();
    metrics::record_closed(direction, result.is_err());

    match result {
        Ok(()) => {
            debug!(target: "connection", %id, "connection closed");
            Ok(())
        }
        Err(e) => {
            warn!(target: "connection", %id, error = %e, "raw connection close failed");
            Err(ConnectionError::Close(Arc::from(e)))
        }
    }
}

impl<C: ConnectionCapabilities> Drop for Connection<C> {
    fn drop(&mut self) {
        if self.closing.get().is_none() {
            trace!(target: "connection", id = %self.id, "connection dropped without close");
            metrics::record_dropped(self.direction);
        }
    }
}

impl<C: ConnectionCapabilities> fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("remote_peer", &self.remote_peer)
            .field("remote_addr", &self.remote_addr)
            .field("direction", &self.direction)
            .field("status", &self.status())
            .field("streams", &self.registry.len())
            .finish()
    }
}

/// Builder for [`Connection`]. Missing or inconsistent arguments are reported
/// by [`ConnectionBuilder::build`] as
/// [`ConnectionError::InvalidParameters`].
pub struct ConnectionBuilder<C> {
    local_peer: Option<PeerId>,
    remote_peer: Option<PeerId>,
    expected_remote_peer: Option<PeerId>,
    local_addr: Option<Multiaddr>,
    remote_addr: Option<Multiaddr>,
    direction: Option<Result<Direction, ParseDirectionError>>,
    timeline: Option<Timeline>,
    multiplexer: Option<String>,
    encryption: Option<String>,
    tags: Vec<String>,
    capabilities: Option<C>,
}

impl<C> Default for ConnectionBuilder<C> {
    fn default() -> Self {
        Self {
            local_peer: None,
            remote_peer: None,
            expected_remote_peer: None,
            local_addr: None,
            remote_addr: None,
            direction: None,
            timeline: None,
            multiplexer: None,
            encryption: None,
            tags: Vec::new(),
            capabilities: None,
        }
    }
}

impl<C: ConnectionCapabilities> ConnectionBuilder<C> {
    pub fn local_peer(mut self, peer: PeerId) -> Self {
        self.local_peer = Some(peer);
        self
    }

    pub fn remote_peer(mut self, peer: PeerId) -> Self {
        self.remote_peer = Some(peer);
        self
    }

    /// Peer the caller dialed. `build` fails with
    /// [`UpgradeError::UnexpectedPeer`](crate::UpgradeError::UnexpectedPeer)
    /// if the authenticated remote differs.
    pub fn expected_remote_peer(mut self, peer: PeerId) -> Self {
        self.expected_remote_peer = Some(peer);
        self
    }

    /// Local address. May stay unknown for inbound connections.
    pub fn local_addr(mut self, addr: Multiaddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    pub fn remote_addr(mut self, addr: Multiaddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(Ok(direction));
        self
    }

    /// Direction given as `"inbound"` or `"outbound"`.
    pub fn direction_str(mut self, direction: &str) -> Self {
        self.direction = Some(direction.parse());
        self
    }

    /// Timeline of the raw connection. Defaults to opening now. Any `close`
    /// timestamp is discarded since a new connection is always open.
    pub fn timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn multiplexer(mut self, multiplexer: impl Into<String>) -> Self {
        self.multiplexer = Some(multiplexer.into());
        self
    }

    pub fn encryption(mut self, encryption: impl Into<String>) -> Self {
        self.encryption = Some(encryption.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn capabilities(mut self, capabilities: C) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn build(self) -> Result<Connection<C>, ConnectionError> {
        let local_peer = self
            .local_peer
            .ok_or_else(|| ConnectionError::invalid("local peer is required"))?;
        let remote_peer = self
            .remote_peer
            .ok_or_else(|| ConnectionError::invalid("remote peer is required"))?;
        let remote_addr = self
            .remote_addr
            .ok_or_else(|| ConnectionError::invalid("remote address is required"))?;
        let direction = self
            .direction
            .ok_or_else(|| ConnectionError::invalid("direction is required"))?
            .map_err(|e| ConnectionError::invalid(e.to_string()))?;
        let capabilities = self
            .capabilities
            .ok_or_else(|| ConnectionError::invalid("connection capabilities are required"))?;

        ensure_expected_peer(self.expected_remote_peer.as_ref(), &remote_peer)?;

        let mut timeline = self
            .timeline
            .unwrap_or_else(|| Timeline::new(unix_timestamp_millis()));
        if timeline.upgraded.is_some_and(|upgraded| upgraded < timeline.open) {
            return Err(ConnectionError::invalid(
                "upgraded timestamp precedes open timestamp",
            ));
        }
        timeline.close = None;

        let connection = Connection {
            id: ConnectionId::random(),
            local_addr: self.local_addr,
            remote_addr,
            local_peer,
            remote_peer,
            direction,
            multiplexer: self.multiplexer,
            encryption: self.encryption,
            lifecycle: Arc::new(Lifecycle::new(timeline)),
            tags: RwLock::new(self.tags),
            registry: StreamRegistry::default(),
            capabilities: Arc::new(capabilities),
            closing: OnceLock::new(),
        };

        debug!(
            target: "connection",
            id = %connection.id,
            remote = %connection.remote_peer,
            addr = %connection.remote_addr,
            %direction,
            "connection opened"
        );
        metrics::record_opened(direction);

        Ok(connection)
    }
}
