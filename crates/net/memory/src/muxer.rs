//! In-process multiplexer with real multistream-select negotiation.

use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncWrite};
use parking_lot::Mutex;
use peerlink_net_connection::{BoxError, ConnectionCapabilities, MuxedStream, Negotiated};
use peerlink_net_multistream::{MultistreamConfig, NegotiationError, dialer_select, listener_select};
use peerlink_net_primitives::StreamId;
use thiserror::Error;
use tokio::io::DuplexStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const STREAM_BUFFER: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum MemoryMuxerError {
    #[error("muxer is closed")]
    Closed,
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
}

type LiveStreams = Arc<Mutex<HashSet<StreamId>>>;

/// A negotiated in-memory stream. Dropping it removes it from the live list.
#[derive(Debug)]
pub struct MemoryStream {
    id: StreamId,
    io: Compat<DuplexStream>,
    live: LiveStreams,
}

impl MuxedStream for MemoryStream {
    fn id(&self) -> StreamId {
        self.id.clone()
    }
}

impl AsyncRead for MemoryStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_close(cx)
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.live.lock().remove(&self.id);
    }
}

#[derive(Debug)]
struct MuxerState {
    /// Protocols the remote side answers to.
    remote_protocols: Vec<String>,
    config: MultistreamConfig,
    next_stream: AtomicU64,
    live: LiveStreams,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    shutdown: CancellationToken,
}

/// Connection capabilities over in-process pipes.
///
/// Each new stream is a `tokio::io::duplex` pair. The remote end runs
/// [`listener_select`] over the configured protocols and then echoes
/// everything it reads. Must be used inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct MemoryMuxer {
    state: Arc<MuxerState>,
}

impl MemoryMuxer {
    pub fn new<I, S>(remote_protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(remote_protocols, MultistreamConfig::default())
    }

    pub fn with_config<I, S>(remote_protocols: I, config: MultistreamConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Arc::new(MuxerState {
                remote_protocols: remote_protocols.into_iter().map(Into::into).collect(),
                config,
                next_stream: AtomicU64::new(0),
                live: LiveStreams::default(),
                closed: AtomicBool::new(false),
                close_calls: AtomicUsize::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    async fn open(&self, protocols: &[String]) -> Result<Negotiated<MemoryStream>, MemoryMuxerError> {
        if self.is_closed() {
            return Err(MemoryMuxerError::Closed);
        }

        let id = StreamId::from(self.state.next_stream.fetch_add(1, Ordering::SeqCst));
        let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
        tokio::spawn(serve_remote(
            id.clone(),
            remote,
            self.state.remote_protocols.clone(),
            self.state.config.clone(),
            self.state.shutdown.clone(),
        ));

        let (io, protocol) = dialer_select(local.compat(), protocols, &self.state.config).await?;
        self.state.live.lock().insert(id.clone());

        Ok(Negotiated {
            stream: MemoryStream {
                id,
                io,
                live: self.state.live.clone(),
            },
            protocol,
        })
    }
}

/// Remote end of a stream: negotiate, then echo until EOF or shutdown.
async fn serve_remote(
    id: StreamId,
    io: DuplexStream,
    protocols: Vec<String>,
    config: MultistreamConfig,
    shutdown: CancellationToken,
) {
    let serve = async {
        let (io, protocol) = listener_select(io.compat(), &protocols, &config).await?;
        trace!(target: "memory_muxer", stream = %id, %protocol, "remote accepted stream");

        let (mut reader, mut writer) = tokio::io::split(io.into_inner());
        tokio::io::copy(&mut reader, &mut writer).await?;
        Ok::<_, MemoryMuxerError>(())
    };

    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = serve => {
            if let Err(e) = result {
                debug!(target: "memory_muxer", stream = %id, error = %e, "remote stream ended");
            }
        }
    }
}

impl From<std::io::Error> for MemoryMuxerError {
    fn from(e: std::io::Error) -> Self {
        Self::Negotiation(NegotiationError::Io(e))
    }
}

#[async_trait]
impl ConnectionCapabilities for MemoryMuxer {
    type Stream = MemoryStream;

    async fn new_stream(&self, protocols: &[String]) -> Result<Negotiated<MemoryStream>, BoxError> {
        Ok(self.open(protocols).await?)
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.shutdown.cancel();
        self.state.live.lock().clear();
        Ok(())
    }

    fn streams(&self) -> Vec<StreamId> {
        self.state.live.lock().iter().cloned().collect()
    }
}
