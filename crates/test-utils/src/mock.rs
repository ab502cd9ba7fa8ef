//! Scriptable connection capabilities.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use peerlink_net_connection::{BoxError, ConnectionCapabilities, MuxedStream, Negotiated};
use peerlink_net_primitives::StreamId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MockError {
    #[error("mock close failure")]
    Close,
    #[error("mock stream failure")]
    NewStream,
}

/// Stream handed out by [`MockCapabilities`]. Dropping it does not end the
/// stream; use [`MockCapabilities::end_stream`].
#[derive(Debug)]
pub struct MockStream {
    id: StreamId,
}

impl MuxedStream for MockStream {
    fn id(&self) -> StreamId {
        self.id.clone()
    }
}

#[derive(Debug, Default)]
struct MockState {
    next_stream: AtomicU64,
    live: Mutex<Vec<StreamId>>,
    new_stream_calls: AtomicUsize,
    close_calls: AtomicUsize,
    fail_new_stream: AtomicBool,
    fail_close: AtomicBool,
    close_delay: Mutex<Option<Duration>>,
    /// Protocols the remote accepts. Empty accepts anything.
    supported: Mutex<HashSet<String>>,
}

/// Capabilities that record every call and fail on request.
///
/// Clones share state, so tests keep one handle and move another into the
/// connection.
#[derive(Debug, Clone, Default)]
pub struct MockCapabilities {
    state: Arc<MockState>,
}

impl MockCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept these protocols; others fail negotiation.
    pub fn with_supported<I, S>(self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.state.supported.lock() = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Make the raw close take `delay` before completing.
    pub fn with_close_delay(self, delay: Duration) -> Self {
        *self.state.close_delay.lock() = Some(delay);
        self
    }

    pub fn fail_close(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn fail_new_stream(&self, fail: bool) {
        self.state.fail_new_stream.store(fail, Ordering::SeqCst);
    }

    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    pub fn new_stream_calls(&self) -> usize {
        self.state.new_stream_calls.load(Ordering::SeqCst)
    }

    /// Remove a stream from the live list, as if the remote reset it.
    pub fn end_stream(&self, id: &StreamId) {
        self.state.live.lock().retain(|s| s != id);
    }
}

#[async_trait]
impl ConnectionCapabilities for MockCapabilities {
    type Stream = MockStream;

    async fn new_stream(&self, protocols: &[String]) -> Result<Negotiated<MockStream>, BoxError> {
        self.state.new_stream_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_new_stream.load(Ordering::SeqCst) {
            return Err(Box::new(MockError::NewStream));
        }

        let protocol = {
            let supported = self.state.supported.lock();
            protocols
                .iter()
                .find(|p| supported.is_empty() || supported.contains(*p))
                .cloned()
        }
        .ok_or(MockError::NewStream)?;

        let id = StreamId::from(self.state.next_stream.fetch_add(1, Ordering::SeqCst));
        self.state.live.lock().push(id.clone());
        Ok(Negotiated {
            stream: MockStream { id },
            protocol,
        })
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.close_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.live.lock().clear();

        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(Box::new(MockError::Close));
        }
        Ok(())
    }

    fn streams(&self) -> Vec<StreamId> {
        self.state.live.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_negotiates_first_supported() {
        let caps = MockCapabilities::new().with_supported(["/b"]);
        let negotiated = caps
            .new_stream(&["/a".to_string(), "/b".to_string()])
            .await
            .unwrap();
        assert_eq!(negotiated.protocol, "/b");

        assert!(caps.new_stream(&["/a".to_string()]).await.is_err());
        assert_eq!(caps.new_stream_calls(), 2);
        assert_eq!(caps.streams().len(), 1);
    }

    #[tokio::test]
    async fn test_end_stream() {
        let caps = MockCapabilities::new();
        let negotiated = caps.new_stream(&["/a".to_string()]).await.unwrap();
        caps.end_stream(&negotiated.stream.id());
        assert!(caps.streams().is_empty());
    }
}
