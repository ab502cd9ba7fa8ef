//! Per-connection stream registry.

use std::collections::HashMap;

use parking_lot::RwLock;
use peerlink_net_primitives::StreamId;

/// Free-form metadata attached to a stream at registration.
pub type StreamMetadata = HashMap<String, String>;

/// What a connection remembers about one of its streams.
///
/// Stream objects themselves belong to the caller and the multiplexer; the
/// registry only keeps the negotiated protocol and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMeta {
    pub protocol: String,
    pub metadata: StreamMetadata,
}

impl StreamMeta {
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            metadata: StreamMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: StreamMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// StreamId → StreamMeta map, private to its connection.
#[derive(Debug, Default)]
pub(crate) struct StreamRegistry {
    entries: RwLock<HashMap<StreamId, StreamMeta>>,
}

impl StreamRegistry {
    /// Insert or overwrite. Returns the previous entry, if any.
    pub(crate) fn insert(&self, id: StreamId, meta: StreamMeta) -> Option<StreamMeta> {
        self.entries.write().insert(id, meta)
    }

    pub(crate) fn remove(&self, id: &StreamId) -> Option<StreamMeta> {
        self.entries.write().remove(id)
    }

    pub(crate) fn get(&self, id: &StreamId) -> Option<StreamMeta> {
        self.entries.read().get(id).cloned()
    }

    pub(crate) fn contains(&self, id: &StreamId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<(StreamId, StreamMeta)> {
        self.entries
            .read()
            .iter()
            .map(|(id, meta)| (id.clone(), meta.clone()))
            .collect()
    }
}
