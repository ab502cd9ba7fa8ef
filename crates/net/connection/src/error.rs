//! Error types for connections.

use std::sync::Arc;

use crate::upgrade::UpgradeError;

/// Error returned by [`Connection`](crate::Connection) operations.
///
/// `Clone` so a single close outcome can be handed to every caller of
/// `close()`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    /// `new_stream` while a close is in progress.
    #[error("Connection is being closed")]
    ConnectionBeingClosed,
    /// `new_stream` after the connection closed.
    #[error("Connection is closed")]
    ConnectionClosed,
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Upgrade error: {0}")]
    Upgrade(#[from] UpgradeError),
    #[error("Failed to open stream: {0}")]
    NewStream(Arc<dyn std::error::Error + Send + Sync + 'static>),
    #[error("Failed to close connection: {0}")]
    Close(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl ConnectionError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameters(reason.into())
    }

    /// True for the two errors that mean the connection can no longer open
    /// streams.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            ConnectionError::ConnectionBeingClosed | ConnectionError::ConnectionClosed
        )
    }
}
