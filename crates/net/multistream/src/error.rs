//! Error types for multistream-select.

/// Error while encoding or decoding a single frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid length prefix: {0}")]
    Varint(#[from] unsigned_varint::decode::Error),
    #[error("Message of {len} bytes exceeds maximum of {max}")]
    MessageTooLarge { len: usize, max: usize },
    #[error("Invalid message")]
    InvalidMessage,
}

/// Error during a negotiation.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("No protocol could be agreed on")]
    NegotiationFailed,
    #[error("No protocols to propose")]
    NoProtocols,
    /// A proposal that cannot be framed: it must start with `/` and fit on
    /// one line.
    #[error("Invalid protocol id: {0:?}")]
    InvalidProtocol(String),
}
