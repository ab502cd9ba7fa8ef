//! Multistream-select protocol negotiation.
//!
//! Every message on the wire is an unsigned-varint length prefix followed by
//! the payload and a trailing `\n`; the length counts the newline. A
//! negotiation starts with both sides exchanging the `/multistream/1.0.0`
//! header, after which the dialer proposes protocol ids one at a time and the
//! listener either echoes the proposal (accept) or answers `na`.
//!
//! The negotiation functions read exactly the bytes that belong to the
//! negotiation, so the returned I/O object is positioned at the first byte of
//! the application protocol.

mod codec;
mod config;
mod error;
mod negotiate;

pub use codec::{HEADER, Message, MessageCodec};
pub use config::{DEFAULT_MAX_MESSAGE_LEN, MultistreamConfig};
pub use error::{CodecError, NegotiationError};
pub use negotiate::{dialer_select, list_protocols, listener_select};
