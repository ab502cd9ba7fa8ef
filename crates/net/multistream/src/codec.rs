//! Frame codec for multistream-select messages.

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use crate::config::DEFAULT_MAX_MESSAGE_LEN;
use crate::error::CodecError;

/// Protocol id of multistream-select itself, exchanged as the first message.
pub const HEADER: &str = "/multistream/1.0.0";

const NOT_AVAILABLE: &[u8] = b"na\n";
const LIST_PROTOCOLS: &[u8] = b"ls\n";

/// A multistream-select message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The `/multistream/1.0.0` header.
    Header,
    /// A protocol proposal, or its acceptance when echoed back.
    Protocol(String),
    /// Request for the listener's supported protocols (`ls`).
    ListProtocols,
    /// Answer to [`Message::ListProtocols`].
    Protocols(Vec<String>),
    /// Proposal rejected (`na`).
    NotAvailable,
}

impl Message {
    /// Serialise the frame content, trailing newline included.
    fn encode(&self, dst: &mut BytesMut) {
        match self {
            Message::Header => {
                dst.put_slice(HEADER.as_bytes());
                dst.put_u8(b'\n');
            }
            Message::Protocol(protocol) => {
                dst.put_slice(protocol.as_bytes());
                dst.put_u8(b'\n');
            }
            Message::ListProtocols => dst.put_slice(LIST_PROTOCOLS),
            Message::NotAvailable => dst.put_slice(NOT_AVAILABLE),
            Message::Protocols(protocols) => {
                let mut buf = unsigned_varint::encode::usize_buffer();
                for protocol in protocols {
                    dst.put_slice(unsigned_varint::encode::usize(protocol.len() + 1, &mut buf));
                    dst.put_slice(protocol.as_bytes());
                    dst.put_u8(b'\n');
                }
                dst.put_u8(b'\n');
            }
        }
    }

    /// Parse frame content, trailing newline included.
    fn decode(msg: &[u8]) -> Result<Self, CodecError> {
        if msg.len() == HEADER.len() + 1
            && msg.starts_with(HEADER.as_bytes())
            && msg.last() == Some(&b'\n')
        {
            return Ok(Message::Header);
        }
        if msg == NOT_AVAILABLE {
            return Ok(Message::NotAvailable);
        }
        if msg == LIST_PROTOCOLS {
            return Ok(Message::ListProtocols);
        }

        if let Some(body) = single_line(msg) {
            if body.first() == Some(&b'/') {
                let protocol = std::str::from_utf8(body).map_err(|_| CodecError::InvalidMessage)?;
                return Ok(Message::Protocol(protocol.to_string()));
            }
        }

        decode_protocol_list(msg).map(Message::Protocols)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Header => f.write_str(HEADER),
            Message::Protocol(protocol) => f.write_str(protocol),
            Message::ListProtocols => f.write_str("ls"),
            Message::Protocols(protocols) => write!(f, "[{}]", protocols.join(", ")),
            Message::NotAvailable => f.write_str("na"),
        }
    }
}

/// Returns the body of `msg` if it is a single newline-terminated line.
fn single_line(msg: &[u8]) -> Option<&[u8]> {
    let (last, body) = msg.split_last()?;
    (*last == b'\n' && !body.contains(&b'\n')).then_some(body)
}

fn decode_protocol_list(msg: &[u8]) -> Result<Vec<String>, CodecError> {
    let mut protocols = Vec::new();
    let mut remaining = msg;

    loop {
        if remaining == b"\n" {
            return Ok(protocols);
        }

        let (len, rest) = unsigned_varint::decode::usize(remaining)?;
        if len == 0 || rest.len() < len {
            return Err(CodecError::InvalidMessage);
        }
        let (entry, rest) = rest.split_at(len);
        let body = single_line(entry).ok_or(CodecError::InvalidMessage)?;
        if body.first() != Some(&b'/') {
            return Err(CodecError::InvalidMessage);
        }
        let protocol = std::str::from_utf8(body).map_err(|_| CodecError::InvalidMessage)?;
        protocols.push(protocol.to_string());
        remaining = rest;
    }
}

/// Length-prefixed framing of [`Message`]s.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_message_len: usize,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_LEN)
    }
}

impl MessageCodec {
    pub fn new(max_message_len: usize) -> Self {
        Self { max_message_len }
    }

    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    /// Parse the length prefix at the start of `src`.
    ///
    /// Returns `Ok(None)` while the prefix is incomplete, otherwise the prefix
    /// size in bytes and the announced frame length.
    pub(crate) fn peek_len(&self, src: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
        match unsigned_varint::decode::usize(src) {
            Ok((len, rest)) => {
                if len > self.max_message_len {
                    return Err(CodecError::MessageTooLarge {
                        len,
                        max: self.max_message_len,
                    });
                }
                Ok(Some((src.len() - rest.len(), len)))
            }
            Err(unsigned_varint::decode::Error::Insufficient) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl asynchronous_codec::Encoder for MessageCodec {
    type Item<'a> = Message;
    type Error = CodecError;

    fn encode(&mut self, item: Self::Item<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut content = BytesMut::new();
        item.encode(&mut content);

        if content.len() > self.max_message_len {
            return Err(CodecError::MessageTooLarge {
                len: content.len(),
                max: self.max_message_len,
            });
        }

        let mut buf = unsigned_varint::encode::usize_buffer();
        let prefix = unsigned_varint::encode::usize(content.len(), &mut buf);
        dst.reserve(prefix.len() + content.len());
        dst.put_slice(prefix);
        dst.put_slice(&content);
        Ok(())
    }
}

impl asynchronous_codec::Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((prefix_len, len)) = self.peek_len(src)? else {
            return Ok(None);
        };

        if src.len() < prefix_len + len {
            src.reserve(prefix_len + len - src.len());
            return Ok(None);
        }

        src.advance(prefix_len);
        let frame = src.split_to(len);
        Message::decode(&frame).map(Some)
    }
}
