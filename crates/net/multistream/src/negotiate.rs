//! Dialer and listener sides of a negotiation.

use asynchronous_codec::{Decoder, Encoder};
use bytes::BytesMut;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::codec::{Message, MessageCodec};
use crate::config::MultistreamConfig;
use crate::error::{CodecError, NegotiationError};

/// Longest unsigned-varint encoding of a `usize` on 64-bit targets.
const MAX_VARINT_LEN: usize = 10;

/// Framed access to an I/O object that never buffers past the current frame.
struct Negotiator<R> {
    io: R,
    codec: MessageCodec,
}

impl<R> Negotiator<R>
where
    R: AsyncRead + AsyncWrite + Unpin,
{
    fn new(io: R, config: &MultistreamConfig) -> Self {
        Self {
            io,
            codec: MessageCodec::new(config.max_message_len),
        }
    }

    async fn send(&mut self, message: Message) -> Result<(), NegotiationError> {
        trace!(target: "multistream", %message, "send");
        let mut buf = BytesMut::new();
        self.codec.encode(message, &mut buf)?;
        self.io.write_all(&buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message, NegotiationError> {
        let mut buf = BytesMut::new();

        // Length prefix, one byte at a time.
        let (prefix_len, len) = loop {
            let mut byte = [0u8; 1];
            self.io.read_exact(&mut byte).await?;
            buf.extend_from_slice(&byte);

            if let Some(parsed) = self.codec.peek_len(&buf)? {
                break parsed;
            }
            if buf.len() >= MAX_VARINT_LEN {
                return Err(CodecError::InvalidMessage.into());
            }
        };

        buf.resize(prefix_len + len, 0);
        if let Some(body) = buf.get_mut(prefix_len..) {
            self.io.read_exact(body).await?;
        }

        let message = self
            .codec
            .decode(&mut buf)?
            .ok_or(CodecError::InvalidMessage)?;
        trace!(target: "multistream", %message, "recv");
        Ok(message)
    }

    async fn expect_header(&mut self) -> Result<(), NegotiationError> {
        match self.recv().await? {
            Message::Header => Ok(()),
            other => Err(NegotiationError::UnexpectedMessage(other.to_string())),
        }
    }

    fn into_inner(self) -> R {
        self.io
    }
}

fn is_valid_protocol(protocol: &str) -> bool {
    protocol.starts_with('/') && !protocol.contains('\n')
}

/// Negotiate one of `protocols` as the dialing side.
///
/// Protocols are proposed in order; the first one the listener echoes back
/// wins. Returns the I/O object and the agreed protocol.
pub async fn dialer_select<R, P>(
    io: R,
    protocols: &[P],
    config: &MultistreamConfig,
) -> Result<(R, String), NegotiationError>
where
    R: AsyncRead + AsyncWrite + Unpin,
    P: AsRef<str>,
{
    if protocols.is_empty() {
        return Err(NegotiationError::NoProtocols);
    }
    if let Some(invalid) = protocols
        .iter()
        .map(AsRef::as_ref)
        .find(|p| !is_valid_protocol(p))
    {
        return Err(NegotiationError::InvalidProtocol(invalid.to_string()));
    }

    let mut negotiator = Negotiator::new(io, config);
    negotiator.send(Message::Header).await?;
    negotiator.expect_header().await?;

    for protocol in protocols {
        let protocol = protocol.as_ref();
        negotiator
            .send(Message::Protocol(protocol.to_string()))
            .await?;

        match negotiator.recv().await? {
            Message::Protocol(accepted) if accepted == protocol => {
                debug!(target: "multistream", %protocol, "dialer negotiated protocol");
                return Ok((negotiator.into_inner(), accepted));
            }
            Message::NotAvailable => {
                trace!(target: "multistream", %protocol, "protocol not available");
            }
            other => return Err(NegotiationError::UnexpectedMessage(other.to_string())),
        }
    }

    debug!(target: "multistream", "dialer exhausted protocol list");
    Err(NegotiationError::NegotiationFailed)
}

/// Negotiate one of `supported` as the listening side.
///
/// Answers `ls` requests with the supported list and rejects unknown
/// proposals with `na` until the dialer proposes a supported protocol.
pub async fn listener_select<R, P>(
    io: R,
    supported: &[P],
    config: &MultistreamConfig,
) -> Result<(R, String), NegotiationError>
where
    R: AsyncRead + AsyncWrite + Unpin,
    P: AsRef<str>,
{
    let mut negotiator = Negotiator::new(io, config);
    negotiator.expect_header().await?;
    negotiator.send(Message::Header).await?;

    loop {
        match negotiator.recv().await? {
            Message::ListProtocols => {
                let protocols = supported.iter().map(|p| p.as_ref().to_string()).collect();
                negotiator.send(Message::Protocols(protocols)).await?;
            }
            Message::Protocol(protocol) => {
                if supported.iter().any(|p| p.as_ref() == protocol) {
                    negotiator
                        .send(Message::Protocol(protocol.clone()))
                        .await?;
                    debug!(target: "multistream", %protocol, "listener negotiated protocol");
                    return Ok((negotiator.into_inner(), protocol));
                }
                negotiator.send(Message::NotAvailable).await?;
            }
            other => return Err(NegotiationError::UnexpectedMessage(other.to_string())),
        }
    }
}

/// Ask the listener for its supported protocols.
///
/// The stream stays in the negotiation phase afterwards, so a
/// [`dialer_select`] may follow on the same I/O object only if the listener
/// accepts a second header; most callers drop the stream instead.
pub async fn list_protocols<R>(
    io: R,
    config: &MultistreamConfig,
) -> Result<(R, Vec<String>), NegotiationError>
where
    R: AsyncRead + AsyncWrite + Unpin,
{
    let mut negotiator = Negotiator::new(io, config);
    negotiator.send(Message::Header).await?;
    negotiator.expect_header().await?;
    negotiator.send(Message::ListProtocols).await?;

    match negotiator.recv().await? {
        Message::Protocols(protocols) => Ok((negotiator.into_inner(), protocols)),
        other => Err(NegotiationError::UnexpectedMessage(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

    use super::*;

    fn pipe() -> (Compat<tokio::io::DuplexStream>, Compat<tokio::io::DuplexStream>) {
        let (a, b) = tokio::io::duplex(4096);
        (a.compat(), b.compat())
    }

    #[tokio::test]
    async fn test_negotiates_first_supported_protocol() {
        let (dialer, listener) = pipe();
        let config = MultistreamConfig::default();

        let listen = tokio::spawn(async move {
            let config = MultistreamConfig::default();
            listener_select(listener, &["/echo/1.0.0", "/ping/1.0.0"], &config).await
        });

        let (_, protocol) = dialer_select(dialer, &["/echo/1.0.0"], &config)
            .await
            .unwrap();
        assert_eq!(protocol, "/echo/1.0.0");

        let (_, protocol) = listen.await.unwrap().unwrap();
        assert_eq!(protocol, "/echo/1.0.0");
    }

    #[tokio::test]
    async fn test_falls_through_unsupported_protocols() {
        let (dialer, listener) = pipe();
        let config = MultistreamConfig::default();

        let listen = tokio::spawn(async move {
            let config = MultistreamConfig::default();
            listener_select(listener, &["/ping/1.0.0"], &config).await
        });

        let (_, protocol) = dialer_select(
            dialer,
            &["/echo/2.0.0", "/echo/1.0.0", "/ping/1.0.0"],
            &config,
        )
        .await
        .unwrap();
        assert_eq!(protocol, "/ping/1.0.0");
        assert_eq!(listen.await.unwrap().unwrap().1, "/ping/1.0.0");
    }

    #[tokio::test]
    async fn test_fails_when_nothing_matches() {
        let (dialer, listener) = pipe();
        let config = MultistreamConfig::default();

        let listen = tokio::spawn(async move {
            let config = MultistreamConfig::default();
            listener_select(listener, &["/ping/1.0.0"], &config).await
        });

        let result = dialer_select(dialer, &["/echo/1.0.0"], &config).await;
        assert_matches!(result, Err(NegotiationError::NegotiationFailed));

        // Dialer dropped its end, so the listener sees EOF.
        assert!(listen.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_empty_proposal_list() {
        let (dialer, _listener) = pipe();
        let result = dialer_select::<_, &str>(dialer, &[], &MultistreamConfig::default()).await;
        assert_matches!(result, Err(NegotiationError::NoProtocols));
    }

    #[tokio::test]
    async fn test_rejects_malformed_proposals_before_writing() {
        let config = MultistreamConfig::default();

        for bad in ["echo/1.0.0", "/echo\n/1.0.0", ""] {
            let (dialer, listener) = pipe();
            let result = dialer_select(dialer, &["/ping/1.0.0", bad], &config).await;
            assert_matches!(result, Err(NegotiationError::InvalidProtocol(p)) if p == bad);

            // Nothing reached the wire: the listener sees EOF on the header.
            let result = listener_select(listener, &["/ping/1.0.0"], &config).await;
            assert!(result.is_err());
        }
    }

    #[tokio::test]
    async fn test_does_not_consume_application_data() {
        let (dialer, listener) = pipe();
        let config = MultistreamConfig::default();

        let listen = tokio::spawn(async move {
            let config = MultistreamConfig::default();
            let (mut io, _) = listener_select(listener, &["/echo/1.0.0"], &config)
                .await
                .unwrap();
            io.write_all(b"hello").await.unwrap();
            io.flush().await.unwrap();
            io
        });

        let (mut io, _) = dialer_select(dialer, &["/echo/1.0.0"], &config)
            .await
            .unwrap();
        let mut buf = [0u8; 5];
        io.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        drop(listen.await.unwrap());
    }

    #[tokio::test]
    async fn test_list_protocols() {
        let (dialer, listener) = pipe();
        let config = MultistreamConfig::default();

        tokio::spawn(async move {
            let config = MultistreamConfig::default();
            let _ = listener_select(listener, &["/echo/1.0.0", "/ping/1.0.0"], &config).await;
        });

        let (_, protocols) = list_protocols(dialer, &config).await.unwrap();
        assert_eq!(protocols, vec!["/echo/1.0.0", "/ping/1.0.0"]);
    }

    #[tokio::test]
    async fn test_rejects_peer_without_header() {
        let (dialer, mut listener) = pipe();
        let config = MultistreamConfig::default();

        tokio::spawn(async move {
            // Protocol proposal instead of the header.
            listener.write_all(b"\x0c/echo/1.0.0\n").await.unwrap();
            listener.flush().await.unwrap();
            let mut sink = Vec::new();
            let _ = listener.read_to_end(&mut sink).await;
        });

        let result = dialer_select(dialer, &["/echo/1.0.0"], &config).await;
        assert_matches!(result, Err(NegotiationError::UnexpectedMessage(m)) if m == "/echo/1.0.0");
    }
}
