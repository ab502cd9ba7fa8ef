use assert_matches::assert_matches;
use peerlink_net_connection::{
    Connection, ConnectionCapabilities, ConnectionError, MuxedStream, StreamMeta,
};
use peerlink_net_primitives::{Status, StreamId};

/// Produces fresh connections for [`connection_suite`].
pub trait ConnectionFactory {
    type Capabilities: ConnectionCapabilities;

    /// A new open connection whose raw close succeeds.
    fn connection(&self) -> Connection<Self::Capabilities>;

    /// A protocol the remote side accepts.
    fn protocol(&self) -> String;
}

/// Run every connection property against connections from `factory`.
pub async fn connection_suite<F: ConnectionFactory>(factory: &F) {
    has_properties(factory.connection());
    new_stream_registers_protocol(factory.connection(), factory.protocol()).await;
    add_and_remove_stream(factory.connection());
    close_is_idempotent(factory.connection()).await;
    concurrent_close(factory.connection()).await;
    new_stream_after_close(factory.connection(), factory.protocol()).await;
    empty_protocol_list(factory.connection()).await;
}

fn has_properties<C: ConnectionCapabilities>(connection: Connection<C>) {
    assert!(!connection.id().as_str().is_empty());
    assert_eq!(connection.status(), Status::Open);

    let stat = connection.stat();
    assert_eq!(stat.status, Status::Open);
    assert_eq!(stat.timeline.close, None);
    if let Some(upgraded) = stat.timeline.upgraded {
        assert!(upgraded >= stat.timeline.open);
    }
    assert_eq!(connection.registered_stream_count(), 0);
}

async fn new_stream_registers_protocol<C: ConnectionCapabilities>(
    connection: Connection<C>,
    protocol: String,
) {
    let negotiated = connection
        .new_stream(protocol.as_str())
        .await
        .unwrap_or_else(|e| panic!("new_stream failed: {e}"));
    let id = negotiated.stream.id();

    assert_eq!(negotiated.protocol, protocol);
    assert_eq!(connection.stream_protocol(&id), Some(protocol));
    assert!(connection.streams().contains(&id));

    drop(negotiated);
    close_ok(&connection).await;
}

fn add_and_remove_stream<C: ConnectionCapabilities>(connection: Connection<C>) {
    let id = StreamId::from("compliance-stream");

    connection.add_stream(id.clone(), StreamMeta::new("/compliance/1.0.0"));
    assert_eq!(
        connection.stream_protocol(&id).as_deref(),
        Some("/compliance/1.0.0")
    );

    connection.add_stream(id.clone(), StreamMeta::new("/compliance/2.0.0"));
    assert_eq!(
        connection.stream_protocol(&id).as_deref(),
        Some("/compliance/2.0.0")
    );

    connection.remove_stream(&id);
    assert!(!connection.has_stream(&id));
    connection.remove_stream(&id);
}

async fn close_is_idempotent<C: ConnectionCapabilities>(connection: Connection<C>) {
    close_ok(&connection).await;
    let timeline = connection.timeline();
    assert_eq!(connection.status(), Status::Closed);
    assert!(timeline.close.is_some_and(|close| close >= timeline.open));

    close_ok(&connection).await;
    assert_eq!(connection.timeline(), timeline);
    assert_eq!(connection.status(), Status::Closed);
}

async fn concurrent_close<C: ConnectionCapabilities>(connection: Connection<C>) {
    let (a, b) = tokio::join!(connection.close(), connection.close());
    assert!(a.is_ok() && b.is_ok(), "concurrent close failed: {a:?} {b:?}");
    assert_eq!(connection.status(), Status::Closed);
}

async fn new_stream_after_close<C: ConnectionCapabilities>(connection: Connection<C>, protocol: String) {
    close_ok(&connection).await;
    assert_matches!(
        connection.new_stream(protocol).await,
        Err(ConnectionError::ConnectionClosed)
    );
}

async fn empty_protocol_list<C: ConnectionCapabilities>(connection: Connection<C>) {
    assert_matches!(
        connection.new_stream(Vec::<String>::new()).await,
        Err(ConnectionError::InvalidParameters(_))
    );
}

async fn close_ok<C: ConnectionCapabilities>(connection: &Connection<C>) {
    if let Err(e) = connection.close().await {
        panic!("close failed: {e}");
    }
}
