//! Connection metrics.

use ::metrics::{counter, gauge};
use peerlink_net_primitives::Direction;

pub(crate) fn record_opened(direction: Direction) {
    let direction: &'static str = direction.into();
    counter!("peerlink_connections_opened_total", "direction" => direction).increment(1);
    gauge!("peerlink_connections_open").increment(1.0);
}

pub(crate) fn record_closed(direction: Direction, failed: bool) {
    let direction: &'static str = direction.into();
    counter!("peerlink_connections_closed_total", "direction" => direction).increment(1);
    gauge!("peerlink_connections_open").decrement(1.0);
    if failed {
        counter!("peerlink_connection_close_failures_total").increment(1);
    }
}

/// A connection dropped without ever starting a close.
pub(crate) fn record_dropped(direction: Direction) {
    let direction: &'static str = direction.into();
    counter!("peerlink_connections_dropped_total", "direction" => direction).increment(1);
    gauge!("peerlink_connections_open").decrement(1.0);
}

pub(crate) fn record_stream_opened(protocol: &str) {
    counter!("peerlink_streams_opened_total", "protocol" => protocol.to_string()).increment(1);
}
