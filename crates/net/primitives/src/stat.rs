//! Connection statistics snapshot.

use serde::{Deserialize, Serialize};

use crate::status::{Direction, Status};

/// Lifecycle timestamps of a connection, in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// When the raw connection was opened. Never changes.
    pub open: u64,
    /// When encryption and multiplexing were negotiated, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded: Option<u64>,
    /// When the connection finished closing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<u64>,
}

impl Timeline {
    pub fn new(open: u64) -> Self {
        Self {
            open,
            upgraded: None,
            close: None,
        }
    }

    pub fn with_upgraded(mut self, upgraded: u64) -> Self {
        self.upgraded = Some(upgraded);
        self
    }
}

/// Point-in-time view of a connection's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStat {
    pub direction: Direction,
    pub timeline: Timeline,
    /// Negotiated stream multiplexer, e.g. `/yamux/1.0.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplexer: Option<String>,
    /// Negotiated encryption protocol, e.g. `/noise`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    pub status: Status,
}
