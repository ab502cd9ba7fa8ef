//! Connection lifecycle status and direction.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Lifecycle status of a connection (stored as u8 for atomic operations).
///
/// Transitions are monotonic: `Open -> Closing -> Closed`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Status {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl Status {
    /// Decode a status previously stored with `as u8`. Unknown values are
    /// treated as closed so a corrupted value can never reopen a connection.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Status::Open)
    }

    pub fn is_closing(&self) -> bool {
        matches!(self, Status::Closing)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Closed)
    }
}

/// Which side initiated the connection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[strum(parse_err_ty = ParseDirectionError, parse_err_fn = ParseDirectionError::new)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn is_inbound(&self) -> bool {
        matches!(self, Direction::Inbound)
    }

    pub fn is_outbound(&self) -> bool {
        matches!(self, Direction::Outbound)
    }
}

/// A direction string other than `inbound` or `outbound`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid connection direction {0:?}, expected \"inbound\" or \"outbound\"")]
pub struct ParseDirectionError(String);

impl ParseDirectionError {
    fn new(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_u8_roundtrip() {
        for status in [Status::Open, Status::Closing, Status::Closed] {
            assert_eq!(Status::from_u8(status as u8), status);
        }
        assert_eq!(Status::from_u8(42), Status::Closed);
    }

    #[test]
    fn test_status_ordering_is_lifecycle_order() {
        assert!(Status::Open < Status::Closing);
        assert!(Status::Closing < Status::Closed);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Open.to_string(), "open");
        assert_eq!(Status::Closing.to_string(), "closing");
        assert_eq!(Status::Closed.to_string(), "closed");
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("inbound".parse::<Direction>(), Ok(Direction::Inbound));
        assert_eq!("outbound".parse::<Direction>(), Ok(Direction::Outbound));
        assert!("Outbound".parse::<Direction>().is_err());
        assert!("sideways".parse::<Direction>().is_err());
        assert!("".parse::<Direction>().is_err());
    }
}
