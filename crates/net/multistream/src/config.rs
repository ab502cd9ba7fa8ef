use serde::{Deserialize, Serialize};

/// Default maximum frame length, newline included.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1024;

/// Multistream-select limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultistreamConfig {
    /// Largest frame accepted or produced, including the trailing newline.
    pub max_message_len: usize,
}

impl Default for MultistreamConfig {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}
