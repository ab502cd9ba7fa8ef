//! Logging for peerlink binaries.

mod args;
mod logging;

pub use args::LogArgs;
pub use logging::{LoggingError, env_filter, init_logging};
