use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("at least one multicodec must be tracked")]
    NoMulticodecs,
}
