//! Black-box suites any connection or topology can be run against.
//!
//! Suites panic on the first violated property, so they are called from
//! `#[tokio::test]` functions in the implementing crate.

mod connection;
mod topology;

pub use connection::{ConnectionFactory, connection_suite};
pub use topology::{TopologyFactory, topology_properties, topology_suite};
