//! Demo configuration, loaded from TOML.

use std::path::Path;

use eyre::{Result, WrapErr};
use peerlink_net_multistream::MultistreamConfig;
use peerlink_net_topology::TopologyConfig;
use peerlink_observability::LogArgs;
use serde::{Deserialize, Serialize};

use crate::cli::EchoArgs;

const ECHO_PROTOCOL: &str = "/echo/1.0.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct DemoConfig {
    pub(crate) log: LogArgs,
    pub(crate) multistream: MultistreamConfig,
    pub(crate) topology: TopologyConfig,
    pub(crate) echo: EchoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EchoConfig {
    /// Protocols proposed by the local side.
    pub(crate) protocols: Vec<String>,
    /// Protocols the remote side accepts.
    pub(crate) remote_protocols: Vec<String>,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            protocols: vec![ECHO_PROTOCOL.to_string()],
            remote_protocols: vec![ECHO_PROTOCOL.to_string()],
        }
    }
}

impl DemoConfig {
    /// Load from `path`, or defaults when no file is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))
    }

    pub(crate) fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override protocol lists with any given on the command line.
    pub(crate) fn apply_echo_args(mut self, args: &EchoArgs) -> Self {
        if !args.protocols.is_empty() {
            self.echo.protocols = args.protocols.clone();
        }
        if !args.remote_protocols.is_empty() {
            self.echo.remote_protocols = args.remote_protocols.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DemoConfig::load(None).unwrap();
        assert_eq!(config.echo.protocols, vec![ECHO_PROTOCOL]);
        assert_eq!(config.multistream, MultistreamConfig::default());
        assert_eq!(config.topology.min, 0);
    }

    #[test]
    fn test_from_toml() {
        let config = DemoConfig::from_toml(
            r#"
            [log]
            json = true

            [multistream]
            max_message_len = 512

            [topology]
            min = 1
            max = 4

            [echo]
            remote_protocols = ["/echo/1.0.0", "/ping/1.0.0"]
            "#,
        )
        .unwrap();

        assert!(config.log.json);
        assert_eq!(config.multistream.max_message_len, 512);
        assert_eq!(config.topology, TopologyConfig { min: 1, max: 4 });
        assert_eq!(config.echo.protocols, vec![ECHO_PROTOCOL]);
        assert_eq!(config.echo.remote_protocols.len(), 2);
    }

    #[test]
    fn test_cli_overrides_protocols() {
        let args = EchoArgs {
            protocols: vec!["/ping/1.0.0".to_string()],
            remote_protocols: Vec::new(),
            message: String::new(),
            streams: 1,
        };
        let config = DemoConfig::default().apply_echo_args(&args);
        assert_eq!(config.echo.protocols, vec!["/ping/1.0.0"]);
        assert_eq!(config.echo.remote_protocols, vec![ECHO_PROTOCOL]);
    }

    #[test]
    fn test_missing_file() {
        assert!(DemoConfig::load(Some(Path::new("/nonexistent/peerlink.toml"))).is_err());
    }
}
