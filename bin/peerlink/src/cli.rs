//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use peerlink_observability::LogArgs;

/// peerlink - connection and topology demo over an in-memory transport
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    /// TOML configuration file. CLI flags take precedence.
    #[arg(long, global = true, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Open a stream to an in-memory echo peer and round-trip messages.
    Echo(EchoArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct EchoArgs {
    /// Protocols to propose, in order of preference.
    #[arg(long = "protocol", value_name = "ID")]
    pub(crate) protocols: Vec<String>,

    /// Protocols the remote peer supports.
    #[arg(long = "remote-protocol", value_name = "ID")]
    pub(crate) remote_protocols: Vec<String>,

    /// Message to send on each stream.
    #[arg(long, default_value = "hello peerlink")]
    pub(crate) message: String,

    /// Number of streams to open.
    #[arg(long, default_value_t = 1)]
    pub(crate) streams: usize,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_echo() {
        let cli = Cli::try_parse_from([
            "peerlink",
            "-vv",
            "echo",
            "--protocol",
            "/echo/2.0.0",
            "--protocol",
            "/echo/1.0.0",
            "--streams",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.logs.verbosity, 2);
        let Commands::Echo(args) = cli.command;
        assert_eq!(args.protocols, vec!["/echo/2.0.0", "/echo/1.0.0"]);
        assert_eq!(args.streams, 3);
        assert_eq!(args.message, "hello peerlink");
    }
}
