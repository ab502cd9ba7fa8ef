//! Logging CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Logging")]
#[serde(default)]
pub struct LogArgs {
    /// Silence all output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, etc.).
    #[arg(short, long, action = clap::ArgAction::Count)]
    #[serde(skip)] // CLI-only, count action doesn't make sense in config
    pub verbosity: u8,

    /// Log filter directive (e.g., "connection=debug,topology=trace").
    #[arg(long = "log.filter", value_name = "DIRECTIVE")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Use JSON format for log output.
    #[arg(long = "log.json")]
    pub json: bool,
}

impl LogArgs {
    /// Overlay CLI flags on values loaded from a config file. Flags that were
    /// left at their defaults keep the file's value.
    pub fn merge(mut self, cli: &LogArgs) -> Self {
        self.quiet |= cli.quiet;
        self.verbosity = self.verbosity.max(cli.verbosity);
        if cli.filter.is_some() {
            self.filter = cli.filter.clone();
        }
        self.json |= cli.json;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let args: LogArgs = toml::from_str(
            r#"
            json = true
            filter = "topology=trace"
            "#,
        )
        .unwrap();

        assert!(args.json);
        assert!(!args.quiet);
        assert_eq!(args.filter.as_deref(), Some("topology=trace"));
    }

    #[test]
    fn test_merge_prefers_cli_flags() {
        let file = LogArgs {
            filter: Some("connection=debug".to_string()),
            ..Default::default()
        };
        let cli = LogArgs {
            verbosity: 2,
            filter: Some("multistream=trace".to_string()),
            ..Default::default()
        };

        let merged = file.merge(&cli);
        assert_eq!(merged.verbosity, 2);
        assert_eq!(merged.filter.as_deref(), Some("multistream=trace"));

        let merged = LogArgs {
            json: true,
            ..Default::default()
        }
        .merge(&LogArgs::default());
        assert!(merged.json);
    }
}
