//! Tracing subscriber setup.

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::args::LogArgs;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the log filter for `args`.
///
/// Precedence:
/// 1. `--quiet` shows errors only
/// 2. otherwise `RUST_LOG` if set, else a level derived from `-v` flags
/// 3. directives from `--log.filter` are added on top
pub fn env_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom_filter) = &args.filter {
        for directive in custom_filter.split(',') {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
    }

    filter
}

/// Install the global tracing subscriber. Fails if one is already set.
pub fn init_logging(args: &LogArgs) -> Result<(), LoggingError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = env_filter(args);
    let directives = filter.to_string();
    if args.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .finish()
            .try_init()?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .finish()
            .try_init()?;
    }

    debug!(target: "observability", filter = %directives, json = args.json, "logging initialized");
    Ok(())
}
