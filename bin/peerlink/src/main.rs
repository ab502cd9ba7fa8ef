//! peerlink demo binary.

mod cli;
mod config;
mod echo;

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands};
use crate::config::DemoConfig;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let config = DemoConfig::load(cli.config.as_deref())?;
    let logs = config.log.clone().merge(&cli.logs);
    peerlink_observability::init_logging(&logs).wrap_err("failed to initialise logging")?;

    match cli.command {
        Commands::Echo(args) => echo::run(config.apply_echo_args(&args), &args).await,
    }
}
