//! quiver CLI

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quiver_cli::cmd;
use quiver_cli::{Cli, Commands, DevCommands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Add {
            packages,
            refresh,
            switch,
        } => cmd::add::add(&cli.source, &packages, refresh, switch).await?,
        Commands::Dev { command } => match command {
            DevCommands::Check { name } => cmd::dev::check(&cli.source, &name)?,
            DevCommands::Bintest { name } => cmd::dev::bintest(&cli.source, &name).await?,
        },
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
