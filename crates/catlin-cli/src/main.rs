//! Catlin CLI - convert, train, partition and apply instance logs.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use catlin_cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("catlin=info".parse()?))
        .init();

    let cli = Cli::parse();
    cli.command.run()
}
