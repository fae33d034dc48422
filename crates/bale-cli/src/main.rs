//! The `bale` binary: `bale build` and `bale dev`.

mod args;
mod commands;

use clap::Parser;

use bale_core::logging::{init_logging, Verbosity};

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbosity = if cli.verbose {
        Verbosity::Verbose
    } else if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };
    init_logging(verbosity);

    match cli.command {
        Command::Build(args) => commands::build(args).await,
        Command::Dev(args) => commands::dev(args).await,
    }
}
