mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    spectre::logging::init(cli.common.verbose);

    match &cli.command {
        Commands::Request(args) => commands::request::run(&cli.common, args),
        Commands::Compile(args) => commands::compile::run(&cli.common, args),
        Commands::Validate(args) => commands::validate::run(&cli.common, args),
        Commands::Cache(args) => commands::cache::run(&cli.common, args),
    }
}
