//! cantar - canonical tar archives for tree transfer.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    match &cli.command {
        cli::Commands::Create(args) => commands::create::execute(args, cli.quiet),
        cli::Commands::Extract(args) => commands::extract::execute(args, cli.quiet),
        cli::Commands::List(args) => commands::list::execute(args),
        cli::Commands::Hash(args) => commands::hash::execute(args),
        cli::Commands::Rewrite(args) => commands::rewrite::execute(args, cli.quiet),
    }
}
