#![allow(clippy::exit)]

mod cli;
mod commands;
mod confirm;
mod logging;
mod output;

use anyhow::Result;
use clap::Parser as _;
use tracing::debug;
use wellspring_maintenance::config::Config;

use crate::cli::{Cli, Commands};
use crate::commands::clear::ClearOptions;
use crate::commands::{generate_completions, run_clear, run_item, run_list, run_lookup};
use crate::output::Output;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.timing, cli.log_format);

    if let Err(e) = run(cli.command).await {
        Output::new().error(format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    if let Commands::Completions { shell } = command {
        return generate_completions(shell);
    }

    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env");
    }
    let config = Config::init()?;

    match command {
        Commands::List { target, page_size } => run_list(&config, target, page_size).await,
        Commands::Clear {
            target,
            batch_size,
            yes,
            abort_on_failure,
            allow_partial,
        } => {
            let options = ClearOptions {
                batch_size,
                yes,
                abort_on_failure,
                allow_partial,
            };
            run_clear(&config, target, options).await
        }
        Commands::Lookup { keywords } => run_lookup(&config, &keywords).await,
        Commands::Item { asin } => run_item(&config, &asin).await,
        Commands::Completions { .. } => Ok(()),
    }
}
