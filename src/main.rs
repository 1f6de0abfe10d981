mod cli;
mod runner;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fetchledger::observability::init_tracing();

    let cli = Cli::parse();
    let config = runner::load_config(cli.config)?;

    match cli.command {
        Commands::Run(args) => runner::run(args, config).await?,
        Commands::Status(args) => runner::status(args, &config)?,
        Commands::Quarantined(args) => runner::quarantined(args, &config)?,
        Commands::Release(args) => runner::release(args, &config)?,
        Commands::Config => runner::show_config(&config)?,
    }

    Ok(())
}
