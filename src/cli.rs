use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fetchledger")]
#[command(about = "Resumable, rate-limited catalog fetching", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $FETCHLEDGER_CONFIG or config/fetchledger.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every pending id of a universe file
    Run(RunArgs),
    /// Show ledger counts, every record, or the records of specific ids
    Status(StatusArgs),
    /// List quarantined items as JSON lines
    Quarantined(QuarantinedArgs),
    /// Take items out of quarantine so the next run retries them
    Release(ReleaseArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Provider key used for rate limiting and failure records
    #[arg(long)]
    pub provider: String,

    /// Request URL with an `{id}` placeholder
    #[arg(long)]
    pub url_template: String,

    /// File with one id per line
    #[arg(long)]
    pub ids: PathBuf,

    /// Directory receiving one `<id>.json` per fetched item
    #[arg(long)]
    pub out: PathBuf,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Override orchestrator.worker_pool_size
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Show the records of these ids instead of totals
    #[arg(conflicts_with = "all")]
    pub ids: Vec<String>,

    /// Dump every status record as JSON lines
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct QuarantinedArgs {
    /// Print at most this many records
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ReleaseArgs {
    /// Ids to release
    #[arg(required = true)]
    pub ids: Vec<String>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{}`", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in `{}`", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
