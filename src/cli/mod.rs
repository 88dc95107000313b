//! Command-line definitions for the `hct` binary.

pub(crate) mod get;
pub(crate) mod sweep;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hct", version, about = "Disk-backed HTTP response cache")]
pub(crate) struct Cli {
    /// Log every cache decision
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Fetch a URL through the cache
    Get(GetArgs),
    /// Evict entries not requested within the maximum age
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
pub(crate) struct GetArgs {
    /// Absolute URL to fetch
    pub url: String,

    /// Cache directory (overrides `base_path` from --config)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Byte range, e.g. `bytes=0-1023`
    #[arg(long)]
    pub range: Option<String>,

    /// Serve from cache without revalidating for this many seconds
    #[arg(long)]
    pub no_update: Option<u64>,

    /// Measure the no-update window from the origin's Last-Modified
    #[arg(long)]
    pub impatient: bool,

    /// Seconds added to the impatient window
    #[arg(long)]
    pub fudge: Option<u64>,

    /// Evict entries not requested within this many hours
    #[arg(long)]
    pub max_age_hours: Option<f64>,

    /// Cache settings file (.toml or .json)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct SweepArgs {
    /// Cache directory
    #[arg(long)]
    pub cache_dir: PathBuf,

    /// Evict entries not requested within this many hours
    #[arg(long, default_value_t = hct::config::DEFAULT_MAX_AGE_HOURS)]
    pub max_age_hours: f64,
}
