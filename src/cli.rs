//! Defines command-line interface options using `clap` for the gridchannel application.

use clap::Parser;
use std::path::PathBuf;

/// Extract labeled channels from NetCDF time series
#[derive(Parser, Debug)]
#[command(
    version,
    name = "gridchannel",
    about = "Extracts georeferenced channels around labeled samples into per-period tensors"
)]
pub struct Args {
    /// Path to the extraction job descriptor (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Number of worker threads, overrides the job's nb_workers (0 or 1: sequential)
    #[arg(short = 't', long)]
    pub workers: Option<usize>,

    /// Only partition and merge the label tables, print the periods and exit
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
