//! Entry point for the gridchannel application.
//! Loads an extraction job, then either prints its period plan or runs the extraction.

use clap::Parser;
use gridchannel::channel::{extract_channels, plan};
use gridchannel::config::ExtractionConfig;
use gridchannel::parallel::get_parallel_info;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ExtractionConfig::from_json_file(&args.config)?;
    if let Some(workers) = args.workers {
        config.nb_workers = workers;
    }
    info!(job = %config.id, path = %args.config.display(), "loaded extraction job");

    if args.dry_run {
        let merged = plan(&config)?;
        println!("{} period(s) for job '{}'", merged.len(), config.id);
        for (period, unit) in &merged {
            let labels: Vec<String> = unit
                .iter()
                .map(|(label, block)| format!("{}={}", label, block.len()))
                .collect();
            println!("  {}: {}", period, labels.join(", "));
        }
        return Ok(());
    }

    get_parallel_info().log_info();
    let results = extract_channels(&config)?;
    for (variable, periods) in &results {
        let files: usize = periods.values().map(|labels| labels.len()).sum();
        println!(
            "✅ {}: {} period(s), {} block(s) written under {}",
            variable,
            periods.len(),
            files,
            config.channel_dir.join(variable).display()
        );
    }

    Ok(())
}
