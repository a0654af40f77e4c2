use std::error::Error;

use clap::Parser;
use jiff::{civil::Date, Zoned};
use log::{info, warn};
use wind_archive::{collect::collect_history, config::WindConfig, source::esios::EsiosClient};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// First local day to fetch
    #[arg(short, long, default_value = "2023-01-01")]
    from: Date,
}

/// One-off backfill of the archive, month by month.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    let config = WindConfig::load(&args.env)?;
    let archive = config.archive();

    let client = EsiosClient::from_config(&config)?.with_raw_archive(archive.raw_dir());
    let now = Zoned::now().with_time_zone(config.reference_timezone.clone());
    let summary = collect_history(&client, &archive, config.granularity, args.from, &now)?;
    for (month, kind) in &summary.failed {
        warn!("{} failed with {}, run fill_missing_wind to retry", month, kind);
    }
    info!(
        "{} new rows, {} updated",
        summary.stats.added, summary.stats.updated
    );
    Ok(())
}
