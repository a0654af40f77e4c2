use std::error::Error;

use clap::Parser;
use jiff::Zoned;
use log::info;
use wind_archive::{collect::collect_today, config::WindConfig, source::esios::EsiosClient};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,
}

/// Run this job every hour
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    let config = WindConfig::load(&args.env)?;
    let archive = config.archive();

    let client = EsiosClient::from_config(&config)?.with_raw_archive(archive.raw_dir());
    let now = Zoned::now().with_time_zone(config.reference_timezone.clone());
    let stats = collect_today(&client, &archive, config.granularity, &now)?;
    info!(
        "{}: {} new rows, {} updated",
        now.date(),
        stats.added,
        stats.updated
    );
    Ok(())
}
