use std::error::Error;

use clap::Parser;
use jiff::Timestamp;
use log::info;
use wind_archive::{
    config::WindConfig,
    db::SeriesStore,
    reconcile::{compute_missing, report::ReconciliationReport, ReconcileError},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Also print the report to stdout
    #[arg(short, long)]
    print: bool,
}

/// Report the gaps in the archive without fetching anything.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    let config = WindConfig::load(&args.env)?;
    let archive = config.archive();
    let tz = config.reference_timezone.clone();
    let now = Timestamp::now();

    let series = archive.load()?;
    let report = match compute_missing(&series, config.granularity, now) {
        Ok(missing) => ReconciliationReport::check_only(now, tz, missing),
        Err(ReconcileError::EmptySeries) => ReconciliationReport::empty_series(now, tz),
        Err(e) => return Err(e.into()),
    };

    let path = report.write(&archive.reports_dir())?;
    info!(
        "{} missing timestamps in {} rows, report saved to {}",
        report.missing_at_start,
        series.len(),
        path.display()
    );
    if args.print {
        println!("{}", report.to_markdown());
    }
    Ok(())
}
