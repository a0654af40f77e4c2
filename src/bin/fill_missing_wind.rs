use std::{
    error::Error,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use clap::Parser;
use jiff::Timestamp;
use log::{error, info, warn};
use wind_archive::{
    config::WindConfig,
    db::SeriesStore,
    reconcile::{report::ReconciliationReport, ChunkStrategy, GapReconciler, ReconcileError},
    source::esios::EsiosClient,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Request whole local days instead of the exact missing ranges
    #[arg(long)]
    whole_day: bool,

    /// Stop requesting chunks after the first authorization failure
    #[arg(long)]
    stop_on_auth_error: bool,
}

/// Run this job every day after `update_wind_today`
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    let config = WindConfig::load(&args.env)?;
    let archive = config.archive();
    let now = Timestamp::now();

    let abort = Arc::new(AtomicBool::new(false));
    let flag = abort.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, finishing the current chunk");
        flag.store(true, Ordering::SeqCst);
    })?;

    let client = EsiosClient::from_config(&config)?.with_raw_archive(archive.raw_dir());
    let strategy = if args.whole_day {
        ChunkStrategy::WholeDay
    } else {
        ChunkStrategy::ContiguousRuns
    };
    let reconciler = GapReconciler::from_config(client, &config)
        .with_strategy(strategy)
        .stop_on_auth_error(args.stop_on_auth_error)
        .with_abort_flag(abort);

    let result = archive
        .load()
        .map_err(ReconcileError::from)
        .and_then(|series| reconciler.reconcile(series, now, &archive));
    let report = match result {
        Ok(reconciliation) => reconciliation.report,
        Err(e) => {
            error!("{}", e);
            let report =
                ReconciliationReport::storage_failure(now, config.reference_timezone.clone(), &e);
            report.write(&archive.reports_dir())?;
            return Err(e.into());
        }
    };

    let path = report.write(&archive.reports_dir())?;
    info!("{}, report saved to {}", report.outcome_line(), path.display());
    if report.auth_failed() {
        error!("The ESIOS API token was rejected, renew ESIOS_API_TOKEN.");
    }
    Ok(())
}
