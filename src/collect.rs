use jiff::{civil::Date, Timestamp, Zoned};
use log::{error, info};
use thiserror::Error;

use crate::{
    db::{wind_archive::WindArchive, SeriesStore, StorageError},
    interval::{
        chunk::FetchChunk, date_tz::DateTz, granularity::Granularity, month_tz::MonthTz,
        IntervalLike,
    },
    reconcile::truncate_to_minute,
    source::{DataSource, FailureKind, FetchError},
    timeseries::series::{MergeStats, Sample},
};

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("{0}")]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("time zone arithmetic failed: {0}")]
    Time(#[from] jiff::Error),
}

fn fetch_window<S: DataSource>(
    source: &S,
    chunk: &FetchChunk,
    granularity: Granularity,
) -> Result<Vec<Sample>, FetchError> {
    let samples = source.fetch(chunk.start(), chunk.end(), granularity)?;
    Ok(samples
        .into_iter()
        .filter(|s| chunk.contains(s.timestamp))
        .collect())
}

/// Fetch the current local day up to `now` and merge it into the day file
/// and into the archive.
pub fn collect_today<S: DataSource>(
    source: &S,
    archive: &WindArchive,
    granularity: Granularity,
    now: &Zoned,
) -> Result<MergeStats, CollectError> {
    let now = now.with_time_zone(archive.tz.clone());
    let day = DateTz::containing(&now)?;
    let end = truncate_to_minute(now.timestamp());
    let Some(chunk) = FetchChunk::new(day.start(), end) else {
        info!("Nothing to fetch yet for {}", day);
        return Ok(MergeStats::default());
    };

    let samples = fetch_window(source, &chunk, granularity)?;
    info!("Fetched {} samples for {}", samples.len(), day);
    if samples.is_empty() {
        return Ok(MergeStats::default());
    }

    let day_store = archive.day_store(day.date());
    let mut day_series = day_store.load()?;
    day_series.merge(samples.clone());
    day_store.save(&day_series)?;

    Ok(archive.append(samples)?)
}

/// Outcome of a history backfill.
#[derive(Debug, Default)]
pub struct HistorySummary {
    pub months: usize,
    pub samples: usize,
    pub failed: Vec<(String, FailureKind)>,
    pub stats: MergeStats,
}

/// Fetch month by month from `from` to `now` and merge everything into the
/// archive.  A failed month is logged and skipped.
pub fn collect_history<S: DataSource>(
    source: &S,
    archive: &WindArchive,
    granularity: Granularity,
    from: Date,
    now: &Zoned,
) -> Result<HistorySummary, CollectError> {
    let start = from.to_zoned(archive.tz.clone())?;
    let end: Timestamp = truncate_to_minute(now.timestamp());
    let months = MonthTz::containing(&start)?.up_to(end);

    let mut summary = HistorySummary::default();
    let mut samples: Vec<Sample> = Vec::new();
    for month in &months {
        let window_start = month.start().max(start.timestamp());
        let window_end = month.end().min(end);
        let Some(chunk) = FetchChunk::new(window_start, window_end) else {
            continue;
        };
        summary.months += 1;
        match fetch_window(source, &chunk, granularity) {
            Ok(xs) => {
                info!("{}: {} samples", month, xs.len());
                samples.extend(xs);
            }
            Err(e) => {
                error!("{}: {}", month, e);
                summary.failed.push((month.to_string(), e.kind()));
            }
        }
    }
    summary.samples = samples.len();
    if !samples.is_empty() {
        summary.stats = archive.append(samples)?;
    }
    info!(
        "Fetched {} months ({} failed), {} samples",
        summary.months,
        summary.failed.len(),
        summary.samples
    );
    Ok(summary)
}
