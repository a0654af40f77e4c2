pub mod report;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use itertools::Itertools;
use jiff::{tz::TimeZone, SignedDuration, Timestamp};
use log::{error, info, warn};
use thiserror::Error;

use crate::{
    config::WindConfig,
    db::{SeriesStore, StorageError},
    interval::{chunk::FetchChunk, date_tz::DateTz, granularity::Granularity, IntervalLike},
    reconcile::report::{ChunkFailure, Outcome, ReconciliationReport},
    source::{DataSource, FetchError},
    timeseries::{
        grid::ExpectedGrid,
        series::{Sample, Series},
    },
};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("cannot reconcile empty series")]
    EmptySeries,
    #[error("storage failure, no changes made: {0}")]
    Storage(#[from] StorageError),
    #[error("time zone arithmetic failed: {0}")]
    Time(#[from] jiff::Error),
}

/// How missing timestamps are grouped into requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkStrategy {
    /// One request per run of adjacent missing timestamps.
    #[default]
    ContiguousRuns,
    /// One request per local calendar day with at least one gap.
    WholeDay,
}

/// Expected grid timestamps absent from a series, strictly ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingSet(Vec<Timestamp>);

impl MissingSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Timestamp> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<Timestamp> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<Timestamp> {
        self.0.last().copied()
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.0.binary_search(&ts).is_ok()
    }

    pub fn as_slice(&self) -> &[Timestamp] {
        &self.0
    }
}

/// Drop the seconds and sub-second part, so clock jitter does not add a slot.
pub fn truncate_to_minute(ts: Timestamp) -> Timestamp {
    let secs = ts.as_second() - ts.as_second().rem_euclid(60);
    Timestamp::from_second(secs).unwrap_or(ts)
}

/// Every grid timestamp in `[first sample, now]` not present in the series.
/// Walks the grid and the series together, so it is linear in their sizes.
pub fn compute_missing(
    series: &Series,
    granularity: Granularity,
    now: Timestamp,
) -> Result<MissingSet, ReconcileError> {
    let start = series.first().ok_or(ReconcileError::EmptySeries)?.timestamp;
    Ok(missing_since(series, start, granularity, now))
}

/// Grid timestamps in `[start, now]` not present in the series.
fn missing_since(
    series: &Series,
    start: Timestamp,
    granularity: Granularity,
    now: Timestamp,
) -> MissingSet {
    let end = truncate_to_minute(now);
    let mut present = series.timestamps().peekable();
    let mut missing = Vec::new();
    for ts in ExpectedGrid::new(start, end, granularity) {
        while present.next_if(|p| *p < ts).is_some() {}
        if present.peek() != Some(&ts) {
            missing.push(ts);
        }
    }
    MissingSet(missing)
}

/// Coalesce runs of adjacent missing timestamps into `[first, last + g)` chunks.
pub fn group_into_chunks(missing: &MissingSet, granularity: Granularity) -> Vec<FetchChunk> {
    let step = granularity.duration();
    let mut chunks = Vec::new();
    let mut run: Option<(Timestamp, Timestamp)> = None;
    for &ts in missing.iter() {
        run = match run {
            Some((first, last)) if ts.duration_since(last) == step => Some((first, ts)),
            Some((first, last)) => {
                chunks.push(FetchChunk::covering(first, last, granularity));
                Some((ts, ts))
            }
            None => Some((ts, ts)),
        };
    }
    if let Some((first, last)) = run {
        chunks.push(FetchChunk::covering(first, last, granularity));
    }
    chunks
}

/// One chunk per local calendar day that has a missing timestamp.
pub fn group_by_day(missing: &MissingSet, tz: &TimeZone) -> Result<Vec<FetchChunk>, ReconcileError> {
    let days: Vec<DateTz> = missing
        .iter()
        .map(|ts| DateTz::containing(&ts.to_zoned(tz.clone())))
        .collect::<Result<_, _>>()?;
    Ok(days
        .into_iter()
        .dedup()
        .filter_map(|day| FetchChunk::of(&day))
        .collect())
}

/// The result of one run.
pub struct Reconciliation {
    pub series: Series,
    pub report: ReconciliationReport,
}

/// Detects gaps in a series and backfills them from a [`DataSource`].
pub struct GapReconciler<S: DataSource> {
    source: S,
    granularity: Granularity,
    timezone: TimeZone,
    strategy: ChunkStrategy,
    max_chunk: Option<SignedDuration>,
    stop_on_auth_error: bool,
    abort: Option<Arc<AtomicBool>>,
}

impl<S: DataSource> GapReconciler<S> {
    pub fn new(source: S, granularity: Granularity, timezone: TimeZone) -> Self {
        GapReconciler {
            source,
            granularity,
            timezone,
            strategy: ChunkStrategy::default(),
            max_chunk: None,
            stop_on_auth_error: false,
            abort: None,
        }
    }

    pub fn from_config(source: S, config: &WindConfig) -> Self {
        GapReconciler::new(source, config.granularity, config.reference_timezone.clone())
            .with_max_chunk(config.max_chunk)
    }

    pub fn with_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Split any chunk longer than `max_chunk` into several requests.
    pub fn with_max_chunk(mut self, max_chunk: SignedDuration) -> Self {
        self.max_chunk = Some(max_chunk);
        self
    }

    /// Stop issuing requests after the first authorization failure.
    pub fn stop_on_auth_error(mut self, stop: bool) -> Self {
        self.stop_on_auth_error = stop;
        self
    }

    /// No further chunk is requested once this flag is set.  Samples fetched
    /// until then are still merged and saved.
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn compute_missing(&self, series: &Series, now: Timestamp) -> Result<MissingSet, ReconcileError> {
        compute_missing(series, self.granularity, now)
    }

    pub fn group_into_chunks(&self, missing: &MissingSet) -> Result<Vec<FetchChunk>, ReconcileError> {
        let chunks = match self.strategy {
            ChunkStrategy::ContiguousRuns => group_into_chunks(missing, self.granularity),
            ChunkStrategy::WholeDay => group_by_day(missing, &self.timezone)?,
        };
        Ok(match self.max_chunk {
            Some(max) => chunks
                .iter()
                .flat_map(|c| c.split(max, self.granularity))
                .collect(),
            None => chunks,
        })
    }

    /// Fetch one chunk.  Samples the source returns outside the chunk are dropped.
    pub fn fetch_chunk(&self, chunk: &FetchChunk) -> Result<Vec<Sample>, FetchError> {
        let samples = self
            .source
            .fetch(chunk.start(), chunk.end(), self.granularity)?;
        Ok(samples
            .into_iter()
            .filter(|s| chunk.contains(s.timestamp))
            .collect())
    }

    pub fn merge_and_persist<St: SeriesStore>(
        &self,
        mut series: Series,
        samples: Vec<Sample>,
        store: &St,
    ) -> Result<Series, StorageError> {
        let stats = series.merge(samples);
        info!(
            "merged {} new and {} corrected samples, {} in total",
            stats.added,
            stats.updated,
            series.len()
        );
        store.save(&series)?;
        Ok(series)
    }

    /// Compute the gaps, fetch them chunk by chunk, merge, save and report.
    /// A failed chunk does not stop the run, a storage failure does.
    pub fn reconcile<St: SeriesStore>(
        &self,
        series: Series,
        now: Timestamp,
        store: &St,
    ) -> Result<Reconciliation, ReconcileError> {
        let missing = match self.compute_missing(&series, now) {
            Ok(missing) => missing,
            Err(ReconcileError::EmptySeries) => {
                warn!("cannot reconcile empty series");
                let report = ReconciliationReport::empty_series(now, self.timezone.clone());
                return Ok(Reconciliation { series, report });
            }
            Err(e) => return Err(e),
        };
        let grid_start = match series.first() {
            Some(first) => first.timestamp,
            None => return Err(ReconcileError::EmptySeries),
        };
        let mut report = ReconciliationReport::new(now, self.timezone.clone(), missing.len());
        report.missing_range = missing.first().zip(missing.last());
        if missing.is_empty() {
            info!("No missing timestamps.");
            return Ok(Reconciliation { series, report });
        }

        let chunks = self.group_into_chunks(&missing)?;
        info!(
            "{} missing timestamps between {} and {}, {} chunks to fetch",
            missing.len(),
            missing.first().map(|t| t.to_string()).unwrap_or_default(),
            missing.last().map(|t| t.to_string()).unwrap_or_default(),
            chunks.len()
        );

        let mut fetched: Vec<Sample> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if self.is_aborted() {
                warn!("run aborted, {} chunks not requested", chunks.len() - i);
                report.skipped_chunks = chunks.len() - i;
                break;
            }
            if self.stop_on_auth_error && report.auth_failed() {
                warn!(
                    "credential rejected, {} chunks not requested",
                    chunks.len() - i
                );
                report.skipped_chunks = chunks.len() - i;
                break;
            }
            report.chunks_requested += 1;
            match self.fetch_chunk(chunk) {
                Ok(xs) if xs.is_empty() => {
                    info!("No data for chunk {}", chunk);
                    report.fetched_empty.push(*chunk);
                }
                Ok(xs) => {
                    info!("Fetched {} samples for chunk {}", xs.len(), chunk);
                    fetched.extend(xs);
                }
                Err(e) => {
                    match &e {
                        FetchError::Auth { .. } => error!(
                            "Credential rejected when fetching {}: {}.  Later requests will likely fail too.",
                            chunk, e
                        ),
                        FetchError::Transient(_) => error!("Error fetching {}: {}", chunk, e),
                    }
                    report.failures.push(ChunkFailure {
                        chunk: *chunk,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let series = if fetched.is_empty() {
            series
        } else {
            self.merge_and_persist(series, fetched, store)?
        };

        // Whole-day chunks may reach back before the first stored sample.
        // Those slots were never part of the gap set, so keep the original
        // grid start.
        let residual = missing_since(&series, grid_start, self.granularity, now);
        report.filled = missing.iter().filter(|t| !residual.contains(**t)).count();
        report.outcome = if residual.is_empty() {
            Outcome::FullyReconciled
        } else {
            Outcome::PartiallyReconciled
        };
        report.residual = residual;
        info!(
            "Filled {} of {} missing timestamps, {} remain",
            report.filled,
            report.missing_at_start,
            report.residual.len()
        );
        Ok(Reconciliation { series, report })
    }
}
