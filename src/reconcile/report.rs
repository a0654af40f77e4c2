use std::{
    io::Write,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use jiff::{civil::Date, tz::TimeZone, Timestamp, Zoned};
use tabled::{builder::Builder, settings::Style};

use crate::{
    db::StorageError,
    interval::chunk::FetchChunk,
    reconcile::MissingSet,
    source::FailureKind,
    utils::atomic_file::write_atomic,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    FullyReconciled,
    PartiallyReconciled,
    EmptySeries,
    StorageFailed(String),
    /// Gaps were only counted, nothing was fetched.
    CheckOnly,
}

#[derive(Debug, Clone)]
pub struct ChunkFailure {
    pub chunk: FetchChunk,
    pub kind: FailureKind,
    pub message: String,
}

/// What a run found, what it filled and what is left.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub run_at: Timestamp,
    pub timezone: TimeZone,
    pub missing_at_start: usize,
    /// First and last missing timestamp when the run started.
    pub missing_range: Option<(Timestamp, Timestamp)>,
    pub filled: usize,
    pub chunks_requested: usize,
    pub failures: Vec<ChunkFailure>,
    pub fetched_empty: Vec<FetchChunk>,
    pub skipped_chunks: usize,
    pub residual: MissingSet,
    pub outcome: Outcome,
}

impl ReconciliationReport {
    pub fn new(run_at: Timestamp, timezone: TimeZone, missing_at_start: usize) -> Self {
        ReconciliationReport {
            run_at,
            timezone,
            missing_at_start,
            missing_range: None,
            filled: 0,
            chunks_requested: 0,
            failures: Vec::new(),
            fetched_empty: Vec::new(),
            skipped_chunks: 0,
            residual: MissingSet::default(),
            outcome: Outcome::FullyReconciled,
        }
    }

    pub fn empty_series(run_at: Timestamp, timezone: TimeZone) -> Self {
        let mut report = ReconciliationReport::new(run_at, timezone, 0);
        report.outcome = Outcome::EmptySeries;
        report
    }

    /// The run stopped on a storage error.  The stored series is unchanged.
    pub fn storage_failure(run_at: Timestamp, timezone: TimeZone, error: &dyn std::error::Error) -> Self {
        let mut report = ReconciliationReport::new(run_at, timezone, 0);
        report.outcome = Outcome::StorageFailed(error.to_string());
        report
    }

    /// A report of the gaps only, nothing was fetched.
    pub fn check_only(run_at: Timestamp, timezone: TimeZone, missing: MissingSet) -> Self {
        let mut report = ReconciliationReport::new(run_at, timezone, missing.len());
        report.outcome = Outcome::CheckOnly;
        report.missing_range = missing.first().zip(missing.last());
        report.residual = missing;
        report
    }

    pub fn auth_failed(&self) -> bool {
        self.failures.iter().any(|f| f.kind == FailureKind::Auth)
    }

    pub fn outcome_line(&self) -> String {
        match &self.outcome {
            Outcome::FullyReconciled => "fully reconciled".to_string(),
            Outcome::PartiallyReconciled => format!(
                "partially reconciled ({} gaps remain, see list)",
                self.residual.len()
            ),
            Outcome::EmptySeries => "cannot reconcile empty series".to_string(),
            Outcome::StorageFailed(e) => {
                format!("failed to reconcile (storage error, no changes made): {}", e)
            }
            Outcome::CheckOnly => format!(
                "check only, {} gaps found, nothing fetched",
                self.missing_at_start
            ),
        }
    }

    fn tz_name(&self) -> &str {
        self.timezone.iana_name().unwrap_or("UTC")
    }

    fn local(&self, ts: Timestamp) -> Zoned {
        ts.to_zoned(self.timezone.clone())
    }

    fn local_minute(&self, ts: Timestamp) -> String {
        self.local(ts).strftime("%Y-%m-%d %H:%M").to_string()
    }

    /// Residual gaps grouped by local day, times as `HH:MM`.
    pub fn residual_by_day(&self) -> Vec<(Date, Vec<String>)> {
        let zoned: Vec<Zoned> = self.residual.iter().map(|ts| self.local(*ts)).collect();
        let groups = zoned.iter().chunk_by(|z| z.date());
        let mut out = Vec::new();
        for (date, group) in &groups {
            out.push((date, group.map(|z| z.strftime("%H:%M").to_string()).collect()));
        }
        out
    }

    fn failures_table(&self) -> String {
        let mut builder = Builder::new();
        builder.push_record(vec!["Chunk", "Kind", "Error"]);
        for failure in &self.failures {
            builder.push_record(vec![
                failure.chunk.to_string_tz(&self.timezone),
                failure.kind.to_string(),
                failure.message.clone(),
            ]);
        }
        let mut table = builder.build();
        table.with(Style::markdown());
        table.to_string()
    }

    fn residual_table(&self) -> String {
        let mut builder = Builder::new();
        builder.push_record(vec![
            "Date".to_string(),
            format!("Missing times ({})", self.tz_name()),
        ]);
        for (date, times) in self.residual_by_day() {
            builder.push_record(vec![date.to_string(), times.join(", ")]);
        }
        let mut table = builder.build();
        table.with(Style::markdown());
        table.to_string()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Wind Data Missing Report\n\n");
        out.push_str(&format!(
            "Run at: {} ({})\n\n",
            self.local(self.run_at).strftime("%Y-%m-%d %H:%M:%S"),
            self.tz_name()
        ));
        out.push_str(&format!("**Outcome: {}**\n\n", self.outcome_line()));

        if matches!(self.outcome, Outcome::EmptySeries | Outcome::StorageFailed(_)) {
            return out;
        }

        out.push_str(&format!(
            "- Missing timestamps found: {}\n",
            self.missing_at_start
        ));
        if let Some((first, last)) = self.missing_range {
            out.push_str(&format!(
                "- Gaps found from {} to {}\n",
                self.local_minute(first),
                self.local_minute(last)
            ));
        }
        if self.outcome != Outcome::CheckOnly {
            out.push_str(&format!("- Filled: {}\n", self.filled));
            if let (Some(first), Some(last)) = (self.residual.first(), self.residual.last()) {
                out.push_str(&format!(
                    "- Unfilled range: {} to {}\n",
                    self.local_minute(first),
                    self.local_minute(last)
                ));
            }
            out.push_str(&format!(
                "- Chunks requested: {}, fetched empty: {}, failed: {}, not requested: {}\n",
                self.chunks_requested,
                self.fetched_empty.len(),
                self.failures.len(),
                self.skipped_chunks
            ));
        }
        out.push('\n');

        if self.auth_failed() {
            out.push_str(
                "> **Authorization failure**: the data source rejected the API token. \
                 Renew it before the next run.\n\n",
            );
        }

        if !self.failures.is_empty() {
            out.push_str(&format!("## Failed chunks\n\n{}\n\n", self.failures_table()));
        }

        if !self.fetched_empty.is_empty() {
            out.push_str("## Chunks with no data at the source\n\n");
            for chunk in &self.fetched_empty {
                out.push_str(&format!("- {}\n", chunk.to_string_tz(&self.timezone)));
            }
            out.push('\n');
        }

        if self.residual.is_empty() {
            out.push_str("All intervals are present.\n");
        } else {
            out.push_str(&format!(
                "## Unfilled gaps\n\n{} missing timestamps across {} days.\n\n{}\n",
                self.residual.len(),
                self.residual_by_day().len(),
                self.residual_table()
            ));
        }
        out
    }

    /// Return the report filename for the local day of the run.
    pub fn filename(&self, dir: &Path) -> PathBuf {
        dir.join(format!(
            "missing_report_{}.md",
            self.local(self.run_at).date()
        ))
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf, StorageError> {
        let path = self.filename(dir);
        let content = self.to_markdown();
        write_atomic(&path, |out| -> Result<(), StorageError> {
            out.write_all(content.as_bytes())?;
            Ok(())
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fs};

    use jiff::{tz::TimeZone, Timestamp};

    use super::*;
    use crate::utils::test_dir;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn madrid() -> TimeZone {
        TimeZone::get("Europe/Madrid").unwrap()
    }

    fn partial_report() -> ReconciliationReport {
        let mut report = ReconciliationReport::new(ts("2024-01-02T09:00:00Z"), madrid(), 4);
        report.filled = 1;
        report.chunks_requested = 2;
        report.failures.push(ChunkFailure {
            chunk: FetchChunk::new(ts("2024-01-01T02:00:00Z"), ts("2024-01-01T02:30:00Z")).unwrap(),
            kind: FailureKind::Auth,
            message: "authorization rejected by the data source (HTTP 403)".to_string(),
        });
        report.missing_range = Some((ts("2024-01-01T01:45:00Z"), ts("2024-01-01T23:30:00Z")));
        report.residual = MissingSet(vec![
            ts("2024-01-01T02:00:00Z"),
            ts("2024-01-01T02:15:00Z"),
            ts("2024-01-01T23:30:00Z"),
        ]);
        report.outcome = Outcome::PartiallyReconciled;
        report
    }

    #[test]
    fn groups_residual_by_local_day() {
        let report = partial_report();
        let days = report.residual_by_day();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].0.to_string(), "2024-01-01");
        assert_eq!(days[0].1, vec!["03:00", "03:15"]);
        // 23:30 UTC is already the next day in Madrid
        assert_eq!(days[1].0.to_string(), "2024-01-02");
        assert_eq!(days[1].1, vec!["00:30"]);
    }

    #[test]
    fn markdown_partial() {
        let md = partial_report().to_markdown();
        assert!(md.starts_with("# Wind Data Missing Report"));
        assert!(md.contains("Run at: 2024-01-02 10:00:00 (Europe/Madrid)"));
        assert!(md.contains("**Outcome: partially reconciled (3 gaps remain, see list)**"));
        assert!(md.contains("- Missing timestamps found: 4"));
        assert!(md.contains("- Filled: 1"));
        assert!(md.contains("- Gaps found from 2024-01-01 02:45 to 2024-01-02 00:30"));
        assert!(md.contains("- Unfilled range: 2024-01-01 03:00 to 2024-01-02 00:30"));
        assert!(md.contains("Authorization failure"));
        assert!(md.contains("AuthError"));
        assert!(md.contains("[2024-01-01 03:00, 2024-01-01 03:30)"));
        assert!(md.contains("Missing times (Europe/Madrid)"));
        assert!(md.contains("03:00, 03:15"));
        assert!(md.contains("3 missing timestamps across 2 days."));
    }

    #[test]
    fn markdown_outcomes() {
        let run_at = ts("2024-01-02T09:00:00Z");
        let report = ReconciliationReport::new(run_at, madrid(), 0);
        let md = report.to_markdown();
        assert!(md.contains("**Outcome: fully reconciled**"));
        assert!(md.contains("All intervals are present."));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let report = ReconciliationReport::storage_failure(run_at, madrid(), &io);
        let md = report.to_markdown();
        assert!(md.contains("failed to reconcile (storage error, no changes made): disk full"));
        assert!(!md.contains("Filled"));

        let report = ReconciliationReport::check_only(
            run_at,
            madrid(),
            MissingSet(vec![ts("2024-01-01T05:00:00Z")]),
        );
        assert_eq!(report.outcome, Outcome::CheckOnly);
        assert_eq!(report.missing_at_start, 1);
        let md = report.to_markdown();
        assert!(md.contains("**Outcome: check only, 1 gaps found, nothing fetched**"));
        assert!(md.contains("- Gaps found from 2024-01-01 06:00 to 2024-01-01 06:00"));
        assert!(!md.contains("partially reconciled"));
        assert!(!md.contains("Filled"));
        assert!(md.contains("06:00"));
    }

    #[test]
    fn write_report_file() -> Result<(), Box<dyn Error>> {
        let dir = test_dir("report_write");
        let report = partial_report();
        let path = report.write(&dir.join("reports"))?;
        assert_eq!(path, dir.join("reports").join("missing_report_2024-01-02.md"));
        assert_eq!(fs::read_to_string(&path)?, report.to_markdown());
        Ok(())
    }
}
