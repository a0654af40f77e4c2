use std::{fs, path::PathBuf};

use jiff::{civil::Date, tz::TimeZone};
use log::info;

use crate::{
    db::{
        csv_store::CsvStore, duckdb_store::DuckDbStore, parquet_store::ParquetStore, SeriesStore,
        StorageError,
    },
    timeseries::series::{MergeStats, Sample, Series},
    utils::atomic_file::{commit, tmp_path},
};

/// The wind generation archive on disk.
///
/// ```text
/// {base_dir}/data/{YYYY-MM-DD}.csv           one file per local day
/// {base_dir}/database/full_wind_data.csv     the full series, source of truth
/// {base_dir}/database/full_wind_data.parquet
/// {base_dir}/database/full_wind_data.duckdb  table `wind`
/// {base_dir}/Raw/{YYYY}/*.json.gz            raw API responses
/// {base_dir}/reports/                        gap reports
/// ```
pub struct WindArchive {
    pub base_dir: PathBuf,
    pub tz: TimeZone,
}

impl WindArchive {
    pub const NAME: &'static str = "full_wind_data";
    pub const TABLE: &'static str = "wind";

    pub fn new(base_dir: PathBuf, tz: TimeZone) -> WindArchive {
        WindArchive { base_dir, tz }
    }

    pub fn csv_store(&self) -> CsvStore {
        CsvStore::new(self.database_file("csv"), self.tz.clone())
    }

    pub fn parquet_store(&self) -> ParquetStore {
        ParquetStore::new(self.database_file("parquet"), self.tz.clone())
    }

    pub fn duckdb_store(&self) -> DuckDbStore {
        DuckDbStore::new(self.database_file("duckdb"), WindArchive::TABLE, self.tz.clone())
    }

    /// Return the csv filename for the local day.  Does not check if the file exists.
    pub fn day_file(&self, date: Date) -> PathBuf {
        self.base_dir.join("data").join(format!("{}.csv", date))
    }

    pub fn day_store(&self, date: Date) -> CsvStore {
        CsvStore::new(self.day_file(date), self.tz.clone())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.base_dir.join("Raw")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.base_dir.join("reports")
    }

    fn database_file(&self, extension: &str) -> PathBuf {
        self.base_dir
            .join("database")
            .join(format!("{}.{}", WindArchive::NAME, extension))
    }

    /// Merge new samples into the archive and rewrite it if anything changed.
    pub fn append(&self, samples: Vec<Sample>) -> Result<MergeStats, StorageError> {
        let mut series = self.load()?;
        let stats = series.merge(samples);
        if stats.is_unchanged() {
            info!("No new rows to append.");
            return Ok(stats);
        }
        self.save(&series)?;
        info!(
            "Appended {} new rows, updated {} rows (now {} rows total)",
            stats.added,
            stats.updated,
            series.len()
        );
        Ok(stats)
    }
}

impl SeriesStore for WindArchive {
    /// The csv file is the source of truth.
    fn load(&self) -> Result<Series, StorageError> {
        self.csv_store().load()
    }

    /// Stage the csv and parquet files, replace the DuckDB table, then rename
    /// parquet and finally the csv.  The csv only changes once everything
    /// else went through, so after a failure `load` still returns the old
    /// series.
    fn save(&self, series: &Series) -> Result<(), StorageError> {
        let csv = self.csv_store();
        let parquet = self.parquet_store();

        let csv_tmp = csv.stage(series)?;
        let staged = parquet.stage(series).and_then(|parquet_tmp| {
            self.duckdb_store().save(series)?;
            commit(&parquet_tmp, &parquet.path)?;
            Ok(())
        });
        if let Err(e) = staged {
            let _ = fs::remove_file(&csv_tmp);
            let _ = fs::remove_file(tmp_path(&parquet.path));
            return Err(e);
        }
        commit(&csv_tmp, &csv.path)?;
        info!(
            "Saved {} rows to {}",
            series.len(),
            self.base_dir.join("database").display()
        );
        Ok(())
    }
}
