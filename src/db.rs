pub mod csv_store;
pub mod duckdb_store;
pub mod parquet_store;
pub mod wind_archive;

use std::{io, path::PathBuf};

use jiff::{tz::TimeZone, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timeseries::series::{Sample, Series};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error("invalid row in {path}: {message}")]
    InvalidRow { path: PathBuf, message: String },
}

/// Full-series persistence.  `load` of a location that was never written
/// returns an empty series.
pub trait SeriesStore {
    fn load(&self) -> Result<Series, StorageError>;
    fn save(&self, series: &Series) -> Result<(), StorageError>;
}

/// A persisted sample, with the local date, time and UTC offset of the
/// reference time zone next to the UTC timestamp.
#[derive(Debug, Serialize, PartialEq)]
pub struct WindRow {
    pub datetime_utc: Timestamp,
    pub date: String,
    pub time: String,
    pub offset: String,
    pub value: Option<f64>,
}

impl WindRow {
    pub fn new(sample: &Sample, tz: &TimeZone) -> WindRow {
        let zoned = sample.timestamp.to_zoned(tz.clone());
        WindRow {
            datetime_utc: sample.timestamp,
            date: zoned.strftime("%Y-%m-%d").to_string(),
            time: zoned.strftime("%H:%M").to_string(),
            offset: zoned.strftime("%:z").to_string(),
            value: sample.value,
        }
    }
}

/// The only columns needed to read a series back.
#[derive(Debug, Deserialize)]
struct StoredRow {
    datetime_utc: Timestamp,
    value: Option<f64>,
}
