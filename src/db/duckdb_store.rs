use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use duckdb::{params, Connection};
use jiff::{tz::TimeZone, Timestamp};
use log::info;

use crate::{
    db::{SeriesStore, StorageError, WindRow},
    timeseries::series::{Sample, Series},
    utils::lib_duckdb::open_with_retry,
};

/// A series kept in one table of a DuckDB file.  Every save replaces the
/// table inside a single transaction.
pub struct DuckDbStore {
    pub duckdb_path: PathBuf,
    pub table: String,
    pub tz: TimeZone,
}

/// Create (or replace) `table` and fill it with the series.
pub fn write_table(
    conn: &Connection,
    table: &str,
    series: &Series,
    tz: &TimeZone,
) -> Result<(), StorageError> {
    conn.execute_batch(&format!(
        r#"
CREATE OR REPLACE TABLE {table} (
    datetime_utc TIMESTAMP NOT NULL,
    "date" VARCHAR NOT NULL,
    "time" VARCHAR NOT NULL,
    "offset" VARCHAR NOT NULL,
    value DOUBLE,
);"#
    ))?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} VALUES (epoch_ms(?::BIGINT), ?, ?, ?, ?)"
    ))?;
    for sample in series.iter() {
        let row = WindRow::new(&sample, tz);
        stmt.execute(params![
            row.datetime_utc.as_millisecond(),
            row.date,
            row.time,
            row.offset,
            row.value
        ])?;
    }
    Ok(())
}

/// Read `datetime_utc` and `value` from any relation, e.g. a table name or a
/// `read_parquet(...)` call.
pub fn read_relation(
    conn: &Connection,
    relation: &str,
    source: &Path,
) -> Result<Series, StorageError> {
    let query = format!(
        r#"
SELECT epoch_ms(datetime_utc::TIMESTAMP), value
FROM {relation}
ORDER BY datetime_utc;
    "#
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<usize, i64>(0)?, row.get::<usize, Option<f64>>(1)?))
    })?;
    let mut series = Series::new();
    for row in rows {
        let (ms, value) = row?;
        let timestamp = Timestamp::from_millisecond(ms).map_err(|e| StorageError::InvalidRow {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
        series.insert(Sample::new(timestamp, value));
    }
    Ok(series)
}

impl DuckDbStore {
    pub fn new(duckdb_path: PathBuf, table: &str, tz: TimeZone) -> DuckDbStore {
        DuckDbStore {
            duckdb_path,
            table: table.to_string(),
            tz,
        }
    }

    fn table_exists(&self, conn: &Connection) -> Result<bool, StorageError> {
        let n: i64 = conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            params![self.table],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}

impl SeriesStore for DuckDbStore {
    fn load(&self) -> Result<Series, StorageError> {
        if !self.duckdb_path.exists() {
            return Ok(Series::new());
        }
        let conn = open_with_retry(
            &self.duckdb_path,
            8,
            Duration::from_millis(25),
            true,
        )?;
        if !self.table_exists(&conn)? {
            return Ok(Series::new());
        }
        read_relation(&conn, &self.table, &self.duckdb_path)
    }

    fn save(&self, series: &Series) -> Result<(), StorageError> {
        if let Some(dir) = self.duckdb_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut conn = open_with_retry(
            &self.duckdb_path,
            8,
            Duration::from_millis(25),
            false,
        )?;
        let tx = conn.transaction()?;
        write_table(&tx, &self.table, series, &self.tz)?;
        tx.commit()?;
        info!(
            "{} rows written to table {} in {}",
            series.len(),
            self.table,
            self.duckdb_path.display()
        );
        Ok(())
    }
}
