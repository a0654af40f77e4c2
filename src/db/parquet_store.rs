use std::{fs, path::PathBuf};

use duckdb::Connection;
use jiff::tz::TimeZone;

use crate::{
    db::{
        duckdb_store::{read_relation, write_table},
        SeriesStore, StorageError,
    },
    timeseries::series::Series,
    utils::{
        atomic_file::{commit, tmp_path},
        lib_duckdb::sql_path,
    },
};

/// A series kept in one Parquet file, written and read with an in-memory
/// DuckDB connection.
pub struct ParquetStore {
    pub path: PathBuf,
    pub tz: TimeZone,
}

impl ParquetStore {
    pub fn new(path: PathBuf, tz: TimeZone) -> ParquetStore {
        ParquetStore { path, tz }
    }

    /// Write the series next to `path` without replacing it.  Return the
    /// temporary file to [`commit`].
    pub fn stage(&self, series: &Series) -> Result<PathBuf, StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = tmp_path(&self.path);
        let conn = Connection::open_in_memory()?;
        write_table(&conn, "wind", series, &self.tz)?;
        let copied = conn.execute_batch(&format!(
            "COPY (SELECT * FROM wind ORDER BY datetime_utc) TO '{}' (FORMAT PARQUET);",
            sql_path(&tmp)
        ));
        if let Err(e) = copied {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(tmp)
    }
}

impl SeriesStore for ParquetStore {
    fn load(&self) -> Result<Series, StorageError> {
        if !self.path.exists() {
            return Ok(Series::new());
        }
        let conn = Connection::open_in_memory()?;
        let relation = format!("read_parquet('{}')", sql_path(&self.path));
        read_relation(&conn, &relation, &self.path)
    }

    fn save(&self, series: &Series) -> Result<(), StorageError> {
        let tmp = self.stage(series)?;
        commit(&tmp, &self.path)?;
        Ok(())
    }
}
