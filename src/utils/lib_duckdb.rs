use std::{path::Path, time::Duration};

use duckdb::{AccessMode, Config};
use log::warn;

/// Use this function to open a DuckDB connection.  Another process may hold
/// the file lock for a short while, so back off and try again.
/// Suggested `max_attempts = 8`, `initial_wait = Duration::from_millis(25)`.
pub fn open_with_retry(
    duckdb_path: &Path,
    max_attempts: u32,
    initial_wait: Duration,
    read_only: bool,
) -> Result<duckdb::Connection, duckdb::Error> {
    let mut attempts = 0;
    let mut wait_duration = initial_wait;

    loop {
        let access_mode = if read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        let config = Config::default().access_mode(access_mode)?;
        match duckdb::Connection::open_with_flags(duckdb_path, config) {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                attempts += 1;
                if attempts >= max_attempts {
                    return Err(e);
                }
                warn!(
                    "Retrying DuckDB open of {} after error: {} (attempt {}/{})",
                    duckdb_path.display(),
                    e,
                    attempts,
                    max_attempts
                );
                std::thread::sleep(wait_duration);
                wait_duration *= 2;
            }
        }
    }
}

/// Quote a path for use inside a SQL string literal.
pub fn sql_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use std::{error::Error, path::Path, time::Duration};

    use super::*;
    use crate::utils::test_dir;

    #[test]
    fn open_read_write_then_read_only() -> Result<(), Box<dyn Error>> {
        let dir = test_dir("lib_duckdb");
        let path = dir.join("test.duckdb");
        let conn = open_with_retry(&path, 8, Duration::from_millis(25), false)?;
        conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2);")?;
        drop(conn);

        let conn = open_with_retry(&path, 8, Duration::from_millis(25), true)?;
        let n: i64 = conn.query_row("SELECT count(*) FROM t", [], |row| row.get(0))?;
        assert_eq!(n, 2);
        // a read-only connection rejects writes
        assert!(conn.execute_batch("INSERT INTO t VALUES (3);").is_err());
        drop(conn);

        // reopening read-write on every attempt still works
        let conn = open_with_retry(&path, 8, Duration::from_millis(25), false)?;
        conn.execute_batch("INSERT INTO t VALUES (3);")?;
        Ok(())
    }

    #[test]
    fn quote_paths() {
        assert_eq!(sql_path(Path::new("/data/o'brien/x.parquet")), "/data/o''brien/x.parquet");
    }
}
