use std::path::PathBuf;

use jiff::tz::TimeZone;

use crate::{
    db::{SeriesStore, StorageError, StoredRow, WindRow},
    timeseries::series::{Sample, Series},
    utils::atomic_file::{commit, stage},
};

/// A series kept in one comma separated file with a header row.
pub struct CsvStore {
    pub path: PathBuf,
    pub tz: TimeZone,
}

impl CsvStore {
    pub fn new(path: PathBuf, tz: TimeZone) -> CsvStore {
        CsvStore { path, tz }
    }

    /// Write the series next to `path` without replacing it.  Return the
    /// temporary file to [`commit`](crate::utils::atomic_file::commit).
    pub fn stage(&self, series: &Series) -> Result<PathBuf, StorageError> {
        stage(&self.path, |out| -> Result<(), StorageError> {
            let mut wtr = csv::Writer::from_writer(out);
            for sample in series.iter() {
                wtr.serialize(WindRow::new(&sample, &self.tz))?;
            }
            wtr.flush()?;
            Ok(())
        })
    }
}

impl SeriesStore for CsvStore {
    fn load(&self) -> Result<Series, StorageError> {
        let mut series = Series::new();
        if !self.path.exists() {
            return Ok(series);
        }
        let mut rdr = csv::Reader::from_path(&self.path)?;
        for row in rdr.deserialize::<StoredRow>() {
            let row = row?;
            series.insert(Sample::new(row.datetime_utc, row.value));
        }
        Ok(series)
    }

    fn save(&self, series: &Series) -> Result<(), StorageError> {
        let tmp = self.stage(series)?;
        commit(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fs};

    use jiff::{tz::TimeZone, SignedDuration, Timestamp};

    use super::*;
    use crate::utils::test_dir;

    fn sample_series() -> Series {
        let start: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        (0..8)
            .map(|i| {
                let value = if i == 3 { None } else { Some(1000.0 + i as f64 * 0.5) };
                Sample::new(start + SignedDuration::from_mins(15 * i), value)
            })
            .collect()
    }

    #[test]
    fn missing_file_is_empty() -> Result<(), Box<dyn Error>> {
        let dir = test_dir("csv_missing");
        let store = CsvStore::new(dir.join("nothing.csv"), TimeZone::UTC);
        assert!(store.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn save_then_load() -> Result<(), Box<dyn Error>> {
        let dir = test_dir("csv_roundtrip");
        let madrid = TimeZone::get("Europe/Madrid")?;
        let store = CsvStore::new(dir.join("database").join("wind.csv"), madrid);
        let series = sample_series();
        store.save(&series)?;

        let content = fs::read_to_string(&store.path)?;
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("datetime_utc,date,time,offset,value"));
        assert_eq!(
            lines.next(),
            Some("2024-01-01T00:00:00Z,2024-01-01,01:00,+01:00,1000.0")
        );
        assert!(content.contains("2024-01-01T00:45:00Z,2024-01-01,01:45,+01:00,\n"));

        let loaded = store.load()?;
        assert_eq!(loaded, series);

        // saving what was loaded does not change the file
        store.save(&loaded)?;
        assert_eq!(fs::read_to_string(&store.path)?, content);
        Ok(())
    }

    #[test]
    fn load_extra_columns_and_duplicates() -> Result<(), Box<dyn Error>> {
        let dir = test_dir("csv_extra");
        let path = dir.join("wind.csv");
        fs::write(
            &path,
            "geo_id,datetime_utc,value\n8741,2024-01-01T00:15:00Z,2.0\n8741,2024-01-01T00:00:00Z,1.0\n8741,2024-01-01T00:15:00Z,3.0\n",
        )?;
        let series = CsvStore::new(path, TimeZone::UTC).load()?;
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().unwrap().value, Some(1.0));
        assert_eq!(series.last().unwrap().value, Some(3.0));
        Ok(())
    }

    #[test]
    fn bad_row_is_an_error() -> Result<(), Box<dyn Error>> {
        let dir = test_dir("csv_bad");
        let path = dir.join("wind.csv");
        fs::write(&path, "datetime_utc,value\nnot a date,2.0\n")?;
        let res = CsvStore::new(path, TimeZone::UTC).load();
        assert!(matches!(res, Err(StorageError::Csv(_))));
        Ok(())
    }
}
