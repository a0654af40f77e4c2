use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One observation.  A `None` value is a slot the source reported without a number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: Option<f64>) -> Sample {
        Sample { timestamp, value }
    }
}

/// Counts from a merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Timestamps that were not in the series before.
    pub added: usize,
    /// Existing timestamps whose value changed.
    pub updated: usize,
}

impl MergeStats {
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.updated == 0
    }
}

/// A time series keyed by timestamp, sorted ascending, one value per timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series(BTreeMap<Timestamp, Option<f64>>);

impl Series {
    pub fn new() -> Series {
        Series(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<Sample> {
        self.0.first_key_value().map(|(k, v)| Sample::new(*k, *v))
    }

    pub fn last(&self) -> Option<Sample> {
        self.0.last_key_value().map(|(k, v)| Sample::new(*k, *v))
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.0.contains_key(&timestamp)
    }

    /// The value at this timestamp.  `Some(None)` means the slot exists without a value.
    pub fn get(&self, timestamp: Timestamp) -> Option<Option<f64>> {
        self.0.get(&timestamp).copied()
    }

    /// Insert a sample, replacing any value already stored for the same timestamp.
    pub fn insert(&mut self, sample: Sample) -> Option<Option<f64>> {
        self.0.insert(sample.timestamp, sample.value)
    }

    /// Merge samples into the series, last write wins on duplicate timestamps.
    pub fn merge<I: IntoIterator<Item = Sample>>(&mut self, samples: I) -> MergeStats {
        let mut stats = MergeStats::default();
        for sample in samples {
            match self.insert(sample) {
                None => stats.added += 1,
                Some(old) if old != sample.value => stats.updated += 1,
                Some(_) => {}
            }
        }
        stats
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.0.iter().map(|(k, v)| Sample::new(*k, *v))
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.0.keys().copied()
    }

    /// Samples with a timestamp in `[start, end)`.
    pub fn range(&self, start: Timestamp, end: Timestamp) -> impl Iterator<Item = Sample> + '_ {
        let upper = if end < start { start } else { end };
        self.0.range(start..upper).map(|(k, v)| Sample::new(*k, *v))
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut series = Series::new();
        series.merge(iter);
        series
    }
}
