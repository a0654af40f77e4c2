use std::fmt::{self, Formatter};

use jiff::{tz::TimeZone, SignedDuration, Timestamp};

use crate::interval::{granularity::Granularity, IntervalLike};

/// A contiguous `[start, end)` range requested from the data source in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchChunk {
    start: Timestamp,
    end: Timestamp,
}

impl FetchChunk {
    /// Return `None` if the range is empty.
    pub fn new(start: Timestamp, end: Timestamp) -> Option<FetchChunk> {
        if end <= start {
            return None;
        }
        Some(FetchChunk { start, end })
    }

    /// The chunk covering the slots `first, first + g, ..., last`.
    pub fn covering(first: Timestamp, last: Timestamp, granularity: Granularity) -> FetchChunk {
        FetchChunk {
            start: first,
            end: last.checked_add(granularity.duration()).unwrap_or(Timestamp::MAX),
        }
    }

    pub fn of<I: IntervalLike>(interval: &I) -> Option<FetchChunk> {
        FetchChunk::new(interval.start(), interval.end())
    }

    /// Number of grid slots inside the chunk.
    pub fn slots(&self, granularity: Granularity) -> i64 {
        let span = self.end.duration_since(self.start).as_secs();
        span / granularity.duration().as_secs()
    }

    /// Split the chunk into consecutive pieces no longer than `max_span`.
    /// A span shorter than one slot is treated as one slot.
    pub fn split(&self, max_span: SignedDuration, granularity: Granularity) -> Vec<FetchChunk> {
        let step = if max_span < granularity.duration() {
            granularity.duration()
        } else {
            max_span
        };
        let mut out = Vec::new();
        let mut start = self.start;
        while start < self.end {
            let end = match start.checked_add(step) {
                Ok(e) if e < self.end => e,
                _ => self.end,
            };
            out.push(FetchChunk { start, end });
            start = end;
        }
        out
    }

    /// Format the chunk in a given time zone, e.g. `[2024-01-01 02:00, 2024-01-01 02:30)`.
    pub fn to_string_tz(&self, tz: &TimeZone) -> String {
        format!(
            "[{}, {})",
            self.start.to_zoned(tz.clone()).strftime("%Y-%m-%d %H:%M"),
            self.end.to_zoned(tz.clone()).strftime("%Y-%m-%d %H:%M"),
        )
    }
}

impl IntervalLike for FetchChunk {
    fn start(&self) -> Timestamp {
        self.start
    }
    fn end(&self) -> Timestamp {
        self.end
    }
}

impl fmt::Display for FetchChunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use jiff::{tz::TimeZone, SignedDuration, Timestamp};

    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn covering_adds_one_slot() {
        let chunk = FetchChunk::covering(
            ts("2024-01-01T02:00:00Z"),
            ts("2024-01-01T02:15:00Z"),
            Granularity::QUARTER_HOUR,
        );
        assert_eq!(chunk.start(), ts("2024-01-01T02:00:00Z"));
        assert_eq!(chunk.end(), ts("2024-01-01T02:30:00Z"));
        assert_eq!(chunk.slots(Granularity::QUARTER_HOUR), 2);
        assert_eq!(
            chunk.to_string(),
            "[2024-01-01T02:00:00Z, 2024-01-01T02:30:00Z)"
        );
        let madrid = TimeZone::get("Europe/Madrid").unwrap();
        assert_eq!(
            chunk.to_string_tz(&madrid),
            "[2024-01-01 03:00, 2024-01-01 03:30)"
        );
    }

    #[test]
    fn empty_range_is_rejected() {
        let t = ts("2024-01-01T02:00:00Z");
        assert!(FetchChunk::new(t, t).is_none());
    }

    #[test]
    fn split_long_chunk() {
        let chunk = FetchChunk::new(ts("2024-01-01T00:00:00Z"), ts("2024-01-03T12:00:00Z")).unwrap();
        let pieces = chunk.split(SignedDuration::from_hours(24), Granularity::QUARTER_HOUR);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].end(), ts("2024-01-02T00:00:00Z"));
        assert_eq!(pieces[1].end(), ts("2024-01-03T00:00:00Z"));
        assert_eq!(pieces[2].end(), ts("2024-01-03T12:00:00Z"));

        // shorter than the limit, left alone
        let pieces = chunk.split(SignedDuration::from_hours(24 * 31), Granularity::QUARTER_HOUR);
        assert_eq!(pieces, vec![chunk]);
    }
}
