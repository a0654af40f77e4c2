pub mod chunk;
pub mod date_tz;
pub mod granularity;
pub mod month_tz;

use jiff::Timestamp;

/// A half-open time interval `[start, end)` on the UTC timeline.
pub trait IntervalLike {
    fn start(&self) -> Timestamp;
    fn end(&self) -> Timestamp;
    fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start() && ts < self.end()
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::IntervalLike;

    struct Window(Timestamp, Timestamp);

    impl IntervalLike for Window {
        fn start(&self) -> Timestamp {
            self.0
        }
        fn end(&self) -> Timestamp {
            self.1
        }
    }

    #[test]
    fn contains_is_half_open() {
        let start: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let end: Timestamp = "2024-01-01T01:00:00Z".parse().unwrap();
        let window = Window(start, end);
        assert!(window.contains(start));
        assert!(window.contains("2024-01-01T00:45:00Z".parse().unwrap()));
        assert!(!window.contains(end));
    }
}
