use jiff::Timestamp;

use crate::interval::granularity::Granularity;

/// Lazily yield every timestamp `start, start + g, ...` up to and including `end`.
#[derive(Debug, Clone)]
pub struct ExpectedGrid {
    next: Option<Timestamp>,
    end: Timestamp,
    granularity: Granularity,
}

impl ExpectedGrid {
    pub fn new(start: Timestamp, end: Timestamp, granularity: Granularity) -> ExpectedGrid {
        ExpectedGrid {
            next: Some(start),
            end,
            granularity,
        }
    }
}

impl Iterator for ExpectedGrid {
    type Item = Timestamp;

    fn next(&mut self) -> Option<Timestamp> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = current.checked_add(self.granularity.duration()).ok();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_of_end() {
        let start: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let end: Timestamp = "2024-01-01T01:00:00Z".parse().unwrap();
        let grid: Vec<Timestamp> = ExpectedGrid::new(start, end, Granularity::QUARTER_HOUR).collect();
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[4], end);

        // end falls between two slots
        let end: Timestamp = "2024-01-01T01:07:00Z".parse().unwrap();
        assert_eq!(ExpectedGrid::new(start, end, Granularity::QUARTER_HOUR).count(), 5);

        // end before start
        assert_eq!(ExpectedGrid::new(end, start, Granularity::QUARTER_HOUR).count(), 0);
    }
}
