use std::fmt;

use jiff::{ToSpan, Timestamp, Zoned};

use crate::interval::IntervalLike;

#[derive(PartialEq, Debug, Clone, Hash, Eq, PartialOrd, Ord)]
pub struct MonthTz(Zoned);

impl MonthTz {
    pub fn containing(zoned: &Zoned) -> Result<Self, jiff::Error> {
        let start = zoned
            .date()
            .first_of_month()
            .to_zoned(zoned.time_zone().clone())?;
        Ok(MonthTz(start))
    }

    pub fn next(&self) -> MonthTz {
        MonthTz(self.0.saturating_add(1.month()))
    }

    /// All months from this one up to the one containing `end`, inclusive.
    pub fn up_to(&self, end: Timestamp) -> Vec<MonthTz> {
        let mut out = Vec::new();
        let mut current = self.clone();
        while current.start() <= end {
            let next = current.next();
            out.push(current);
            current = next;
        }
        out
    }
}

impl IntervalLike for MonthTz {
    fn start(&self) -> Timestamp {
        self.0.timestamp()
    }
    fn end(&self) -> Timestamp {
        self.0.saturating_add(1.month()).timestamp()
    }
}

impl fmt::Display for MonthTz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.strftime("%Y-%m"))
    }
}

#[cfg(test)]
mod tests {
    use jiff::Zoned;

    use super::*;

    #[test]
    fn test_month() {
        let zoned = "2023-12-15T10:00:00[Europe/Madrid]".parse::<Zoned>().unwrap();
        let month = MonthTz::containing(&zoned).unwrap();
        assert_eq!(month.to_string(), "2023-12");
        assert_eq!(month.start(), "2023-11-30T23:00:00Z".parse().unwrap());
        assert_eq!(month.end(), "2023-12-31T23:00:00Z".parse().unwrap());
        assert_eq!(month.next().to_string(), "2024-01");

        let months = month.up_to("2024-02-10T00:00:00Z".parse().unwrap());
        let names: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(names, vec!["2023-12", "2024-01", "2024-02"]);
    }
}
