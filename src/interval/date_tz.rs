use std::fmt;

use jiff::{civil::Date, ToSpan, Timestamp, Zoned};

use crate::interval::IntervalLike;

/// A calendar day in a given time zone.  Spans 23 or 25 hours on DST days.
#[derive(Clone, Debug, PartialEq)]
pub struct DateTz(Zoned);

impl PartialOrd for DateTz {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl DateTz {
    pub fn containing(zoned: &Zoned) -> Result<Self, jiff::Error> {
        Ok(DateTz(zoned.start_of_day()?))
    }

    pub fn date(&self) -> Date {
        self.0.date()
    }

    pub fn next(&self) -> DateTz {
        DateTz(self.0.saturating_add(1.day()))
    }

    pub fn previous(&self) -> DateTz {
        DateTz(self.0.saturating_sub(1.day()))
    }
}

impl IntervalLike for DateTz {
    fn start(&self) -> Timestamp {
        self.0.timestamp()
    }
    fn end(&self) -> Timestamp {
        self.0.saturating_add(1.day()).timestamp()
    }
}

impl fmt::Display for DateTz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.date())
    }
}
