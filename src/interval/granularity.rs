use std::fmt::{self, Formatter};

use jiff::SignedDuration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid granularity {0}: must be positive and divide one hour evenly")]
pub struct GranularityError(pub SignedDuration);

/// The fixed step between two consecutive samples of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Granularity(SignedDuration);

impl Granularity {
    pub const QUARTER_HOUR: Granularity = Granularity(SignedDuration::from_mins(15));

    pub fn new(step: SignedDuration) -> Result<Granularity, GranularityError> {
        let secs = step.as_secs();
        if !step.is_positive() || step.subsec_nanos() != 0 || secs == 0 || 3600 % secs != 0 {
            return Err(GranularityError(step));
        }
        Ok(Granularity(step))
    }

    pub fn from_minutes(minutes: i64) -> Result<Granularity, GranularityError> {
        Granularity::new(SignedDuration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn duration(&self) -> SignedDuration {
        self.0
    }

    pub fn minutes(&self) -> i64 {
        self.0.as_secs() / 60
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::QUARTER_HOUR
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        if secs % 60 == 0 {
            write!(f, "{}min", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}
