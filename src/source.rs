pub mod esios;

use std::fmt::{self, Display};

use jiff::Timestamp;
use thiserror::Error;

use crate::{interval::granularity::Granularity, timeseries::series::Sample};

#[derive(Error, Debug)]
pub enum FetchError {
    /// The source rejected the credential.  Retrying will not help.
    #[error("authorization rejected by the data source (HTTP {status})")]
    Auth { status: u16 },
    /// Network failure, timeout, server error or unreadable payload.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Auth { .. } => FailureKind::Auth,
            FetchError::Transient(_) => FailureKind::Transient,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Auth,
    Transient,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FailureKind::*;
        match self {
            Auth => write!(f, "AuthError"),
            Transient => write!(f, "TransientError"),
        }
    }
}

/// A remote source of samples.
pub trait DataSource {
    /// Get the samples for `[start, end)`.  An empty vector is a valid answer.
    fn fetch(
        &self,
        start: Timestamp,
        end: Timestamp,
        granularity: Granularity,
    ) -> Result<Vec<Sample>, FetchError>;
}

#[cfg(test)]
pub mod fake {
    use std::cell::RefCell;

    use jiff::Timestamp;

    use super::*;
    use crate::timeseries::series::Series;

    /// Serve samples from memory, or fail every request.
    pub struct FakeSource {
        pub data: Series,
        pub error: Option<fn() -> FetchError>,
        pub calls: RefCell<Vec<(Timestamp, Timestamp)>>,
    }

    impl FakeSource {
        pub fn new(data: Series) -> FakeSource {
            FakeSource {
                data,
                error: None,
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn failing(error: fn() -> FetchError) -> FakeSource {
            FakeSource {
                data: Series::new(),
                error: Some(error),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl DataSource for FakeSource {
        fn fetch(
            &self,
            start: Timestamp,
            end: Timestamp,
            _granularity: Granularity,
        ) -> Result<Vec<Sample>, FetchError> {
            self.calls.borrow_mut().push((start, end));
            if let Some(make_error) = self.error {
                return Err(make_error());
            }
            Ok(self.data.range(start, end).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        let e = FetchError::Auth { status: 403 };
        assert_eq!(e.kind(), FailureKind::Auth);
        assert_eq!(e.to_string(), "authorization rejected by the data source (HTTP 403)");
        assert_eq!(FetchError::Transient("HTTP 502".into()).kind(), FailureKind::Transient);
        assert_eq!(FailureKind::Auth.to_string(), "AuthError");
    }
}
