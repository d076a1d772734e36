//! Tri-state result for best-effort operations.

use crate::{BuildpackError, Result};

/// Result of an operation that may degrade instead of failing.
///
/// `Degraded` carries a warning that was logged but did not abort the run;
/// `Fatal` carries the error that must abort it.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Degraded(String),
    Fatal(BuildpackError),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Fatal(_))
    }

    /// The warning message of a degraded outcome.
    pub fn warning(&self) -> Option<&str> {
        match self {
            Outcome::Degraded(message) => Some(message),
            _ => None,
        }
    }

    /// Collapse into a `Result`, treating a degraded outcome as `None`.
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            Outcome::Ok(value) => Ok(Some(value)),
            Outcome::Degraded(_) => Ok(None),
            Outcome::Fatal(err) => Err(err),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(err) => Outcome::Fatal(err),
        }
    }
}
