use core::fmt;
use core::ops::{Deref, DerefMut};
use core::time::Duration;
use std::error::Error;

/// A collection of errors, one per failed operation.
///
/// Errors are stored in the order the operations completed, not the order the
/// requests were submitted in. For a [`StagedRacer`](crate::StagedRacer) whose
/// primary failed during the warm-up, the primary's error comes first.
#[repr(transparent)]
pub struct AggregateError<E> {
    pub(crate) inner: Vec<E>,
}

impl<E> AggregateError<E> {
    pub(crate) fn new(inner: Vec<E>) -> Self {
        Self { inner }
    }

    /// Consume the error, returning the underlying errors in completion order.
    ///
    /// A staged race that failed its primary during the warm-up lists the
    /// primary's error first.
    pub fn into_inner(self) -> Vec<E> {
        self.inner
    }
}

impl<E: fmt::Display> fmt::Debug for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}:")?;

        for (i, err) in self.inner.iter().enumerate() {
            writeln!(f, "- Error {}: {err}", i + 1)?;
        }

        Ok(())
    }
}

impl<E: fmt::Display> fmt::Display for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.inner.len())
    }
}

/// Derefs to the errors, in completion order.
impl<E> Deref for AggregateError<E> {
    type Target = Vec<E>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<E> DerefMut for AggregateError<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<E> IntoIterator for AggregateError<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<E: Error> Error for AggregateError<E> {}

/// The overall deadline of a race elapsed before any operation succeeded.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no request succeeded within {after:?}")]
pub struct TimeoutError {
    /// The configured deadline.
    pub after: Duration,
}

/// The reasons a [`Racer`](crate::Racer) can fail.
#[derive(thiserror::Error)]
pub enum RaceError<E> {
    /// Every operation failed before the deadline.
    #[error("every request failed: {0}")]
    Aggregate(AggregateError<E>),

    /// The deadline elapsed first. Failures seen until then are discarded.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl<E> RaceError<E> {
    /// Returns the aggregated errors, if every operation failed.
    pub fn aggregate(&self) -> Option<&AggregateError<E>> {
        match self {
            RaceError::Aggregate(errors) => Some(errors),
            RaceError::Timeout(_) => None,
        }
    }

    /// Returns `true` if the deadline elapsed before any success.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RaceError::Timeout(_))
    }
}

impl<E: fmt::Display> fmt::Debug for RaceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceError::Aggregate(errors) => f.debug_tuple("Aggregate").field(errors).finish(),
            RaceError::Timeout(timeout) => f.debug_tuple("Timeout").field(timeout).finish(),
        }
    }
}

impl<E> From<AggregateError<E>> for RaceError<E> {
    fn from(errors: AggregateError<E>) -> Self {
        RaceError::Aggregate(errors)
    }
}
