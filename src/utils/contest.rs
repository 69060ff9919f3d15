use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_buffered::FuturesUnordered;
use futures_core::Stream;

use super::Attempt;
use crate::cancel::DropGuard;
use crate::{AggregateError, CancelToken};

/// What the merge set produced on one poll.
#[derive(Debug)]
pub(crate) enum Event<T> {
    /// An operation succeeded. Every other operation has been abandoned.
    Won { index: usize, response: T },
    /// An operation failed and its error was recorded.
    Failed { index: usize },
    /// Every launched operation failed.
    Exhausted,
}

/// The merge point shared by both races.
///
/// Holds the in-flight operations of one race call together with the errors
/// of the ones that already failed. Outcomes are consumed one at a time, and
/// once a winner is found the remaining operations are dropped and the
/// cancellation token is signalled.
pub(crate) struct Contest<Fut, E> {
    attempts: FuturesUnordered<Attempt<Fut>>,
    errors: Vec<E>,
    launched: usize,
    guard: DropGuard,
}

// Operations are pinned inside the merge set's own allocation, and errors are
// never pinned at all.
impl<Fut, E> Unpin for Contest<Fut, E> {}

impl<Fut, E> fmt::Debug for Contest<Fut, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contest")
            .field("launched", &self.launched)
            .field("failed", &self.errors.len())
            .field("token", self.guard.token())
            .finish()
    }
}

impl<Fut, T, E> Contest<Fut, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            attempts: FuturesUnordered::new(),
            errors: Vec::with_capacity(capacity),
            launched: 0,
            guard: CancelToken::new().drop_guard(),
        }
    }

    /// The token handed to every operation of this race.
    pub(crate) fn token(&self) -> &CancelToken {
        self.guard.token()
    }

    pub(crate) fn launched(&self) -> usize {
        self.launched
    }

    pub(crate) fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Add an operation to the merge set. It starts running on the next poll.
    pub(crate) fn launch(&mut self, index: usize, future: Fut) {
        self.attempts.push(Attempt::new(index, future));
        self.launched += 1;
    }

    /// Wait for the next outcome.
    pub(crate) fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Event<T>> {
        if self.errors.len() == self.launched {
            return Poll::Ready(Event::Exhausted);
        }

        match Pin::new(&mut self.attempts).poll_next(cx) {
            Poll::Ready(Some((index, Ok(response)))) => {
                self.abandon();
                Poll::Ready(Event::Won { index, response })
            }
            Poll::Ready(Some((index, Err(err)))) => {
                self.errors.push(err);
                Poll::Ready(Event::Failed { index })
            }
            // Only reachable if the counters drifted from the merge set.
            Poll::Ready(None) => Poll::Ready(Event::Exhausted),
            Poll::Pending => Poll::Pending,
        }
    }

    /// Cancel the token and drop every operation still in flight.
    pub(crate) fn abandon(&mut self) {
        self.guard.token().cancel();
        self.attempts = FuturesUnordered::new();
    }

    /// Take the collected errors, in completion order.
    pub(crate) fn take_errors(&mut self) -> AggregateError<E> {
        self.abandon();
        AggregateError::new(std::mem::take(&mut self.errors))
    }
}
