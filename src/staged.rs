use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use std::time::Instant;

use async_io::Timer;

use crate::utils::{Contest, Event};
use crate::{AggregateError, Executor};

/// Gives a primary request a head start before racing the others.
///
/// The primary runs alone for the warm-up window. If it succeeds in that
/// window it wins outright and no other request is ever sent. If it fails, or
/// the window closes while it is still pending, the secondaries are launched
/// and the race continues between all of them, the primary included.
///
/// There is no overall deadline at this level. Wrap the returned future in a
/// timeout to bound the whole call.
///
/// # Example
///
/// ```rust
/// use async_io::Timer;
/// use request_race::{CancelToken, StagedRacer};
/// use futures_lite::future::block_on;
/// use std::time::Duration;
///
/// let racer = StagedRacer::new(
///     |delay: &u64, _token: CancelToken| {
///         let delay = *delay;
///         async move {
///             Timer::after(Duration::from_millis(delay)).await;
///             Ok::<_, std::io::Error>(delay)
///         }
///     },
///     Duration::from_millis(20),
/// );
///
/// block_on(async {
///     // The primary is too slow, so the secondary gets launched and wins.
///     let winner = racer.first_then_start(&500, &[10]).await.unwrap();
///     assert_eq!(winner, 10);
/// })
/// ```
#[derive(Debug, Clone)]
pub struct StagedRacer<X> {
    executor: X,
    warm_up: Duration,
}

impl<X> StagedRacer<X> {
    /// Create a staged racer with the given warm-up window.
    pub fn new(executor: X, warm_up: Duration) -> Self {
        Self { executor, warm_up }
    }

    /// How long the primary runs alone.
    pub fn warm_up(&self) -> Duration {
        self.warm_up
    }

    /// The executor performing each request.
    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// Send `primary`, and launch `secondaries` only if it turns out slow or
    /// failed.
    ///
    /// Resolves to the first successful response. If every launched request
    /// fails the error contains the primary's error followed by the errors of
    /// the secondaries.
    ///
    /// Nothing is sent until the returned future is polled.
    pub fn first_then_start<'a, Req>(
        &'a self,
        primary: &'a Req,
        secondaries: &'a [Req],
    ) -> Staged<'a, X, Req>
    where
        X: Executor<Req>,
    {
        Staged {
            executor: &self.executor,
            primary,
            secondaries,
            warm_up: self.warm_up,
            timer: Timer::never(),
            contest: Contest::new(secondaries.len() + 1),
            started: None,
            phase: Phase::Idle,
        }
    }
}

/// The internal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Not polled yet.
    Idle,
    /// Only the primary is in flight.
    WarmingUp,
    /// The secondaries were launched.
    Racing,
    Completed,
}

/// A future which gives a primary request a head start.
///
/// This `struct` is created by the [`first_then_start`] method on
/// [`StagedRacer`]. See its documentation for more.
///
/// [`first_then_start`]: crate::StagedRacer::first_then_start
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Staged<'a, X, Req>
where
    X: Executor<Req>,
{
    executor: &'a X,
    primary: &'a Req,
    secondaries: &'a [Req],
    warm_up: Duration,
    timer: Timer,
    contest: Contest<X::Future, X::Error>,
    started: Option<Instant>,
    phase: Phase,
}

impl<X, Req> fmt::Debug for Staged<'_, X, Req>
where
    X: Executor<Req>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Staged")
            .field("secondaries", &self.secondaries.len())
            .field("warm_up", &self.warm_up)
            .field("contest", &self.contest)
            .field("phase", &self.phase)
            .finish()
    }
}

impl<X, Req> Staged<'_, X, Req>
where
    X: Executor<Req>,
{
    fn start(&mut self) {
        tracing::debug!(
            secondaries = self.secondaries.len(),
            warm_up = ?self.warm_up,
            "starting primary request"
        );

        self.started = Some(Instant::now());
        self.timer.set_after(self.warm_up);

        let token = self.contest.token().clone();
        let future = self.executor.execute(self.primary, token);
        self.contest.launch(0, future);
        self.phase = Phase::WarmingUp;
    }

    fn launch_secondaries(&mut self) {
        tracing::debug!(
            secondaries = self.secondaries.len(),
            primary_failed = self.contest.failed() > 0,
            elapsed = ?self.elapsed(),
            "launching secondary requests"
        );

        for (index, request) in self.secondaries.iter().enumerate() {
            let token = self.contest.token().clone();
            let future = self.executor.execute(request, token);
            self.contest.launch(index + 1, future);
        }
        self.timer = Timer::never();
        self.phase = Phase::Racing;
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|at| at.elapsed()).unwrap_or_default()
    }
}

impl<X, Req> Future for Staged<'_, X, Req>
where
    X: Executor<Req>,
{
    type Output = Result<X::Response, AggregateError<X::Error>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.phase {
            Phase::Idle => this.start(),
            Phase::WarmingUp | Phase::Racing => {}
            Phase::Completed => panic!("future polled after completing"),
        }

        loop {
            match this.contest.poll_event(cx) {
                Poll::Ready(Event::Won { index, response }) => {
                    this.phase = Phase::Completed;
                    tracing::debug!(index, elapsed = ?this.elapsed(), "request won the race");
                    return Poll::Ready(Ok(response));
                }
                Poll::Ready(Event::Failed { index }) => {
                    tracing::trace!(index, failed = this.contest.failed(), "request failed");
                    if this.phase == Phase::WarmingUp {
                        this.launch_secondaries();
                    }
                    continue;
                }
                Poll::Ready(Event::Exhausted) => {
                    this.phase = Phase::Completed;
                    let errors = this.contest.take_errors();
                    tracing::debug!(
                        failed = errors.len(),
                        elapsed = ?this.elapsed(),
                        "every request failed"
                    );
                    return Poll::Ready(Err(errors));
                }
                Poll::Pending => {}
            }

            if this.phase == Phase::WarmingUp && Pin::new(&mut this.timer).poll(cx).is_ready() {
                // Poll the merge set again so the new operations get a waker.
                this.launch_secondaries();
                continue;
            }

            return Poll::Pending;
        }
    }
}
