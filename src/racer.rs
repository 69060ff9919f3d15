use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use std::time::Instant;

use async_io::Timer;

use crate::utils::{Contest, Event};
use crate::{Executor, RaceError, TimeoutError};

/// Sends every request of a batch at once and keeps the first success.
///
/// A `Racer` owns an [`Executor`] and an optional overall deadline. Each call
/// to [`between`](Racer::between) is independent: it creates its own
/// cancellation token and merge set, and drops both when it resolves.
///
/// # Example
///
/// ```rust
/// use async_io::Timer;
/// use request_race::{CancelToken, Racer};
/// use futures_lite::future::block_on;
/// use std::time::Duration;
///
/// // Each request is the latency of a mirror, in milliseconds.
/// let racer = Racer::new(|delay: &u64, _token: CancelToken| {
///     let delay = *delay;
///     async move {
///         Timer::after(Duration::from_millis(delay)).await;
///         Ok::<_, std::io::Error>(delay)
///     }
/// });
///
/// block_on(async {
///     let fastest = racer.between(&[100, 50, 200]).await.unwrap();
///     assert_eq!(fastest, 50);
/// })
/// ```
#[derive(Debug, Clone)]
pub struct Racer<X> {
    executor: X,
    timeout: Option<Duration>,
}

impl<X: Default> Default for Racer<X> {
    fn default() -> Self {
        Self::new(X::default())
    }
}

impl<X> Racer<X> {
    /// Create a racer without an overall deadline.
    pub fn new(executor: X) -> Self {
        Self {
            executor,
            timeout: None,
        }
    }

    /// Create a racer which gives up once `timeout` elapsed without a success.
    pub fn with_timeout(executor: X, timeout: Duration) -> Self {
        Self::new(executor).timeout(timeout)
    }

    /// Set the overall deadline of every race started by this racer.
    ///
    /// The deadline is measured from the first poll of the returned future.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The configured overall deadline, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout
    }

    /// The executor performing each request.
    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// Race all `requests` against each other.
    ///
    /// Resolves to the response of the first request that succeeds. If every
    /// request fails the errors are returned in the order the requests
    /// completed, and if the deadline elapses first a timeout is returned
    /// instead. An empty batch resolves to an empty aggregate error without
    /// calling the executor.
    ///
    /// Nothing is sent until the returned future is polled.
    pub fn between<'a, Req>(&'a self, requests: &'a [Req]) -> Race<'a, X, Req>
    where
        X: Executor<Req>,
    {
        Race {
            executor: &self.executor,
            requests,
            timeout: self.timeout,
            deadline: Timer::never(),
            contest: Contest::new(requests.len()),
            started: None,
            state: State::Idle,
        }
    }
}

/// The internal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Completed,
}

/// A future which waits for the first request to succeed.
///
/// This `struct` is created by the [`between`] method on [`Racer`]. See its
/// documentation for more.
///
/// [`between`]: crate::Racer::between
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Race<'a, X, Req>
where
    X: Executor<Req>,
{
    executor: &'a X,
    requests: &'a [Req],
    timeout: Option<Duration>,
    deadline: Timer,
    contest: Contest<X::Future, X::Error>,
    started: Option<Instant>,
    state: State,
}

impl<X, Req> fmt::Debug for Race<'_, X, Req>
where
    X: Executor<Req>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Race")
            .field("requests", &self.requests.len())
            .field("timeout", &self.timeout)
            .field("contest", &self.contest)
            .field("state", &self.state)
            .finish()
    }
}

impl<X, Req> Race<'_, X, Req>
where
    X: Executor<Req>,
{
    fn start(&mut self) {
        tracing::debug!(
            requests = self.requests.len(),
            timeout = ?self.timeout,
            "starting race"
        );

        self.started = Some(Instant::now());
        if let Some(timeout) = self.timeout {
            self.deadline.set_after(timeout);
        }

        for (index, request) in self.requests.iter().enumerate() {
            let token = self.contest.token().clone();
            let future = self.executor.execute(request, token);
            self.contest.launch(index, future);
        }
        self.state = State::Running;
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|at| at.elapsed()).unwrap_or_default()
    }
}

impl<X, Req> Future for Race<'_, X, Req>
where
    X: Executor<Req>,
{
    type Output = Result<X::Response, RaceError<X::Error>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.state {
            State::Idle => this.start(),
            State::Running => {}
            State::Completed => panic!("future polled after completing"),
        }

        loop {
            match this.contest.poll_event(cx) {
                Poll::Ready(Event::Won { index, response }) => {
                    this.state = State::Completed;
                    tracing::debug!(index, elapsed = ?this.elapsed(), "request won the race");
                    return Poll::Ready(Ok(response));
                }
                Poll::Ready(Event::Failed { index }) => {
                    tracing::trace!(
                        index,
                        failed = this.contest.failed(),
                        launched = this.contest.launched(),
                        "request failed"
                    );
                }
                Poll::Ready(Event::Exhausted) => {
                    this.state = State::Completed;
                    let errors = this.contest.take_errors();
                    tracing::debug!(
                        failed = errors.len(),
                        elapsed = ?this.elapsed(),
                        "every request failed"
                    );
                    return Poll::Ready(Err(RaceError::Aggregate(errors)));
                }
                Poll::Pending => break,
            }
        }

        if let Some(after) = this.timeout {
            if Pin::new(&mut this.deadline).poll(cx).is_ready() {
                this.state = State::Completed;
                this.contest.abandon();
                tracing::debug!(
                    failed = this.contest.failed(),
                    timeout = ?after,
                    "race timed out"
                );
                return Poll::Ready(Err(RaceError::Timeout(TimeoutError { after })));
            }
        }

        Poll::Pending
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CancelToken;
    use futures_lite::future::block_on;
    use std::cell::Cell;
    use std::future;
    use std::io::{Error, ErrorKind};

    #[test]
    fn all_ok() {
        block_on(async {
            let racer = Racer::new(|req: &&'static str, _: CancelToken| {
                future::ready(Ok::<_, Error>(*req))
            });
            let res = racer.between(&["hello", "world"]).await;
            assert!(res.is_ok());
        })
    }

    #[test]
    fn one_err() {
        block_on(async {
            let racer = Racer::new(|req: &Option<&'static str>, _: CancelToken| {
                future::ready(req.ok_or_else(|| Error::new(ErrorKind::Other, "oh no")))
            });
            let res = racer.between(&[None, Some("hello")]).await;
            assert_eq!(res.unwrap(), "hello");
        });
    }

    #[test]
    fn all_err() {
        block_on(async {
            let racer = Racer::new(|msg: &&'static str, _: CancelToken| {
                future::ready(Err::<(), _>(Error::new(ErrorKind::Other, *msg)))
            });
            let res = racer.between(&["oops", "oh no"]).await;
            let errs = res.unwrap_err();
            let errs = errs.aggregate().unwrap();
            assert_eq!(errs.len(), 2);
            assert_eq!(errs[0].to_string(), "oops");
            assert_eq!(errs[1].to_string(), "oh no");
        });
    }

    #[test]
    fn empty_batch_fails_without_executing() {
        block_on(async {
            let calls = Cell::new(0);
            let racer = Racer::with_timeout(
                |_: &u8, _: CancelToken| {
                    calls.set(calls.get() + 1);
                    future::ready(Ok::<_, Error>(()))
                },
                Duration::from_secs(60),
            );
            let res = racer.between(&[]).await;
            assert!(res.unwrap_err().aggregate().unwrap().is_empty());
            assert_eq!(calls.get(), 0);
        });
    }

    #[test]
    fn nothing_runs_until_polled() {
        let calls = Cell::new(0);
        let racer = Racer::new(|_: &u8, _: CancelToken| {
            calls.set(calls.get() + 1);
            future::ready(Ok::<_, Error>(()))
        });
        let race = racer.between(&[1, 2, 3]);
        assert_eq!(calls.get(), 0);
        block_on(race).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn timeout_beats_pending_requests() {
        block_on(async {
            let tokens = std::cell::RefCell::new(vec![]);
            let racer = Racer::with_timeout(
                |fail: &bool, token: CancelToken| {
                    tokens.borrow_mut().push(token);
                    let fail = *fail;
                    async move {
                        if fail {
                            return Err(Error::new(ErrorKind::Other, "refused"));
                        }
                        future::pending::<()>().await;
                        Ok(())
                    }
                },
                Duration::from_millis(20),
            );
            let res = racer.between(&[true, false, false]).await;
            let err = res.unwrap_err();
            assert!(err.is_timeout());
            assert_eq!(tokens.borrow().len(), 3);
            assert!(tokens.borrow().iter().all(CancelToken::is_cancelled));
        });
    }

    #[test]
    fn losers_observe_cancellation() {
        block_on(async {
            let tokens = std::cell::RefCell::new(vec![]);
            let racer = Racer::new(|fast: &bool, token: CancelToken| {
                tokens.borrow_mut().push(token.clone());
                let fast = *fast;
                async move {
                    if !fast {
                        token.cancelled().await;
                    }
                    Ok::<_, Error>(fast)
                }
            });
            assert!(racer.between(&[false, true]).await.unwrap());
            assert!(tokens.borrow().iter().all(CancelToken::is_cancelled));
        });
    }

    #[test]
    fn dropping_the_race_cancels() {
        let token = std::cell::RefCell::new(None);
        let racer = Racer::new(|_: &u8, t: CancelToken| {
            *token.borrow_mut() = Some(t);
            future::pending::<Result<(), Error>>()
        });

        let mut race = Box::pin(racer.between(&[1]));
        assert!(block_on(futures_lite::future::poll_once(race.as_mut())).is_none());
        let token = token.borrow_mut().take().unwrap();
        assert!(!token.is_cancelled());

        drop(race);
        assert!(token.is_cancelled());
    }
}
