//! The capability that performs a single request.

use core::future::Future;

use crate::CancelToken;

/// Performs one request and reports its outcome.
///
/// An executor is shared by every operation of a race, so `execute` takes
/// `&self` and may be invoked several times before any returned future is
/// polled. The returned future must not borrow the request; executors copy or
/// clone whatever part of the request they need.
///
/// The token is cancelled once the race no longer needs the result. Watching it
/// is optional, since losing futures are dropped by the race either way.
///
/// All operations of a race are polled from the task awaiting it. An executor
/// doing blocking or CPU-heavy work must spawn that work elsewhere, or it holds
/// back every other operation.
///
/// Closures of the form `Fn(&Req, CancelToken) -> impl Future<Output =
/// Result<T, E>>` are executors, which makes test doubles a one-liner.
///
/// # Example
///
/// ```rust
/// use request_race::{CancelToken, Racer};
/// use futures_lite::future::block_on;
///
/// let racer = Racer::new(|mirror: &&str, _token: CancelToken| {
///     let mirror = mirror.to_string();
///     async move {
///         if mirror.starts_with("down") {
///             Err("unreachable")
///         } else {
///             Ok(mirror)
///         }
///     }
/// });
///
/// block_on(async {
///     let winner = racer.between(&["down.example", "up.example"]).await;
///     assert_eq!(winner.unwrap(), "up.example");
/// })
/// ```
pub trait Executor<Req: ?Sized> {
    /// The value produced by a successful request.
    type Response;

    /// The error produced by a failed request.
    type Error;

    /// Which kind of future are we turning this into?
    type Future: Future<Output = Result<Self::Response, Self::Error>>;

    /// Start executing `request`.
    fn execute(&self, request: &Req, token: CancelToken) -> Self::Future;
}

impl<Req, F, Fut, T, E> Executor<Req> for F
where
    Req: ?Sized,
    F: Fn(&Req, CancelToken) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    type Response = T;
    type Error = E;
    type Future = Fut;

    fn execute(&self, request: &Req, token: CancelToken) -> Self::Future {
        (self)(request, token)
    }
}
