//! Cooperative cancellation shared by every operation of one race.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll, Waker};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use slab::Slab;

/// A signal telling in-flight operations their result is no longer needed.
///
/// Every race creates one token and hands a clone of it to each operation it
/// launches. Once a winner is found, the deadline expires, or the race is
/// dropped, the token is cancelled. Cancellation is advisory: executors that
/// watch the token can stop early, executors that don't are simply dropped.
///
/// # Example
///
/// ```rust
/// use request_race::CancelToken;
/// use futures_lite::future::block_on;
///
/// let token = CancelToken::new();
/// let observer = token.clone();
/// assert!(!observer.is_cancelled());
///
/// token.cancel();
/// assert!(observer.is_cancelled());
/// block_on(observer.cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    waiters: Mutex<Slab<Waker>>,
}

impl Inner {
    fn waiters(&self) -> MutexGuard<'_, Slab<Waker>> {
        // A waker slab stays consistent even if a holder panicked.
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token.
    ///
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let waiters = std::mem::take(&mut *self.inner.waiters());
        for (_, waker) in waiters {
            waker.wake();
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Wait until the token is cancelled.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            inner: self.inner.clone(),
            key: None,
        }
    }

    /// Returns a guard which cancels the token when dropped.
    pub(crate) fn drop_guard(&self) -> DropGuard {
        DropGuard {
            token: self.clone(),
        }
    }
}

/// Future returned by [`CancelToken::cancelled`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Cancelled {
    inner: Arc<Inner>,
    key: Option<usize>,
}

impl fmt::Debug for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancelled")
            .field("registered", &self.key.is_some())
            .finish()
    }
}

impl Future for Cancelled {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return Poll::Ready(());
        }

        let inner = self.inner.clone();
        let mut waiters = inner.waiters();

        // `cancel` may have drained the slab between the check above and
        // taking the lock.
        if inner.cancelled.load(Ordering::Acquire) {
            return Poll::Ready(());
        }

        match self.key {
            Some(key) if waiters.contains(key) => waiters[key].clone_from(cx.waker()),
            _ => {
                let key = waiters.insert(cx.waker().clone());
                self.key = Some(key);
            }
        }
        Poll::Pending
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut waiters = self.inner.waiters();
            if waiters.contains(key) {
                waiters.remove(key);
            }
        }
    }
}

/// Cancels its token when dropped.
#[derive(Debug)]
pub(crate) struct DropGuard {
    token: CancelToken,
}

impl DropGuard {
    pub(crate) fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
