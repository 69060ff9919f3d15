use core::future::Future;
use core::pin::Pin;
use core::task::{ready, Context, Poll};

/// A single launched operation, tagged with the position of its request.
#[derive(Debug)]
#[pin_project::pin_project]
#[must_use = "futures do nothing unless polled or .awaited"]
pub(crate) struct Attempt<F> {
    #[pin]
    future: F,
    index: usize,
}

impl<F> Attempt<F> {
    pub(crate) fn new(index: usize, future: F) -> Self {
        Self { future, index }
    }
}

impl<F: Future> Future for Attempt<F> {
    type Output = (usize, F::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let output = ready!(this.future.poll(cx));
        Poll::Ready((*this.index, output))
    }
}
