// Run Handle - caller-facing outcome of one submitted unit

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::{panic, thread};
use tokio::sync::oneshot;

/// Resolves to exactly what the submitted task produced
///
/// The unit is already scheduled when the handle is returned; dropping the
/// handle discards the result but does not withdraw the unit.
///
/// # Panics
/// - Re-raises the task's panic in the awaiting caller
/// - Panics if the runtime dropped the unit before it settled (runtime shutdown)
#[must_use = "the unit runs either way; call `detach` to discard its result explicitly"]
pub struct RunHandle<T> {
    rx: oneshot::Receiver<thread::Result<T>>,
}

impl<T> RunHandle<T> {
    pub(super) fn new(rx: oneshot::Receiver<thread::Result<T>>) -> Self {
        Self { rx }
    }

    /// Let the unit run without waiting for its result
    pub fn detach(self) {}
}

impl<T> Future for RunHandle<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(Ok(value)) => Poll::Ready(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => panic!("exclusive unit was dropped before it settled"),
        }
    }
}

impl<T> fmt::Debug for RunHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle").finish_non_exhaustive()
    }
}
