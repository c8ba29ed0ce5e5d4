//! Rendezvous handoff of freed connections to waiting dialers.
//!
//! A value offered on a [`Handoff`] is delivered only if some task is waiting
//! at that moment. Offers never block and never queue: with no waiter the
//! value comes straight back to the caller, who tears it down instead.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub struct Handoff<T> {
    waiters: Mutex<VecDeque<oneshot::Sender<T>>>,
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Handoff<T> {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<oneshot::Sender<T>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register interest in the next offered value.
    ///
    /// The registration lasts until the returned [`Waiter`] resolves or is dropped.
    pub fn wait(&self) -> Waiter<T> {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.lock();
        // Drop registrations whose waiter already gave up.
        waiters.retain(|tx| !tx.is_closed());
        waiters.push_back(tx);
        Waiter { rx }
    }

    /// Offer `value` to one waiting task without blocking.
    ///
    /// Returns `Err(value)` if nobody is waiting.
    pub fn offer(&self, mut value: T) -> Result<(), T> {
        loop {
            // Never hold the lock across `send`: a failed send may drop `T`.
            let next = self.lock().pop_front();
            let Some(tx) = next else {
                return Err(value);
            };
            match tx.send(value) {
                Ok(()) => return Ok(()),
                Err(returned) => value = returned,
            }
        }
    }

    /// Number of tasks currently waiting for an offer.
    pub fn waiters(&self) -> usize {
        self.lock().iter().filter(|tx| !tx.is_closed()).count()
    }
}

/// Future resolving to a value handed over by [`Handoff::offer`].
///
/// Resolves to `None` only if the owning [`Handoff`] was dropped.
#[derive(Debug)]
pub struct Waiter<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Waiter<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}
