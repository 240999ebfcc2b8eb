//! Contains a one-shot [StartBarrier], used to hold a set of concurrent callers
//! until they are all released by a single signal.

use tokio::sync::watch;

/// Error returned by [`StartWaiter::wait`] when the [StartBarrier]
/// has been dropped without ever being released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("start barrier was dropped before being released")]
pub struct AbandonedError;

/// A one-shot gate: every [StartWaiter] blocks until [`StartBarrier::release`]
/// is called, after which all of them proceed.
///
/// Releasing consumes the barrier, so the signal is sent exactly once
/// and cannot be taken back.
#[derive(Debug)]
pub struct StartBarrier {
    sender: watch::Sender<bool>,
}

impl Default for StartBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl StartBarrier {
    /// Creates a new, closed barrier.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Returns a new handle that can be used to wait for the release signal.
    #[must_use]
    pub fn waiter(&self) -> StartWaiter {
        StartWaiter {
            receiver: self.sender.subscribe(),
        }
    }

    /// Opens the barrier, waking up every current and future [StartWaiter].
    pub fn release(self) {
        // Waiters hold their own receivers, so the value stays observable
        // after the sender is dropped.
        self.sender.send_replace(true);
    }
}

/// Handle used to wait on a [StartBarrier].
#[derive(Debug, Clone)]
pub struct StartWaiter {
    receiver: watch::Receiver<bool>,
}

impl StartWaiter {
    /// Waits until the [StartBarrier] is released.
    ///
    /// Returns immediately if the barrier has already been released.
    pub async fn wait(mut self) -> Result<(), AbandonedError> {
        self.receiver
            .wait_for(|released| *released)
            .await
            .map_err(|_| AbandonedError)?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn waiters_are_held_until_released() {
        let barrier = StartBarrier::new();
        let started = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let waiter = barrier.waiter();
                let started = Arc::clone(&started);

                tokio::spawn(async move {
                    waiter.wait().await.expect("barrier should be released");
                    started.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(0, started.load(Ordering::SeqCst));

        barrier.release();

        for handle in handles {
            handle.await.expect("waiter task should not panic");
        }

        assert_eq!(3, started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn waiters_pass_through_after_release() {
        let barrier = StartBarrier::new();
        let waiter = barrier.waiter();
        let late_waiter = waiter.clone();

        barrier.release();

        assert_eq!(Ok(()), waiter.wait().await);
        assert_eq!(Ok(()), late_waiter.wait().await);
    }

    #[tokio::test]
    async fn dropping_the_barrier_abandons_waiters() {
        let barrier = StartBarrier::new();
        let waiter = barrier.waiter();

        drop(barrier);

        assert_eq!(Err(AbandonedError), waiter.wait().await);
    }
}
