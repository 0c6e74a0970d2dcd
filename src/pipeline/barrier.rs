//! Completion barrier: tracks running workers and becomes quiescent once every
//! registered worker has exited.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Counts live participants. Register *before* spawning a task so that
/// [`wait`](Self::wait) can never observe zero while a task is still starting.
#[derive(Clone, Debug, Default)]
pub struct CompletionBarrier {
    inner: Arc<BarrierInner>,
}

#[derive(Debug, Default)]
struct BarrierInner {
    running: AtomicUsize,
    registered: AtomicUsize,
    exited: AtomicUsize,
    quiescent: Notify,
}

impl CompletionBarrier {
    /// Create an empty barrier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one participant. The returned guard reports its exit exactly
    /// once, when dropped.
    pub fn register(&self) -> BarrierGuard {
        self.inner.running.fetch_add(1, Ordering::AcqRel);
        self.inner.registered.fetch_add(1, Ordering::Relaxed);
        BarrierGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Participants that have registered and not yet exited
    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Total participants ever registered
    pub fn registered(&self) -> usize {
        self.inner.registered.load(Ordering::Relaxed)
    }

    /// Total exits reported
    pub fn exited(&self) -> usize {
        self.inner.exited.load(Ordering::Relaxed)
    }

    /// Wait until no participant is running.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.quiescent.notified();
            tokio::pin!(notified);
            // Enable before checking so a notify between the check and the await is not lost.
            notified.as_mut().enable();
            if self.running() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Proof of registration with a [`CompletionBarrier`].
#[derive(Debug)]
#[must_use = "dropping the guard reports the participant as exited"]
pub struct BarrierGuard {
    inner: Arc<BarrierInner>,
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        self.inner.exited.fetch_add(1, Ordering::Relaxed);
        if self.inner.running.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.quiescent.notify_waiters();
        }
    }
}
