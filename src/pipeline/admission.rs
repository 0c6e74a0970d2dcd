//! Admission control: a counting semaphore that bounds how many units of work
//! may be "in flight" at once, independently of how many workers exist.
//!
//! Slots are handed out as [`AdmissionPermit`] guards. A permit returns its slot
//! when dropped, so release happens on every exit path of the protected section
//! (normal completion, error, cancellation, or unwinding) without the caller
//! having to remember it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// How long a worker holds an admission slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionScope {
    /// A slot is taken per item, around the transform and the result send.
    /// Bounds concurrently executing transforms.
    #[default]
    PerItem,
    /// A slot is taken once when the worker starts and held until it exits.
    /// Bounds concurrently running workers; the remaining workers wait at
    /// acquire until an early one finishes.
    PerWorker,
}

/// Shared admission semaphore with a fixed capacity.
///
/// Cloning is cheap and every clone refers to the same slots.
#[derive(Clone, Debug)]
pub struct Admission {
    inner: Arc<AdmissionInner>,
}

#[derive(Debug)]
struct AdmissionInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    peak: AtomicUsize,
}

impl Admission {
    /// Create a semaphore with `capacity` slots. A capacity of zero would
    /// deadlock every caller, so it is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(AdmissionInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait until a slot is free and reserve it.
    pub async fn acquire(&self) -> AdmissionPermit {
        match Arc::clone(&self.inner.semaphore).acquire_owned().await {
            Ok(permit) => self.track(permit),
            // The semaphore is owned here and never closed.
            Err(_) => unreachable!("admission semaphore closed"),
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up as soon as `cancel` fires.
    ///
    /// Returns `None` if cancellation won the race. No slot is held in that case.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Option<AdmissionPermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.acquire() => Some(permit),
        }
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Slots currently held
    pub fn holders(&self) -> usize {
        self.inner.capacity - self.available()
    }

    /// Highest number of simultaneous holders observed so far
    pub fn peak_holders(&self) -> usize {
        self.inner.peak.load(Ordering::Relaxed)
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> AdmissionPermit {
        self.inner.peak.fetch_max(self.holders(), Ordering::Relaxed);
        AdmissionPermit { _permit: permit }
    }
}

/// A reserved admission slot, returned to the semaphore on drop.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    /// Return the slot now. Equivalent to dropping the permit.
    pub fn release(self) {}
}
