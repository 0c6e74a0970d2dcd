//! Worker pool: a fixed number of tasks pulling from one shared source stream,
//! applying the transform, and pushing into the merge stream.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::admission::{Admission, AdmissionPermit, AdmissionScope};
use super::barrier::{BarrierGuard, CompletionBarrier};

/// Source receiver shared by every worker. The lock is held only while a
/// worker waits for its next item.
pub(crate) type SharedInput<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Parameters for spawning a worker pool
pub(crate) struct WorkerPoolParams<T, U, F> {
    /// Number of workers to spawn
    pub workers: usize,
    /// Source stream shared by all workers
    pub input: SharedInput<T>,
    /// Merge stream sender; each worker gets its own clone
    pub output: mpsc::Sender<U>,
    /// Optional admission control and the scope its slots are held for
    pub admission: Option<(Admission, AdmissionScope)>,
    /// Barrier every worker registers with before it is spawned
    pub barrier: CompletionBarrier,
    /// Run-wide cancellation
    pub cancel: CancellationToken,
    /// Per-item transform
    pub transform: Arc<F>,
}

/// Why a worker stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// Source stream closed
    InputClosed,
    /// Cancellation observed at a suspension point
    Cancelled,
    /// Nobody is reading the merge stream any more
    OutputClosed,
}

/// Everything a worker owns. Field order matters: the merge sender is dropped
/// before the barrier guard reports the exit.
struct Worker<T, U, F> {
    id: usize,
    input: SharedInput<T>,
    output: mpsc::Sender<U>,
    admission: Option<(Admission, AdmissionScope)>,
    cancel: CancellationToken,
    transform: Arc<F>,
    _exit: BarrierGuard,
}

/// Spawn `params.workers` workers. Each one is registered with the barrier
/// before its task is launched.
pub(crate) fn spawn_workers<T, U, F, Fut>(params: WorkerPoolParams<T, U, F>)
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = U> + Send + 'static,
{
    let WorkerPoolParams {
        workers,
        input,
        output,
        admission,
        barrier,
        cancel,
        transform,
    } = params;

    for id in 0..workers {
        let worker = Worker {
            id,
            input: Arc::clone(&input),
            output: output.clone(),
            admission: admission.clone(),
            cancel: cancel.clone(),
            transform: Arc::clone(&transform),
            _exit: barrier.register(),
        };
        tokio::spawn(worker.run());
    }
}

impl<T, U, F, Fut> Worker<T, U, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = U> + Send + 'static,
{
    async fn run(self) -> WorkerExit {
        tracing::debug!(worker_id = self.id, "worker started");

        let mut processed = 0usize;
        let exit = self.process(&mut processed).await;

        tracing::debug!(worker_id = self.id, processed, reason = ?exit, "worker exited");
        exit
        // self dropped here: sender first, then the barrier guard
    }

    async fn process(&self, processed: &mut usize) -> WorkerExit {
        // Held for the worker's whole life when scoped per worker.
        let _lifetime_slot = match self.admission_for(AdmissionScope::PerWorker) {
            Some(admission) => match admission.acquire_or_cancel(&self.cancel).await {
                Some(permit) => Some(permit),
                None => return WorkerExit::Cancelled,
            },
            None => None,
        };

        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return WorkerExit::Cancelled,
                item = next_item(&self.input) => match item {
                    Some(item) => item,
                    None => return WorkerExit::InputClosed,
                },
            };

            let slot: Option<AdmissionPermit> = match self.admission_for(AdmissionScope::PerItem) {
                Some(admission) => match admission.acquire_or_cancel(&self.cancel).await {
                    Some(permit) => Some(permit),
                    // in-flight item is dropped, not requeued
                    None => return WorkerExit::Cancelled,
                },
                None => None,
            };

            let result = (self.transform)(item).await;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return WorkerExit::Cancelled,
                sent = self.output.send(result) => {
                    if sent.is_err() {
                        return WorkerExit::OutputClosed;
                    }
                }
            }
            drop(slot);
            *processed += 1;
        }
    }

    fn admission_for(&self, scope: AdmissionScope) -> Option<&Admission> {
        match &self.admission {
            Some((admission, configured)) if *configured == scope => Some(admission),
            _ => None,
        }
    }
}

async fn next_item<T>(input: &SharedInput<T>) -> Option<T> {
    input.lock().await.recv().await
}
