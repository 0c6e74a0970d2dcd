//! Bounded-concurrency fan-out/fan-in pipeline.
//!
//! ```text
//!  source ──► worker 0 ─┐
//!         ├─► worker 1 ─┼─► merge stream ──► consumer
//!         └─► worker N ─┘
//!             (each optionally gated by an admission slot)
//! ```
//!
//! [`fan_out`] wires the stages together and returns the merge stream right
//! away; everything else runs on background tasks. A single
//! [`CancellationToken`] is observed by every stage. The merge stream is closed
//! by a watcher task, and only after the [`CompletionBarrier`] reports that
//! every worker has exited.
//!
//! # Example
//!
//! ```
//! use fanout_dl::pipeline::{FanOutOptions, fan_out, source::generate};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main] async fn main() {
//! let cancel = CancellationToken::new();
//! let input = generate(cancel.clone(), vec![1, 2, 3, 4, 5]);
//! let mut out = fan_out(cancel, input, FanOutOptions::new(3), |v: i32| async move { v * 2 });
//!
//! let mut doubled = Vec::new();
//! while let Some(v) = out.recv().await {
//!     doubled.push(v);
//! }
//! doubled.sort();
//! assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
//! # }
//! ```

pub mod admission;
pub mod barrier;
pub mod source;
mod worker;


pub use admission::{Admission, AdmissionPermit, AdmissionScope};
pub use barrier::{BarrierGuard, CompletionBarrier};

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use worker::{WorkerPoolParams, spawn_workers};

/// Default capacity of the merge stream: workers block on send until the
/// consumer has taken the previous result.
pub const MERGE_CHANNEL_CAPACITY: usize = 1;

/// Pool sizing and admission settings for one [`fan_out`] call.
///
/// Worker count and admission capacity are independent on purpose: the pool
/// can be larger than the real concurrency budget while the semaphore caps
/// how many workers are doing the expensive part at once.
#[derive(Clone, Debug)]
pub struct FanOutOptions {
    /// Number of worker tasks
    pub workers: usize,
    /// Optional admission control shared by all workers
    pub admission: Option<Admission>,
    /// How long a worker holds an admission slot
    pub scope: AdmissionScope,
    /// Capacity of the merge stream
    pub output_capacity: usize,
}

impl FanOutOptions {
    /// `workers` tasks, no admission control
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            admission: None,
            scope: AdmissionScope::default(),
            output_capacity: MERGE_CHANNEL_CAPACITY,
        }
    }

    /// Gate the workers with `admission`
    #[must_use]
    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Choose per-item or per-worker slot holding
    #[must_use]
    pub fn with_scope(mut self, scope: AdmissionScope) -> Self {
        self.scope = scope;
        self
    }

    /// Buffer up to `capacity` results in the merge stream
    #[must_use]
    pub fn with_output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }
}

impl From<&PipelineConfig> for FanOutOptions {
    fn from(config: &PipelineConfig) -> Self {
        let options = FanOutOptions::new(config.workers)
            .with_scope(config.admission_scope)
            .with_output_capacity(config.output_capacity);
        match config.admission_capacity {
            Some(capacity) => options.with_admission(Admission::new(capacity)),
            None => options,
        }
    }
}

/// Handle to a running pipeline: the merge stream plus its coordination state.
#[derive(Debug)]
pub struct FanOut<U> {
    results: mpsc::Receiver<U>,
    barrier: CompletionBarrier,
    admission: Option<Admission>,
}

impl<U> FanOut<U> {
    /// Next result, or `None` once every worker has exited and the stream is closed
    pub async fn recv(&mut self) -> Option<U> {
        self.results.recv().await
    }

    /// Barrier tracking the workers of this run
    pub fn barrier(&self) -> &CompletionBarrier {
        &self.barrier
    }

    /// Admission semaphore of this run, if any
    pub fn admission(&self) -> Option<&Admission> {
        self.admission.as_ref()
    }

    /// Consume the handle as a [`futures::Stream`]
    pub fn into_stream(self) -> ReceiverStream<U> {
        ReceiverStream::new(self.results)
    }

    /// Consume the handle, keeping only the raw receiver
    pub fn into_receiver(self) -> mpsc::Receiver<U> {
        self.results
    }
}

/// Fan `input` out to `options.workers` workers running `transform`, and fan
/// their results back into one stream.
///
/// Returns immediately. Results arrive in completion order, not submission
/// order. Must be called from within a tokio runtime.
pub fn fan_out<T, U, F, Fut>(
    cancel: CancellationToken,
    input: mpsc::Receiver<T>,
    options: FanOutOptions,
    transform: F,
) -> FanOut<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = U> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(options.output_capacity.max(1));
    let barrier = CompletionBarrier::new();

    tracing::debug!(
        workers = options.workers,
        admission_capacity = options.admission.as_ref().map(Admission::capacity),
        scope = ?options.scope,
        "starting fan-out"
    );

    spawn_workers(WorkerPoolParams {
        workers: options.workers,
        input: Arc::new(Mutex::new(input)),
        output: tx.clone(),
        admission: options.admission.clone().map(|a| (a, options.scope)),
        barrier: barrier.clone(),
        cancel,
        transform: Arc::new(transform),
    });

    tokio::spawn(close_when_quiescent(barrier.clone(), tx));

    FanOut {
        results: rx,
        barrier,
        admission: options.admission,
    }
}

/// The one place the merge stream is closed: once all workers are gone, the
/// last sender is dropped.
async fn close_when_quiescent<U>(barrier: CompletionBarrier, tx: mpsc::Sender<U>) {
    barrier.wait().await;
    tracing::debug!(exited = barrier.exited(), "all workers exited, closing merge stream");
    drop(tx);
}
