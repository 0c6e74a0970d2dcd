//! Source stream: a cancellable, lazy, single-pass producer task.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the source channel. One slot keeps the producer at most one item
/// ahead of the workers, so backpressure reaches it almost immediately.
pub const SOURCE_CHANNEL_CAPACITY: usize = 1;

/// Stream a fixed sequence of items until exhausted or cancelled.
///
/// The items are handed to a producer task which offers them one at a time.
/// If `cancel` fires before an item is accepted, production stops and the
/// stream closes without emitting the rest.
///
/// # Example
///
/// ```
/// use fanout_dl::pipeline::source::generate;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main] async fn main() {
/// let cancel = CancellationToken::new();
/// let mut rx = generate(cancel, vec![1, 2, 3]);
/// let mut seen = Vec::new();
/// while let Some(v) = rx.recv().await {
///     seen.push(v);
/// }
/// assert_eq!(seen, vec![1, 2, 3]);
/// # }
/// ```
pub fn generate<T, I>(cancel: CancellationToken, items: I) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    let items = items.into_iter();
    spawn_producer(cancel, move || items)
}

/// Stream the items returned by `factory`, which is invoked once inside the
/// producer task so that slow materialization never blocks the caller.
pub fn generate_from_fn<T, I, F>(cancel: CancellationToken, factory: F) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> I + Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    spawn_producer(cancel, factory)
}

/// Stream `count` items built lazily from their index (`0..count`).
pub fn generate_with<T, F>(cancel: CancellationToken, count: usize, make: F) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    F: FnMut(usize) -> T + Send + 'static,
{
    spawn_producer(cancel, move || (0..count).map(make))
}

fn spawn_producer<T, I, F>(cancel: CancellationToken, factory: F) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> I + Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    let (tx, rx) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut offered = 0usize;
        for item in factory() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(offered, "source cancelled");
                    return;
                }
                sent = tx.send(item) => {
                    if sent.is_err() {
                        // every consumer is gone
                        tracing::debug!(offered, "source receiver dropped");
                        return;
                    }
                    offered += 1;
                }
            }
        }
        tracing::debug!(offered, "source exhausted");
        // tx dropped here closes the stream
    });
    rx
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn drain<T>(mut rx: mpsc::Receiver<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(v) = rx.recv().await {
            out.push(v);
        }
        out
    }

    #[tokio::test]
    async fn generate_preserves_order_and_closes() {
        let rx = generate(CancellationToken::new(), vec!["a", "b", "c"]);
        assert_eq!(drain(rx).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn generate_from_fn_runs_factory_in_producer() {
        let cancel = CancellationToken::new();
        let rx = generate_from_fn(cancel, || {
            std::thread::sleep(Duration::from_millis(20));
            vec!["a".to_string(), "b".to_string()]
        });
        assert_eq!(drain(rx).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn generate_with_builds_items_from_index() {
        let rx = generate_with(CancellationToken::new(), 4, |i| i * 10);
        assert_eq!(drain(rx).await, vec![0, 10, 20, 30]);
    }

    #[tokio::test]
    async fn cancellation_stops_production() {
        let cancel = CancellationToken::new();
        let mut rx = generate(cancel.clone(), 0..1000);

        assert_eq!(rx.recv().await, Some(0));
        cancel.cancel();

        // At most the item already buffered in the channel can still arrive.
        let rest = tokio::time::timeout(Duration::from_secs(1), drain(rx))
            .await
            .expect("source should close after cancellation");
        assert!(rest.len() <= SOURCE_CHANNEL_CAPACITY, "got {rest:?}");
    }

    #[tokio::test]
    async fn cancelled_before_start_emits_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let rx = generate(cancel, vec![1, 2, 3]);
        assert!(drain(rx).await.is_empty());
    }
}
