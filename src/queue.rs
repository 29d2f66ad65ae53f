//! Strict-FIFO, single-concurrency task queue.
//!
//! The queue serializes calls to the rate-limited upstream API: admission is
//! unbounded and immediate, but exactly one admitted task runs at any time
//! and tasks reach their terminal state in admission order. Backpressure is
//! user-visible queue-depth reporting, not rejection.
//!
//! After every task settles (completes or fails) the queue broadcasts a
//! [`TaskSettled`] marker to all current subscribers and immediately advances
//! to the next pending task. The marker carries no task identity; callers
//! subscribe before enqueueing and stop listening once their own task
//! resolves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::{Error, Result};

/// Buffer size of the settle broadcast channel; a subscriber that falls
/// further behind observes a `Lagged` error carrying the missed count
const SETTLED_CHANNEL_CAPACITY: usize = 1000;

/// Marker broadcast after every task reaches a terminal state
#[derive(Clone, Copy, Debug)]
pub struct TaskSettled;

/// Work admitted to the queue: the boxed task plus the channel its result
/// is delivered on
struct QueuedTask<T> {
    work: BoxFuture<'static, Result<T>>,
    result_tx: oneshot::Sender<Result<T>>,
}

/// Single-worker FIFO task queue
///
/// Dropping the queue stops admission; already-admitted tasks still drain to
/// completion on the worker before it exits.
pub struct TaskQueue<T> {
    job_tx: mpsc::UnboundedSender<QueuedTask<T>>,
    depth: Arc<AtomicUsize>,
    settled_tx: broadcast::Sender<TaskSettled>,
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Create the queue and spawn its worker loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<QueuedTask<T>>();
        let (settled_tx, _rx) = broadcast::channel(SETTLED_CHANNEL_CAPACITY);
        let depth = Arc::new(AtomicUsize::new(0));

        let worker_depth = Arc::clone(&depth);
        let worker_settled = settled_tx.clone();
        tokio::spawn(async move {
            // one task at a time: the next recv happens only after the
            // previous task reached a terminal state
            while let Some(task) = job_rx.recv().await {
                let outcome = task.work.await;
                if let Err(ref e) = outcome {
                    tracing::debug!(error = %e, "queued task failed");
                }
                worker_depth.fetch_sub(1, Ordering::SeqCst);
                // the caller may have stopped waiting; that's fine
                let _ = task.result_tx.send(outcome);
                // no receivers is fine too
                let _ = worker_settled.send(TaskSettled);
            }
            tracing::debug!("task queue worker exiting");
        });

        Self {
            job_tx,
            depth,
            settled_tx,
        }
    }

    /// Admit a task
    ///
    /// Always succeeds immediately regardless of queue depth. The returned
    /// handle resolves with the task's result once the single worker has run
    /// it; tasks run strictly in admission order.
    pub fn enqueue<F>(&self, work: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let task = QueuedTask {
            work: Box::pin(work),
            result_tx,
        };

        self.depth.fetch_add(1, Ordering::SeqCst);
        if let Err(send_err) = self.job_tx.send(task) {
            // worker already gone — hand the rejection straight to the caller
            self.depth.fetch_sub(1, Ordering::SeqCst);
            let _ = send_err.0.result_tx.send(Err(Error::QueueClosed));
        }

        TaskHandle { result_rx }
    }

    /// Number of tasks not yet settled (pending + running)
    ///
    /// Non-blocking; used for "N tasks ahead" messaging.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Whether no task is pending or running
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to settle notifications
    ///
    /// Each receiver independently observes every settle that happens after
    /// the call. Subscribing or dropping a receiver from inside a
    /// notification handler never drops or duplicates notifications for
    /// other subscribers.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskSettled> {
        self.settled_tx.subscribe()
    }
}

impl<T: Send + 'static> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Future side of an admitted task
///
/// Resolves with the task's own result, or [`Error::QueueClosed`] if the
/// worker went away before running it.
pub struct TaskHandle<T> {
    result_rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.result_rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::QueueClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
