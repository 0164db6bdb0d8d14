//! Bounded task queue with non-blocking submission
//!
//! The queue is a fixed-capacity FIFO hand-off buffer between producers
//! and the worker pool. Submission never blocks: a full queue rejects the
//! task and hands it back, so the producer decides whether to retry or
//! drop. Bounded memory over unbounded buffering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::info;

use taskmill_core::Task;

/// Errors from queue submission
///
/// Both variants hand the rejected task back so the producer can retry or
/// drop it without having kept a copy.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Queue is at capacity
    #[error("queue full, please try again shortly")]
    Full(Task),

    /// Queue has been closed; no further submissions are accepted
    #[error("queue closed")]
    Closed(Task),
}

impl QueueError {
    /// Recover the task that was not enqueued
    pub fn into_task(self) -> Task {
        match self {
            QueueError::Full(task) | QueueError::Closed(task) => task,
        }
    }
}

/// Snapshot of queue occupancy
///
/// Approximate by construction: concurrent submits and receives may move
/// the depth while it is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Tasks currently buffered
    pub depth: usize,
    /// Fixed capacity
    pub capacity: usize,
}

/// Bounded FIFO hand-off buffer between producers and workers
///
/// # Example
///
/// ```ignore
/// let queue = TaskQueue::new(64);
///
/// let task = Task::new(TaskType::IoBound, json!({"path": "/tmp/in"}))?;
/// match queue.submit(task) {
///     Ok(()) => {}
///     Err(QueueError::Full(task)) => retry_later(task),
///     Err(QueueError::Closed(_)) => return,
/// }
///
/// // Workers consume through a shared source
/// let source = queue.task_source();
/// ```
#[derive(Debug)]
pub struct TaskQueue {
    tx: std::sync::Mutex<Option<mpsc::Sender<Task>>>,
    source: TaskSource,
    capacity: usize,
}

impl TaskQueue {
    /// Create a queue with the given capacity (clamped to at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            source: TaskSource {
                receiver: Arc::new(tokio::sync::Mutex::new(rx)),
                depth: Arc::new(AtomicUsize::new(0)),
            },
            capacity,
        }
    }

    /// Enqueue a task without blocking
    ///
    /// Returns [`QueueError::Full`] when the queue is at capacity and
    /// [`QueueError::Closed`] after [`TaskQueue::close`]; both hand the
    /// task back to the caller.
    pub fn submit(&self, task: Task) -> Result<(), QueueError> {
        let guard = self.tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            return Err(QueueError::Closed(task));
        };

        // Counted before the send so a concurrent receive can never
        // decrement past zero.
        self.source.depth.fetch_add(1, Ordering::Relaxed);

        match tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                self.source.depth.fetch_sub(1, Ordering::Relaxed);
                Err(QueueError::Full(task))
            }
            Err(TrySendError::Closed(task)) => {
                self.source.depth.fetch_sub(1, Ordering::Relaxed);
                Err(QueueError::Closed(task))
            }
        }
    }

    /// Shared read-only consumer handle
    ///
    /// Every clone drains the same buffer; whichever worker receives first
    /// gets the task. Tasks cannot be enqueued through this handle.
    pub fn task_source(&self) -> TaskSource {
        self.source.clone()
    }

    /// Close the queue
    ///
    /// Buffered tasks remain receivable until drained; further submissions
    /// fail with [`QueueError::Closed`]. Closing an already-closed queue is
    /// a no-op.
    pub fn close(&self) {
        let mut guard = self.tx.lock().unwrap();
        if guard.take().is_some() {
            info!(capacity = self.capacity, "task queue closed");
        }
    }

    /// Whether [`TaskQueue::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }

    /// Occupancy snapshot for observability
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            depth: self.source.depth.load(Ordering::Relaxed),
            capacity: self.capacity,
        }
    }

    /// Fixed capacity of the queue
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Read-only consumer handle over the queue's buffer
///
/// Cloneable; all clones share one FIFO buffer, so a pool of workers can
/// receive from it concurrently and each task is delivered to exactly one
/// of them.
#[derive(Debug, Clone)]
pub struct TaskSource {
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    depth: Arc<AtomicUsize>,
}

impl TaskSource {
    /// Receive the next task in arrival order
    ///
    /// Returns `None` once the queue is closed and drained. Safe to use
    /// inside `select!`: if another branch wins, no task is taken.
    pub async fn recv(&self) -> Option<Task> {
        let mut receiver = self.receiver.lock().await;
        let task = receiver.recv().await;

        if task.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }

        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskmill_core::TaskType;
    use tokio_test::assert_ok;

    fn sample_task() -> Task {
        Task::new(TaskType::CpuIntensive, json!({"n": 1})).unwrap()
    }

    #[test]
    fn test_submit_within_capacity_reports_depth() {
        let queue = TaskQueue::new(4);

        for expected_depth in 1..=3 {
            assert_ok!(queue.submit(sample_task()));
            assert_eq!(queue.status().depth, expected_depth);
        }

        assert_eq!(queue.status().capacity, 4);
    }

    #[test]
    fn test_submit_to_full_queue_rejects_and_keeps_depth() {
        let queue = TaskQueue::new(2);
        assert_ok!(queue.submit(sample_task()));
        assert_ok!(queue.submit(sample_task()));

        let rejected = sample_task();
        let rejected_id = rejected.id.clone();

        let err = queue.submit(rejected).unwrap_err();
        assert!(matches!(err, QueueError::Full(_)));
        assert_eq!(err.into_task().id, rejected_id);
        assert_eq!(queue.status().depth, 2);
    }

    #[test]
    fn test_submit_after_close_is_rejected() {
        let queue = TaskQueue::new(2);
        queue.close();

        let err = queue.submit(sample_task()).unwrap_err();
        assert!(matches!(err, QueueError::Closed(_)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let queue = TaskQueue::new(2);
        assert!(!queue.is_closed());

        queue.close();
        queue.close();

        assert!(queue.is_closed());
    }

    #[test]
    fn test_capacity_clamped_to_one() {
        let queue = TaskQueue::new(0);
        assert_eq!(queue.capacity(), 1);

        assert_ok!(queue.submit(sample_task()));
        assert!(matches!(
            queue.submit(sample_task()),
            Err(QueueError::Full(_))
        ));
    }

    #[tokio::test]
    async fn test_recv_preserves_arrival_order() {
        let queue = TaskQueue::new(8);
        let mut submitted_ids = Vec::new();

        for _ in 0..3 {
            let task = sample_task();
            submitted_ids.push(task.id.clone());
            queue.submit(task).unwrap();
        }

        let source = queue.task_source();
        for expected_id in submitted_ids {
            let task = source.recv().await.unwrap();
            assert_eq!(task.id, expected_id);
        }

        assert_eq!(queue.status().depth, 0);
    }

    #[tokio::test]
    async fn test_recv_drains_then_ends_after_close() {
        let queue = TaskQueue::new(4);
        queue.submit(sample_task()).unwrap();
        queue.submit(sample_task()).unwrap();
        queue.close();

        let source = queue.task_source();
        assert!(source.recv().await.is_some());
        assert!(source.recv().await.is_some());
        assert!(source.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cloned_sources_share_one_buffer() {
        let queue = TaskQueue::new(4);
        queue.submit(sample_task()).unwrap();
        queue.submit(sample_task()).unwrap();

        let first = queue.task_source();
        let second = queue.task_source();

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(queue.status().depth, 0);
    }
}
