//! Handler execution context

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use taskmill_core::{Task, TaskResult, TaskStatus};

/// Context handed to a handler for one task execution
///
/// Carries the executing worker's identity, the dispatch start time for
/// duration measurement, and a cooperative cancellation flag. The engine
/// flips the flag when the task's timeout elapses.
///
/// # Example
///
/// ```ignore
/// async fn execute(&self, ctx: &HandlerContext, task: &Task) -> TaskResult {
///     for chunk in chunks {
///         if ctx.is_cancelled() {
///             let mut result = ctx.new_result(task, TaskStatus::Failed);
///             result.set_error("cancelled");
///             return result;
///         }
///         process(chunk).await;
///     }
///
///     ctx.new_result(task, TaskStatus::Completed)
/// }
/// ```
#[derive(Debug)]
pub struct HandlerContext {
    /// Id of the worker executing the task
    pub worker_id: String,

    /// Wall-clock time at dispatch
    pub started_at: DateTime<Utc>,

    /// Monotonic start instant for duration measurement
    started: Instant,

    /// Cancellation flag shared with the supervisory timer
    cancelled: Arc<AtomicBool>,
}

impl HandlerContext {
    /// Create a context for one dispatch
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            started_at: Utc::now(),
            started: Instant::now(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle that can cancel this execution
    pub fn cancellation_handle(&self) -> CancellationHandle {
        CancellationHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Future that resolves when cancellation is requested
    ///
    /// Useful in select! patterns:
    ///
    /// ```ignore
    /// tokio::select! {
    ///     output = do_work() => { ... }
    ///     _ = ctx.cancelled() => { ... }
    /// }
    /// ```
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Time spent executing so far
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Build a result for `task` carrying this context's worker id and
    /// the elapsed duration at the moment of the call
    pub fn new_result(&self, task: &Task, status: TaskStatus) -> TaskResult {
        let mut result = TaskResult::new(task.id.clone(), self.worker_id.clone(), status);
        result.duration = self.elapsed();
        result
    }
}

/// Handle to cancel a running handler
///
/// Clones share one flag, so a handle can be passed into detached work
/// (a blocking closure, a spawned subtask) and checked from there.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskmill_core::TaskType;

    #[test]
    fn test_context_creation() {
        let ctx = HandlerContext::new("worker_1");

        assert_eq!(ctx.worker_id, "worker_1");
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_cancellation_via_handle() {
        let ctx = HandlerContext::new("worker_1");
        let handle = ctx.cancellation_handle();

        assert!(!handle.is_cancelled());

        handle.cancel();

        assert!(ctx.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves_once_flagged() {
        let ctx = HandlerContext::new("worker_1");
        ctx.cancellation_handle().cancel();

        // Resolves immediately since the flag is already set
        ctx.cancelled().await;
    }

    #[test]
    fn test_new_result_stamps_identity_and_duration() {
        let ctx = HandlerContext::new("worker_7");
        let task = Task::new(TaskType::CpuIntensive, json!({})).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        let result = ctx.new_result(&task, TaskStatus::Completed);

        assert_eq!(result.task_id, task.id);
        assert_eq!(result.worker_id, "worker_7");
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.duration >= Duration::from_millis(5));
    }
}
