//! Worker dispatch loop
//!
//! A worker is a single scheduling unit: it pulls one task at a time from
//! the shared source, runs it through the registered handler under the
//! task's timeout, and pushes exactly one result to the shared sink.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use taskmill_core::{Task, TaskResult, TaskStatus};

use crate::handler::{HandlerContext, HandlerRegistry};
use crate::queue::TaskSource;

/// Lifecycle state of a single worker
///
/// A worker moves `Idle` to `Processing` and back for every dispatched
/// task, and ends in `Terminated` once its loop exits. `Terminated` is
/// absorbing: a terminated worker accepts no further tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting on the next task or the shutdown signal
    Idle = 0,
    /// Executing a task and emitting its result
    Processing = 1,
    /// Loop exited; absorbing
    Terminated = 2,
}

/// Shared cell the loop writes its state into, readable from outside
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Idle as u8))
    }

    fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }

    fn get(&self) -> WorkerState {
        match self.0.load(Ordering::Relaxed) {
            0 => WorkerState::Idle,
            1 => WorkerState::Processing,
            _ => WorkerState::Terminated,
        }
    }
}

/// One concurrent execution unit of the pool
///
/// Bound for its lifetime to one task source, one result sink, and one
/// shutdown signal. Holds no task state between dispatches.
#[derive(Debug)]
pub struct Worker {
    id: String,
    source: TaskSource,
    results: mpsc::Sender<TaskResult>,
    shutdown_rx: watch::Receiver<bool>,
    registry: Arc<HandlerRegistry>,
    state: Arc<StateCell>,
}

impl Worker {
    /// Create a worker bound to the given source, sink, and signal
    pub(crate) fn new(
        id: impl Into<String>,
        source: TaskSource,
        results: mpsc::Sender<TaskResult>,
        shutdown_rx: watch::Receiver<bool>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            results,
            shutdown_rx,
            registry,
            state: Arc::new(StateCell::new()),
        }
    }

    /// Worker id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Spawn the dispatch loop; does not block the caller
    ///
    /// The loop waits on one selection per iteration: next task, or the
    /// shutdown broadcast. A task and a shutdown signal arriving at the
    /// same instant may be won by either branch; the queue, not the
    /// worker, is the durability boundary. A shutdown that is already
    /// signaled when an iteration begins always wins.
    pub(crate) fn start(&self) -> JoinHandle<()> {
        let id = self.id.clone();
        let source = self.source.clone();
        let results = self.results.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();
        let registry = Arc::clone(&self.registry);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            debug!(worker_id = %id, "worker started");

            loop {
                if *shutdown_rx.borrow() {
                    debug!(worker_id = %id, "shutdown already signaled");
                    break;
                }

                let task = tokio::select! {
                    received = source.recv() => match received {
                        Some(task) => task,
                        None => {
                            debug!(worker_id = %id, "task source closed");
                            break;
                        }
                    },
                    _ = shutdown_rx.changed() => {
                        debug!(worker_id = %id, "shutdown signal received");
                        break;
                    }
                };

                state.set(WorkerState::Processing);
                let result = process_task(&id, &registry, task).await;

                // The sink is bounded; a full sink backpressures the
                // worker rather than dropping the result.
                match results.try_send(result) {
                    Ok(()) => {}
                    Err(TrySendError::Full(result)) => {
                        warn!(worker_id = %id, "result sink full, waiting for capacity");
                        if results.send(result).await.is_err() {
                            debug!(worker_id = %id, "result sink closed");
                            state.set(WorkerState::Terminated);
                            return;
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(worker_id = %id, "result sink closed");
                        state.set(WorkerState::Terminated);
                        return;
                    }
                }

                state.set(WorkerState::Idle);
            }

            state.set(WorkerState::Terminated);
            debug!(worker_id = %id, "worker exited");
        })
    }
}

/// Run one task to its single result
///
/// Exactly one result comes out of here per call, whatever happens
/// inside: expiry before dispatch, a missing handler, a handler that
/// finishes, or a handler that outlives the task's timeout.
async fn process_task(worker_id: &str, registry: &HandlerRegistry, mut task: Task) -> TaskResult {
    let ctx = HandlerContext::new(worker_id);

    debug!(
        worker_id,
        task_id = %task.id,
        task_type = %task.task_type,
        "processing task"
    );

    if let Err(err) = task.transition(TaskStatus::Processing) {
        let mut result = ctx.new_result(&task, TaskStatus::Failed);
        result.set_error(err);
        return result;
    }

    // Tasks can age out while buffered; report those without dispatching.
    if task.is_expired(Utc::now()) {
        warn!(worker_id, task_id = %task.id, "task expired before dispatch");
        let mut result = ctx.new_result(&task, TaskStatus::Timeout);
        result.error = Some("task timed out waiting to start".to_string());
        return result;
    }

    let Some(handler) = registry.get(task.task_type) else {
        warn!(worker_id, task_id = %task.id, task_type = %task.task_type, "no handler registered");
        let mut result = ctx.new_result(&task, TaskStatus::Failed);
        result.data = Some(task.payload.clone());
        result.error = Some("unknown task type".to_string());
        return result;
    };

    let cancel = ctx.cancellation_handle();
    match tokio::time::timeout(task.timeout, handler.execute(&ctx, &task)).await {
        Ok(result) => result,
        Err(_) => {
            // Supervisory timer fired: the handler future is dropped at
            // its next suspension point, and the flag reaches any work it
            // detached.
            cancel.cancel();
            warn!(
                worker_id,
                task_id = %task.id,
                timeout_ms = task.timeout.as_millis() as u64,
                "task execution timed out"
            );
            let mut result = ctx.new_result(&task, TaskStatus::Timeout);
            result.error = Some("task execution timed out".to_string());
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use taskmill_core::TaskType;

    use crate::handler::{CancellationHandle, TaskHandler};
    use crate::queue::TaskQueue;

    fn sample_task(task_type: TaskType) -> Task {
        Task::new(task_type, json!({"n": 7})).unwrap()
    }

    fn test_worker(
        queue: &TaskQueue,
        registry: HandlerRegistry,
    ) -> (Worker, mpsc::Receiver<TaskResult>, watch::Sender<bool>) {
        let (results_tx, results_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = Worker::new(
            "worker_1",
            queue.task_source(),
            results_tx,
            shutdown_rx,
            Arc::new(registry),
        );
        (worker, results_rx, shutdown_tx)
    }

    #[tokio::test]
    async fn test_worker_processes_task_and_returns_to_idle() {
        let queue = TaskQueue::new(4);
        let (worker, mut results_rx, shutdown_tx) =
            test_worker(&queue, HandlerRegistry::with_builtin());

        queue.submit(sample_task(TaskType::CpuIntensive)).unwrap();
        let handle = worker.start();

        let result = results_rx.recv().await.unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.worker_id, "worker_1");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(worker.state(), WorkerState::Terminated);
    }

    #[tokio::test]
    async fn test_worker_exits_without_processing_when_shutdown_precedes_start() {
        let queue = TaskQueue::new(4);
        let (worker, mut results_rx, shutdown_tx) =
            test_worker(&queue, HandlerRegistry::with_builtin());

        queue.submit(sample_task(TaskType::CpuIntensive)).unwrap();

        // Signal before the loop begins: the already-signaled check wins
        // over the buffered task.
        shutdown_tx.send(true).unwrap();
        worker.start().await.unwrap();

        assert_eq!(worker.state(), WorkerState::Terminated);
        assert!(results_rx.try_recv().is_err());
        assert_eq!(queue.status().depth, 1);
    }

    #[tokio::test]
    async fn test_worker_exits_when_source_closes() {
        let queue = TaskQueue::new(4);
        let (worker, _results_rx, _shutdown_tx) =
            test_worker(&queue, HandlerRegistry::with_builtin());

        queue.close();
        worker.start().await.unwrap();

        assert_eq!(worker.state(), WorkerState::Terminated);
    }

    #[tokio::test]
    async fn test_worker_exits_when_idle_shutdown_arrives() {
        let queue = TaskQueue::new(4);
        let (worker, _results_rx, shutdown_tx) =
            test_worker(&queue, HandlerRegistry::with_builtin());

        let handle = worker.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(worker.state(), WorkerState::Idle);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(worker.state(), WorkerState::Terminated);
    }

    #[tokio::test]
    async fn test_process_task_unknown_type_fails_with_payload() {
        let registry = HandlerRegistry::new();
        let task = sample_task(TaskType::IoBound);
        let payload = task.payload.clone();
        let task_id = task.id.clone();

        let result = process_task("worker_9", &registry, task).await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.task_id, task_id);
        assert_eq!(result.error.as_deref(), Some("unknown task type"));
        assert_eq!(result.data, Some(payload));
    }

    #[tokio::test]
    async fn test_process_task_expired_before_dispatch() {
        let registry = HandlerRegistry::with_builtin();
        let mut task = sample_task(TaskType::CpuIntensive);
        task.created_at = Utc::now() - chrono::Duration::hours(1);

        let result = process_task("worker_1", &registry, task).await;

        assert_eq!(result.status, TaskStatus::Timeout);
        assert_eq!(
            result.error.as_deref(),
            Some("task timed out waiting to start")
        );
    }

    /// Handler that parks well past any test deadline, handing its
    /// cancellation handle out through a side slot first.
    struct StallingHandler {
        handle_slot: Arc<std::sync::Mutex<Option<CancellationHandle>>>,
    }

    #[async_trait]
    impl TaskHandler for StallingHandler {
        fn task_type(&self) -> TaskType {
            TaskType::TimeBased
        }

        async fn execute(&self, ctx: &HandlerContext, task: &Task) -> TaskResult {
            *self.handle_slot.lock().unwrap() = Some(ctx.cancellation_handle());
            tokio::time::sleep(Duration::from_secs(30)).await;
            ctx.new_result(task, TaskStatus::Completed)
        }
    }

    #[tokio::test]
    async fn test_process_task_enforces_timeout_and_cancels() {
        let handle_slot = Arc::new(std::sync::Mutex::new(None));
        let mut registry = HandlerRegistry::new();
        registry.register(StallingHandler {
            handle_slot: Arc::clone(&handle_slot),
        });

        let task = sample_task(TaskType::TimeBased).with_timeout(Duration::from_millis(50));
        let result = process_task("worker_1", &registry, task).await;

        assert_eq!(result.status, TaskStatus::Timeout);
        assert_eq!(result.error.as_deref(), Some("task execution timed out"));
        assert!(result.duration >= Duration::from_millis(50));

        // The supervisory timer flipped the flag the handler handed out
        let handle = handle_slot.lock().unwrap().clone().unwrap();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_process_task_rejects_non_pending_task() {
        let registry = HandlerRegistry::with_builtin();
        let mut task = sample_task(TaskType::CpuIntensive);
        task.transition(TaskStatus::Processing).unwrap();
        task.transition(TaskStatus::Completed).unwrap();

        let result = process_task("worker_1", &registry, task).await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.error.unwrap().contains("cannot transition task"));
    }
}
