//! Worker pool lifecycle
//!
//! Owns a fixed set of workers sharing one task source and one bounded
//! result sink, and coordinates pool-wide start and shutdown.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

use taskmill_core::TaskResult;

use super::dispatch::{Worker, WorkerState};
use crate::handler::HandlerRegistry;
use crate::queue::TaskSource;

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of workers in the pool
    pub workers: usize,

    /// Capacity of the bounded result sink
    pub result_capacity: usize,

    /// Graceful shutdown timeout
    #[serde(with = "duration_millis")]
    pub shutdown_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            result_capacity: 64,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration for a pool of the given size
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            ..Default::default()
        }
    }

    /// Set the number of workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the result sink capacity
    pub fn with_result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity.max(1);
        self
    }

    /// Set the graceful shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPoolStatus {
    /// Constructed, no workers running yet
    Idle,
    /// Workers running and consuming tasks
    Running,
    /// Shutdown signaled; a stopped pool does not restart
    Stopped,
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// Pool is already running
    #[error("worker pool is already running")]
    AlreadyRunning,

    /// Pool was stopped; pools run at most once
    #[error("worker pool has been stopped")]
    Stopped,

    /// Workers did not exit within the shutdown timeout
    #[error("graceful shutdown timed out")]
    ShutdownTimeout,
}

/// Fixed-size pool of workers over one shared task source
///
/// The pool creates its own bounded result sink and shutdown broadcast at
/// construction and binds every worker to them. Start and stop act on the
/// whole pool; individual workers are not started or stopped directly.
///
/// # Example
///
/// ```ignore
/// use taskmill_engine::prelude::*;
///
/// let queue = TaskQueue::new(64);
/// let pool = WorkerPool::new(
///     queue.task_source(),
///     HandlerRegistry::with_builtin(),
///     WorkerPoolConfig::new(4),
/// );
///
/// let mut results = pool.take_results().expect("results not yet taken");
/// pool.start()?;
///
/// queue.submit(task)?;
/// let result = results.recv().await;
///
/// pool.shutdown().await?;
/// ```
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Worker>,
    config: WorkerPoolConfig,
    shutdown_tx: watch::Sender<bool>,
    status: std::sync::RwLock<WorkerPoolStatus>,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
    results_rx: std::sync::Mutex<Option<mpsc::Receiver<TaskResult>>>,
}

impl WorkerPool {
    /// Create a pool of `config.workers` workers over `source`
    ///
    /// Workers are named `worker_1` through `worker_N` and all share the
    /// source, the result sink, and the shutdown signal. Nothing runs
    /// until [`WorkerPool::start`].
    pub fn new(source: TaskSource, registry: HandlerRegistry, config: WorkerPoolConfig) -> Self {
        let (results_tx, results_rx) = mpsc::channel(config.result_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = Arc::new(registry);

        let workers = (1..=config.workers.max(1))
            .map(|i| {
                Worker::new(
                    format!("worker_{i}"),
                    source.clone(),
                    results_tx.clone(),
                    shutdown_rx.clone(),
                    Arc::clone(&registry),
                )
            })
            .collect();

        Self {
            workers,
            config,
            shutdown_tx,
            status: std::sync::RwLock::new(WorkerPoolStatus::Idle),
            handles: std::sync::Mutex::new(Vec::new()),
            results_rx: std::sync::Mutex::new(Some(results_rx)),
        }
    }

    /// Start every worker's loop
    ///
    /// Fails if the pool is already running or was stopped; pools run at
    /// most once per process lifetime. Must be called within a Tokio
    /// runtime.
    #[instrument(skip(self), fields(workers = self.workers.len()))]
    pub fn start(&self) -> Result<(), WorkerPoolError> {
        {
            let mut status = self.status.write().unwrap();
            match *status {
                WorkerPoolStatus::Running => return Err(WorkerPoolError::AlreadyRunning),
                WorkerPoolStatus::Stopped => return Err(WorkerPoolError::Stopped),
                WorkerPoolStatus::Idle => *status = WorkerPoolStatus::Running,
            }
        }

        info!(workers = self.workers.len(), "starting worker pool");

        let mut handles = self.handles.lock().unwrap();
        for worker in &self.workers {
            handles.push(worker.start());
        }

        Ok(())
    }

    /// Broadcast the shutdown signal
    ///
    /// Wakes every worker's selection point; each exits after finishing
    /// its current iteration. Does not wait for workers and does not
    /// drain the task source: tasks still buffered stay in the queue.
    /// Idempotent.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        {
            let mut status = self.status.write().unwrap();
            if *status == WorkerPoolStatus::Stopped {
                return;
            }
            *status = WorkerPoolStatus::Stopped;
        }

        info!("stopping worker pool");
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the pool and wait for every worker to exit
    ///
    /// Waits up to the configured shutdown timeout; workers still running
    /// after that (for example blocked pushing into a sink nobody drains)
    /// are reported as [`WorkerPoolError::ShutdownTimeout`]. Safe to call
    /// on a pool that never started or was already stopped.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), WorkerPoolError> {
        self.stop();

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap();
            guard.drain(..).collect()
        };

        if handles.is_empty() {
            return Ok(());
        }

        let join = futures::future::join_all(handles);
        match tokio::time::timeout(self.config.shutdown_timeout, join).await {
            Ok(joined) => {
                for outcome in joined {
                    if let Err(err) = outcome {
                        warn!(error = %err, "worker task did not join cleanly");
                    }
                }
                info!("worker pool stopped");
                Ok(())
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                    "graceful shutdown timed out"
                );
                Err(WorkerPoolError::ShutdownTimeout)
            }
        }
    }

    /// Take the result receiver
    ///
    /// The sink has a single consumer; the receiver can be taken exactly
    /// once. Returns `None` on later calls.
    pub fn take_results(&self) -> Option<mpsc::Receiver<TaskResult>> {
        self.results_rx.lock().unwrap().take()
    }

    /// Take the result receiver as a `Stream`
    ///
    /// Same single-consumer rule as [`WorkerPool::take_results`].
    pub fn result_stream(&self) -> Option<ReceiverStream<TaskResult>> {
        self.take_results().map(ReceiverStream::new)
    }

    /// Current pool status
    pub fn status(&self) -> WorkerPoolStatus {
        *self.status.read().unwrap()
    }

    /// Number of workers in the pool
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Worker ids, in construction order
    pub fn worker_ids(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.id().to_string()).collect()
    }

    /// Snapshot of each worker's lifecycle state
    pub fn worker_states(&self) -> Vec<(String, WorkerState)> {
        self.workers
            .iter()
            .map(|w| (w.id().to_string(), w.state()))
            .collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers hold watch receivers; make sure none outlive the pool
        // in a waiting state.
        let _ = self.shutdown_tx.send(true);
        debug!("worker pool dropped");
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
