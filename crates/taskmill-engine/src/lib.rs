//! # Taskmill Engine
//!
//! An in-process task execution engine: a bounded queue feeding a fixed pool
//! of workers that dispatch tasks to registered handlers and emit one result
//! per task.
//!
//! ## Features
//!
//! - **Bounded intake**: Submission never blocks; a full or closed queue hands
//!   the task back to the caller as an error
//! - **Fixed worker pool**: N workers share one task source and one bounded
//!   result sink, coordinated by a single shutdown broadcast
//! - **Registry dispatch**: Handlers are looked up by task type; adding a task
//!   type never touches the dispatch loop
//! - **Timeout enforcement**: A supervisory timer bounds every execution and a
//!   cooperative cancellation flag reaches work the handler detached
//! - **Exactly one result per task**: Expiry, missing handlers, handler
//!   failures, and timeouts all surface as results, never as silence
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         TaskQueue                             │
//! │  (bounded FIFO intake: submit / close / status)              │
//! └──────────────────────────────────────────────────────────────┘
//!                              │ TaskSource (shared)
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                             │
//! │  (worker_1 .. worker_N: HandlerRegistry dispatch, timeouts)  │
//! └──────────────────────────────────────────────────────────────┘
//!                              │ bounded result sink
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Result consumer                           │
//! │  (take_results / result_stream: one receiver, backpressure)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use taskmill_engine::prelude::*;
//! use serde_json::json;
//!
//! let queue = TaskQueue::new(64);
//! let pool = WorkerPool::new(
//!     queue.task_source(),
//!     HandlerRegistry::with_builtin(),
//!     WorkerPoolConfig::new(4),
//! );
//!
//! let mut results = pool.take_results().expect("results not yet taken");
//! pool.start()?;
//!
//! queue.submit(Task::new(TaskType::CpuIntensive, json!({"n": 42}))?)?;
//!
//! if let Some(result) = results.recv().await {
//!     println!("{result}");
//! }
//!
//! pool.shutdown().await?;
//! queue.close();
//! ```

pub mod handler;
pub mod queue;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use taskmill_core::{Task, TaskError, TaskResult, TaskStatus, TaskType};

    pub use crate::handler::{
        CancellationHandle, HandlerContext, HandlerRegistry, TaskHandler,
    };
    pub use crate::queue::{QueueError, QueueStatus, TaskQueue, TaskSource};
    pub use crate::worker::{
        Worker, WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus, WorkerState,
    };
}

// Re-export key types at crate root
pub use handler::{CancellationHandle, HandlerContext, HandlerRegistry, TaskHandler};
pub use queue::{QueueError, QueueStatus, TaskQueue, TaskSource};
pub use worker::{
    Worker, WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus, WorkerState,
};
