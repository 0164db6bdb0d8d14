//! Workers and the worker pool
//!
//! This module provides:
//! - [`Worker`] - one concurrent execution unit, single task at a time
//! - [`WorkerPool`] - a fixed set of workers sharing one task source and
//!   one result sink, with coordinated start and shutdown
//! - [`WorkerPoolConfig`] - pool sizing and shutdown tuning
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         WorkerPool                           │
//! │                                                              │
//! │   TaskSource ──┬─▶ worker_1 ──┐                              │
//! │   (shared      ├─▶ worker_2 ──┼─▶ result sink ──▶ consumer   │
//! │    FIFO)       └─▶ worker_N ──┘   (bounded)                  │
//! │                      ▲                                       │
//! │   shutdown watch ────┘ (observed at every selection point)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each worker repeatedly waits on one selection: the next task from the
//! shared source, or the shutdown broadcast. Task execution is dispatched
//! through the [`HandlerRegistry`](crate::handler::HandlerRegistry) and
//! bounded by the task's timeout.

mod dispatch;
mod pool;

pub use dispatch::{Worker, WorkerState};
pub use pool::{WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus};
