//! Task handlers and type-based dispatch
//!
//! This module provides:
//! - [`TaskHandler`] - the pluggable execution strategy, one per task type
//! - [`HandlerContext`] - per-dispatch identity, timing, and cancellation
//! - [`HandlerRegistry`] - the task-type to handler dispatch table
//! - Built-in handlers simulating the stock workload shapes
//!
//! New task types are supported by registering a handler; the dispatch
//! loop never changes.

mod builtin;
mod context;
mod definition;
mod registry;

pub use builtin::{CpuIntensiveHandler, IoBoundHandler, TimeBasedHandler};
pub use context::{CancellationHandle, HandlerContext};
pub use definition::TaskHandler;
pub use registry::HandlerRegistry;
