//! # Taskmill Core
//!
//! Domain types shared by the engine and anything that feeds it or reads
//! from it: the [`Task`] a producer constructs, the [`TaskResult`] a worker
//! emits, and the status and error types that tie them together.
//!
//! Everything here is a plain value. Construction validates the full set of
//! invariants up front, so a [`Task`] that exists is a valid task; after
//! that only its status moves, and only forward.

pub mod error;
pub mod result;
pub mod task;

pub use error::TaskError;
pub use result::TaskResult;
pub use task::{Task, TaskStatus, TaskType};
