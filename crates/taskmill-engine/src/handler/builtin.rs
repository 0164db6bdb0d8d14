//! Built-in handlers for the stock task types
//!
//! These simulate the three workload shapes the engine ships with. Real
//! deployments register their own handlers; these stand in for demos and
//! tests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use taskmill_core::{Task, TaskResult, TaskStatus, TaskType};

use super::{HandlerContext, TaskHandler};

/// Simulated read latency for I/O-bound work
const IO_DELAY: Duration = Duration::from_millis(100);

/// Simulated processing interval for time-based work
const TIME_BASED_DELAY: Duration = Duration::from_millis(500);

/// Computation-heavy work: sums a fixed range
pub struct CpuIntensiveHandler;

#[async_trait]
impl TaskHandler for CpuIntensiveHandler {
    fn task_type(&self) -> TaskType {
        TaskType::CpuIntensive
    }

    async fn execute(&self, ctx: &HandlerContext, task: &Task) -> TaskResult {
        // Just enough work to see CPU usage
        let sum: u64 = (0..1_000_000u64).sum();

        let mut result = ctx.new_result(task, TaskStatus::Completed);
        if let Err(err) = result.set_data(json!({ "result": sum })) {
            result.set_error(err);
        }
        result
    }
}

/// I/O-dominated work: waits on a simulated read
pub struct IoBoundHandler;

#[async_trait]
impl TaskHandler for IoBoundHandler {
    fn task_type(&self) -> TaskType {
        TaskType::IoBound
    }

    async fn execute(&self, ctx: &HandlerContext, task: &Task) -> TaskResult {
        // Pretend we are reading a file
        tokio::select! {
            _ = tokio::time::sleep(IO_DELAY) => {}
            _ = ctx.cancelled() => {
                let mut result = ctx.new_result(task, TaskStatus::Failed);
                result.set_error("cancelled during simulated i/o");
                return result;
            }
        }

        let mut result = ctx.new_result(task, TaskStatus::Completed);
        if let Err(err) = result.set_data(json!({ "message": "I/O operation completed" })) {
            result.set_error(err);
        }
        result
    }
}

/// Time-gated work: waits out a fixed processing interval
pub struct TimeBasedHandler;

#[async_trait]
impl TaskHandler for TimeBasedHandler {
    fn task_type(&self) -> TaskType {
        TaskType::TimeBased
    }

    async fn execute(&self, ctx: &HandlerContext, task: &Task) -> TaskResult {
        // Pretend we are processing something
        tokio::select! {
            _ = tokio::time::sleep(TIME_BASED_DELAY) => {}
            _ = ctx.cancelled() => {
                let mut result = ctx.new_result(task, TaskStatus::Failed);
                result.set_error("cancelled during time-based processing");
                return result;
            }
        }

        let mut result = ctx.new_result(task, TaskStatus::Completed);
        if let Err(err) = result.set_data(json!({ "status": "time-based processing done" })) {
            result.set_error(err);
        }
        result
    }
}
