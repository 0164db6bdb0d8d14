//! Handler trait definition

use async_trait::async_trait;

use taskmill_core::{Task, TaskResult, TaskType};

use super::HandlerContext;

/// Pluggable execution strategy for one task type
///
/// A handler receives the task and a per-dispatch context, does the work,
/// and returns the single result for that dispatch. The handler itself
/// populates `task_id`, `worker_id`, `completed_at`, and `duration`,
/// usually through [`HandlerContext::new_result`]. Success sets
/// [`TaskStatus::Completed`]; failure is reported through
/// [`TaskResult::set_error`] on the returned value, never by panicking
/// across the worker boundary.
///
/// A handler may run up to the task's `timeout`. The engine enforces the
/// deadline with a supervisory timer and flips the context's cancellation
/// flag when it fires, so long-running handlers should observe
/// [`HandlerContext::is_cancelled`] or select on
/// [`HandlerContext::cancelled`] at safe points, and pass the flag into
/// any work they detach.
///
/// # Example
///
/// ```ignore
/// struct ThumbnailHandler;
///
/// #[async_trait]
/// impl TaskHandler for ThumbnailHandler {
///     fn task_type(&self) -> TaskType {
///         TaskType::IoBound
///     }
///
///     async fn execute(&self, ctx: &HandlerContext, task: &Task) -> TaskResult {
///         let input: ThumbnailRequest = match task.payload_as() {
///             Ok(input) => input,
///             Err(err) => {
///                 let mut result = ctx.new_result(task, TaskStatus::Failed);
///                 result.set_error(err);
///                 return result;
///             }
///         };
///
///         let output = render_thumbnail(&input).await;
///         let mut result = ctx.new_result(task, TaskStatus::Completed);
///         match output {
///             Ok(output) => {
///                 if let Err(err) = result.set_data(output) {
///                     result.set_error(err);
///                 }
///             }
///             Err(err) => result.set_error(err),
///         }
///         result
///     }
/// }
/// ```
///
/// [`TaskStatus::Completed`]: taskmill_core::TaskStatus::Completed
/// [`TaskResult::set_error`]: taskmill_core::TaskResult::set_error
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Task type this handler executes
    fn task_type(&self) -> TaskType;

    /// Execute one task and produce its result
    async fn execute(&self, ctx: &HandlerContext, task: &Task) -> TaskResult;
}
