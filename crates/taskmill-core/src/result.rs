//! Task outcome record

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TaskError;
use crate::task::TaskStatus;

/// The single outcome record produced for a processed task
///
/// Every task a worker dispatches yields exactly one of these, whether the
/// handler completed, failed, or ran out of time. Success and failure
/// travel over the same channel; consumers inspect `status` rather than
/// catching anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Id of the task this result belongs to
    pub task_id: String,

    /// Terminal status reached by the task
    pub status: TaskStatus,

    /// Handler output; absent on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Time spent processing
    #[serde(with = "duration_millis")]
    pub duration: Duration,

    /// Id of the worker that produced this result
    pub worker_id: String,

    /// When the result was produced
    pub completed_at: DateTime<Utc>,

    /// Failure message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// Create a result stamped with the current time
    ///
    /// `duration` starts at zero; whoever measures the execution fills it
    /// in.
    pub fn new(
        task_id: impl Into<String>,
        worker_id: impl Into<String>,
        status: TaskStatus,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            data: None,
            duration: Duration::ZERO,
            worker_id: worker_id.into(),
            completed_at: Utc::now(),
            error: None,
        }
    }

    /// Attach handler output
    pub fn set_data(&mut self, data: impl Serialize) -> Result<(), TaskError> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(())
    }

    /// Record a failure
    ///
    /// Forces the status to [`TaskStatus::Failed`] regardless of what it
    /// was before. This is the single path by which handlers report
    /// failure.
    pub fn set_error(&mut self, err: impl fmt::Display) {
        let message = err.to_string();
        warn!(task_id = %self.task_id, error = %message, "task failed");

        self.status = TaskStatus::Failed;
        self.error = Some(message);
    }

    /// Whether the task completed successfully
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task_id: {}, status: {}, duration: {:?}, worker_id: {}",
            self.task_id, self.status, self.duration, self.worker_id
        )
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_result_stamps_fields() {
        let result = TaskResult::new("task-1", "worker_1", TaskStatus::Completed);

        assert_eq!(result.task_id, "task-1");
        assert_eq!(result.worker_id, "worker_1");
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.duration, Duration::ZERO);
        assert!(result.data.is_none());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_set_data() {
        let mut result = TaskResult::new("task-1", "worker_1", TaskStatus::Completed);
        result.set_data(json!({"bytes": 128})).unwrap();

        assert_eq!(result.data, Some(json!({"bytes": 128})));
    }

    #[test]
    fn test_set_error_forces_failed() {
        let mut result = TaskResult::new("task-1", "worker_1", TaskStatus::Completed);
        result.set_error("disk on fire");

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("disk on fire"));
        assert!(!result.is_success());
    }

    #[test]
    fn test_is_success() {
        let completed = TaskResult::new("task-1", "worker_1", TaskStatus::Completed);
        assert!(completed.is_success());

        let timed_out = TaskResult::new("task-2", "worker_1", TaskStatus::Timeout);
        assert!(!timed_out.is_success());
    }

    #[test]
    fn test_serde_omits_empty_fields() {
        let result = TaskResult::new("task-1", "worker_1", TaskStatus::Timeout);
        let value = serde_json::to_value(&result).unwrap();

        assert!(value.get("data").is_none());
        assert!(value.get("error").is_none());
        assert_eq!(value["status"], "timeout");
        assert_eq!(value["duration"], 0);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut result = TaskResult::new("task-1", "worker_2", TaskStatus::Completed);
        result.duration = Duration::from_millis(250);
        result.set_data(json!({"message": "done"})).unwrap();

        let json = serde_json::to_string(&result).unwrap();
        let parsed: TaskResult = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, result);
    }

    #[test]
    fn test_display() {
        let mut result = TaskResult::new("task-9", "worker_3", TaskStatus::Completed);
        result.duration = Duration::from_millis(42);

        let line = result.to_string();
        assert!(line.contains("task-9"));
        assert!(line.contains("completed"));
        assert!(line.contains("worker_3"));
    }
}
